//! 通知分发器模块
//!
//! 定义通知载荷的分发trait与基础实现

use crate::notification::payload::NotificationPayload;
use anyhow::Result;
use async_trait::async_trait;

/// 通知分发器trait
///
/// 接收状态引擎产出的按群组分区载荷，负责投递与格式化；
/// 投递失败不影响状态机，由调用方记录日志
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// 分发单个群组的通知载荷
    ///
    /// # 参数
    /// * `payload` - 通知载荷
    ///
    /// # 返回
    /// * `Result<()>` - 分发结果
    async fn dispatch(&self, payload: &NotificationPayload) -> Result<()>;

    /// 测试通知通道连通性
    async fn test_connection(&self) -> Result<()>;
}

/// 空的通知分发器实现（用于测试或禁用通知）
pub struct NoOpDispatcher;

#[async_trait]
impl NotificationDispatcher for NoOpDispatcher {
    async fn dispatch(&self, _payload: &NotificationPayload) -> Result<()> {
        // 不执行任何操作
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        // 总是返回成功
        Ok(())
    }
}
