//! 重试策略实现
//!
//! 包装探测器，根据错误分类决定是否重新尝试

use crate::check::outcome::ProbeOutcome;
use crate::check::prober::Prober;
use crate::config::DomainTarget;
use std::time::Duration;
use tracing::debug;

/// 重试策略
///
/// 对可重试错误（超时、连接失败）最多尝试 `retry_count + 1` 次，
/// 每次重试前等待固定延迟。DNS、TLS与状态码异常首次即终止。
/// 最终结果的尝试次数为实际总尝试数，耗时只反映最后一次尝试
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 重试次数
    retry_count: u32,
    /// 重试间隔
    retry_delay: Duration,
}

impl RetryPolicy {
    /// 创建新的重试策略
    ///
    /// # 参数
    /// * `retry_count` - 重试次数
    /// * `retry_delay` - 重试间隔
    pub fn new(retry_count: u32, retry_delay: Duration) -> Self {
        Self {
            retry_count,
            retry_delay,
        }
    }

    /// 对单个目标执行带重试的探测
    ///
    /// # 参数
    /// * `prober` - 探测器
    /// * `target` - 监控目标
    /// * `timeout` - 单次探测超时
    ///
    /// # 返回
    /// * `ProbeOutcome` - 最终探测结果
    pub async fn run(
        &self,
        prober: &dyn Prober,
        target: &DomainTarget,
        timeout: Duration,
    ) -> ProbeOutcome {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let outcome = prober.probe(target, timeout).await;

            if outcome.success {
                return outcome.with_attempts(attempts);
            }

            let retryable = outcome
                .error_kind
                .map(|kind| kind.is_retryable())
                .unwrap_or(false);

            if !retryable || attempts > self.retry_count {
                return outcome.with_attempts(attempts);
            }

            debug!(
                "域名 {} 将在 {} 秒后进行第 {} 次重试",
                target.display_name,
                self.retry_delay.as_secs(),
                attempts
            );
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}
