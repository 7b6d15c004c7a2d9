//! 通知载荷数据结构
//!
//! 状态引擎按群组分区产出的通知内容，交由外部分发器投递

use crate::check::ProbeErrorKind;
use crate::config::{DomainId, GroupId};
use crate::monitor::DomainStatus;
use serde::{Deserialize, Serialize};

/// 通知载荷类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// 全量报告：本轮该群组的全部异常域名
    Full,
    /// 智能差分：只包含新告警与新恢复
    SmartDiff,
}

/// 单个域名在通知中的事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportEvent {
    /// 本轮触发告警
    Alert,
    /// 本轮恢复正常
    Recovery,
    /// 仍然异常（仅全量模式出现）
    Failing,
}

/// 通知中的单个域名条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainReport {
    /// 域名标识
    pub domain: DomainId,
    /// 显示名称
    pub display_name: String,
    /// 探测URL
    pub url: String,
    /// 事件类型
    pub event: ReportEvent,
    /// 当前状态
    pub status: DomainStatus,
    /// 错误分类（恢复条目为None）
    pub error_kind: Option<ProbeErrorKind>,
    /// HTTP状态码
    pub status_code: Option<u16>,
    /// 探测耗时（毫秒）
    pub latency_ms: Option<u64>,
    /// 连续失败次数
    pub consecutive_failures: u32,
}

/// 群组级汇总计数（只统计本轮实际探测到的该群组域名）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// 探测总数
    pub total: usize,
    /// 正常数
    pub healthy: usize,
    /// 异常数
    pub failing: usize,
}

/// 按群组分区的通知载荷
///
/// 一轮检查覆盖多个群组时，每个群组产出一个只包含本群组域名的载荷；
/// 投递、格式化与限流由外部分发器负责
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// 群组标识
    pub group_id: GroupId,
    /// 载荷类型
    pub kind: PayloadKind,
    /// 轮次ID
    pub round_id: u64,
    /// 是否来自不完整轮次
    pub partial: bool,
    /// 域名条目
    pub domains: Vec<DomainReport>,
    /// 群组级汇总
    pub summary: GroupSummary,
}

impl NotificationPayload {
    /// 遍历指定事件类型的条目
    pub fn events(&self, event: ReportEvent) -> impl Iterator<Item = &DomainReport> {
        self.domains.iter().filter(move |d| d.event == event)
    }

    /// 是否包含任何告警条目
    pub fn has_alerts(&self) -> bool {
        self.domains.iter().any(|d| d.event == ReportEvent::Alert)
    }
}
