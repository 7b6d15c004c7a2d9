//! 域名状态数据结构
//!
//! 定义每个监控域名的健康状态与对外快照类型

use crate::check::ProbeErrorKind;
use crate::config::{DomainId, DomainTarget, GroupId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 域名健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    /// 正常
    Healthy,
    /// 失败中（未达告警阈值，或阈值已到但冷却未过）
    Failing,
    /// 告警中（已发出告警且仍然异常）
    Alerting,
    /// 刚刚恢复（仅保持一轮，下一轮正常后转为Healthy）
    Recovered,
}

impl DomainStatus {
    /// 判断状态是否视为健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, DomainStatus::Healthy | DomainStatus::Recovered)
    }
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainStatus::Healthy => write!(f, "正常"),
            DomainStatus::Failing => write!(f, "失败中"),
            DomainStatus::Alerting => write!(f, "告警中"),
            DomainStatus::Recovered => write!(f, "已恢复"),
        }
    }
}

/// 单个域名的监控状态
///
/// 每个配置中的域名对应一个实例，生命周期与配置中的域名一致；
/// 只由状态引擎在每轮结束后修改，每轮恰好一次
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainState {
    /// 域名标识
    pub domain: DomainId,
    /// 显示名称
    pub display_name: String,
    /// 探测URL
    pub url: String,
    /// 所属群组
    pub group_id: GroupId,
    /// 当前状态
    pub status: DomainStatus,
    /// 连续失败次数
    pub consecutive_failures: u32,
    /// 上次告警时间（恢复后保留，用于冷却判断）
    pub last_alert_at: Option<DateTime<Utc>>,
    /// 最近一次错误分类
    pub last_error_kind: Option<ProbeErrorKind>,
    /// 最近一次HTTP状态码
    pub last_status_code: Option<u16>,
    /// 最近一次检查时间
    pub last_checked_at: Option<DateTime<Utc>>,
    /// 最近一次探测耗时（毫秒）
    pub last_latency_ms: Option<u64>,
}

impl DomainState {
    /// 为新增域名创建初始状态
    ///
    /// 新域名的初始状态总是Healthy
    pub fn new(target: &DomainTarget) -> Self {
        Self {
            domain: target.id.clone(),
            display_name: target.display_name.clone(),
            url: target.url.clone(),
            group_id: target.group_id.clone(),
            status: DomainStatus::Healthy,
            consecutive_failures: 0,
            last_alert_at: None,
            last_error_kind: None,
            last_status_code: None,
            last_checked_at: None,
            last_latency_ms: None,
        }
    }
}

/// 引擎累计统计
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// 已处理的轮次数
    pub rounds_processed: u64,
    /// 累计探测次数
    pub checks_processed: u64,
    /// 累计发出的告警数
    pub alerts_emitted: u64,
    /// 累计发出的恢复通知数
    pub recoveries_emitted: u64,
}

/// 全部域名状态的只读快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// 快照生成时间
    pub generated_at: DateTime<Utc>,
    /// 域名总数
    pub total: usize,
    /// 健康域名数
    pub healthy: usize,
    /// 异常域名数
    pub failing: usize,
    /// 累计统计
    pub stats: EngineStats,
    /// 域名状态列表
    pub domains: Vec<DomainState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupConfig;

    fn target(name: &str) -> DomainTarget {
        let group = GroupConfig {
            id: "g1".to_string(),
            name: String::new(),
            chat_id: "-100".to_string(),
            domains: vec![],
            expected_status_codes: None,
        };
        DomainTarget::from_entry(name, &group).unwrap()
    }

    #[test]
    fn test_new_domain_starts_healthy() {
        let state = DomainState::new(&target("example.com"));
        assert_eq!(state.status, DomainStatus::Healthy);
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_alert_at.is_none());
        assert!(state.last_checked_at.is_none());
    }

    #[test]
    fn test_status_is_healthy() {
        assert!(DomainStatus::Healthy.is_healthy());
        assert!(DomainStatus::Recovered.is_healthy());
        assert!(!DomainStatus::Failing.is_healthy());
        assert!(!DomainStatus::Alerting.is_healthy());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DomainStatus::Healthy.to_string(), "正常");
        assert_eq!(DomainStatus::Alerting.to_string(), "告警中");
    }
}
