//! 探测结果数据结构
//!
//! 定义单域名探测结果、错误分类与整轮检查结果类型

use crate::config::DomainId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 探测错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// DNS解析失败
    Dns,
    /// 连接失败（拒绝、重置、不可达）
    Connect,
    /// 请求超时
    Timeout,
    /// TLS/证书错误
    Tls,
    /// 状态码不在期望集合中
    UnexpectedStatus,
    /// 未知错误（含被捕获的探测任务崩溃）
    Unknown,
}

impl ProbeErrorKind {
    /// 判断该错误类型是否值得重试
    ///
    /// 只有超时与连接失败可能是暂时性的；DNS、TLS与状态码异常
    /// 属于配置问题，重试只会浪费超时预算
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProbeErrorKind::Timeout | ProbeErrorKind::Connect)
    }

    /// 错误类型的中文描述
    pub fn description(&self) -> &'static str {
        match self {
            ProbeErrorKind::Dns => "DNS解析失败",
            ProbeErrorKind::Connect => "无法建立连接",
            ProbeErrorKind::Timeout => "访问超时",
            ProbeErrorKind::Tls => "SSL证书问题",
            ProbeErrorKind::UnexpectedStatus => "状态码异常",
            ProbeErrorKind::Unknown => "未知错误",
        }
    }
}

impl std::fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// 单域名探测结果
///
/// 每轮每个域名恰好产生一个，创建后不可变。探测失败从不以错误形式
/// 向调用方传播，总是表示为一个不成功的结果值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// 结果ID
    pub id: Uuid,
    /// 域名标识
    pub domain: DomainId,
    /// 探测URL
    pub url: String,
    /// 是否成功（状态码在期望集合中）
    pub success: bool,
    /// 错误分类（成功时为None）
    pub error_kind: Option<ProbeErrorKind>,
    /// 错误详情（成功时为None）
    pub error_message: Option<String>,
    /// HTTP状态码（未收到响应时为None）
    pub status_code: Option<u16>,
    /// 最后一次尝试的耗时
    #[serde(with = "duration_serde")]
    pub latency: Duration,
    /// 总尝试次数（含重试）
    pub attempts: u32,
    /// 探测时间戳
    pub timestamp: DateTime<Utc>,
}

impl ProbeOutcome {
    /// 创建成功结果
    pub fn success(domain: DomainId, url: String, status_code: u16, latency: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain,
            url,
            success: true,
            error_kind: None,
            error_message: None,
            status_code: Some(status_code),
            latency,
            attempts: 1,
            timestamp: Utc::now(),
        }
    }

    /// 创建失败结果
    pub fn failure(
        domain: DomainId,
        url: String,
        kind: ProbeErrorKind,
        error_message: String,
        latency: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain,
            url,
            success: false,
            error_kind: Some(kind),
            error_message: Some(error_message),
            status_code: None,
            latency,
            attempts: 1,
            timestamp: Utc::now(),
        }
    }

    /// 设置HTTP状态码
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// 设置总尝试次数
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// 获取耗时（毫秒）
    pub fn latency_ms(&self) -> u64 {
        self.latency.as_millis() as u64
    }
}

/// 一轮检查的汇总计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// 实际探测的域名总数
    pub total: usize,
    /// 正常域名数
    pub healthy: usize,
    /// 异常域名数
    pub failing: usize,
}

/// 一轮完整的检查结果
///
/// 由批量调度器产生，交给状态引擎消费。轮次ID单调递增；
/// 被取消的轮次标记为partial，汇总只反映实际探测过的域名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRound {
    /// 轮次ID
    pub round_id: u64,
    /// 全部探测结果（顺序无约束，只保证完整性）
    pub outcomes: Vec<ProbeOutcome>,
    /// 汇总计数
    pub summary: RoundSummary,
    /// 是否为被取消的不完整轮次
    pub partial: bool,
    /// 轮次开始时间
    pub started_at: DateTime<Utc>,
    /// 轮次结束时间
    pub finished_at: DateTime<Utc>,
}

impl CheckRound {
    /// 从探测结果构建检查轮次
    pub fn new(
        round_id: u64,
        outcomes: Vec<ProbeOutcome>,
        partial: bool,
        started_at: DateTime<Utc>,
    ) -> Self {
        let healthy = outcomes.iter().filter(|o| o.success).count();
        let summary = RoundSummary {
            total: outcomes.len(),
            healthy,
            failing: outcomes.len() - healthy,
        };

        Self {
            round_id,
            outcomes,
            summary,
            partial,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// 轮次耗时
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// 遍历异常结果
    pub fn failing_outcomes(&self) -> impl Iterator<Item = &ProbeOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

/// Duration序列化模块
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(name: &str) -> DomainId {
        DomainId::parse(&format!("https://{name}")).unwrap()
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ProbeErrorKind::Timeout.is_retryable());
        assert!(ProbeErrorKind::Connect.is_retryable());
        assert!(!ProbeErrorKind::Dns.is_retryable());
        assert!(!ProbeErrorKind::Tls.is_retryable());
        assert!(!ProbeErrorKind::UnexpectedStatus.is_retryable());
        assert!(!ProbeErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_outcome_success() {
        let outcome = ProbeOutcome::success(
            domain("example.com"),
            "https://example.com".to_string(),
            200,
            Duration::from_millis(120),
        );

        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(200));
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.error_kind.is_none());
        assert_eq!(outcome.latency_ms(), 120);
    }

    #[test]
    fn test_outcome_failure_builder() {
        let outcome = ProbeOutcome::failure(
            domain("example.com"),
            "https://example.com".to_string(),
            ProbeErrorKind::UnexpectedStatus,
            "状态码：503".to_string(),
            Duration::from_millis(80),
        )
        .with_status_code(503)
        .with_attempts(1);

        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ProbeErrorKind::UnexpectedStatus));
        assert_eq!(outcome.status_code, Some(503));
    }

    #[test]
    fn test_round_summary_counts() {
        let outcomes = vec![
            ProbeOutcome::success(
                domain("a.com"),
                "https://a.com".to_string(),
                200,
                Duration::from_millis(10),
            ),
            ProbeOutcome::failure(
                domain("b.com"),
                "https://b.com".to_string(),
                ProbeErrorKind::Timeout,
                "请求超时".to_string(),
                Duration::from_secs(10),
            ),
            ProbeOutcome::failure(
                domain("c.com"),
                "https://c.com".to_string(),
                ProbeErrorKind::Dns,
                "DNS解析失败".to_string(),
                Duration::from_millis(5),
            ),
        ];

        let round = CheckRound::new(7, outcomes, false, Utc::now());
        assert_eq!(round.round_id, 7);
        assert_eq!(round.summary.total, 3);
        assert_eq!(round.summary.healthy, 1);
        assert_eq!(round.summary.failing, 2);
        assert!(!round.partial);
        assert_eq!(round.failing_outcomes().count(), 2);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ProbeOutcome::success(
            domain("example.com"),
            "https://example.com".to_string(),
            200,
            Duration::from_millis(500),
        );

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("example.com"));

        let deserialized: ProbeOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.domain, outcome.domain);
        assert_eq!(deserialized.latency_ms(), 500);
    }
}
