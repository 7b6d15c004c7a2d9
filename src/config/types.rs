//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体、域名目标构建与验证逻辑

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// 默认接受的HTTP状态码
///
/// 包含成功、各类重定向以及认证相关状态码（站点正常但需要登录）
pub const DEFAULT_EXPECTED_STATUS_CODES: &[u16] = &[
    200, 201, 202, 203, 204, 301, 302, 303, 304, 307, 308, 401, 403,
];

/// 主配置结构，包含检查、通知与群组配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 检查相关配置
    #[serde(default)]
    pub check: CheckConfig,
    /// 通知相关配置
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Telegram群组配置
    pub telegram: TelegramConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 检查配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckConfig {
    /// 最大循环时间（分钟），检查提前完成则等待剩余时间
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// 单次探测超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// 可重试错误的重试次数（总尝试数 = retry_count + 1）
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// 重试前的固定延迟（秒）
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    /// 最大并发探测数（自适应调整的上限，同时是起始值）
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// 最小并发探测数（自适应调整的下限）
    #[serde(default = "default_min_concurrent")]
    pub min_concurrent: usize,
    /// 是否根据系统资源自动调整并发数
    #[serde(default = "default_auto_adjust")]
    pub auto_adjust_concurrent: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            timeout_seconds: default_timeout(),
            retry_count: default_retry_count(),
            retry_delay_seconds: default_retry_delay(),
            max_concurrent: default_max_concurrent(),
            min_concurrent: default_min_concurrent(),
            auto_adjust_concurrent: default_auto_adjust(),
        }
    }
}

/// 通知模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    /// 每轮报告全部异常域名（按错误类型分组）
    Full,
    /// 只报告状态变化（新告警与新恢复）
    Smart,
}

/// 通知配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationConfig {
    /// 通知模式
    #[serde(default = "default_notify_mode")]
    pub mode: NotifyMode,
    /// 失败阈值：连续失败达到该次数才触发首次告警
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// 告警冷却时间（分钟）：同一域名两次告警之间的最小间隔
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
    /// 是否在域名恢复时发送通知
    #[serde(default = "default_notify_on_recovery")]
    pub notify_on_recovery: bool,
    /// 全量模式下，全部正常的轮次是否也发送汇总
    #[serde(default)]
    pub notify_on_all_success: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            mode: default_notify_mode(),
            failure_threshold: default_failure_threshold(),
            cooldown_minutes: default_cooldown_minutes(),
            notify_on_recovery: default_notify_on_recovery(),
            notify_on_all_success: false,
        }
    }
}

/// Telegram配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramConfig {
    /// Bot Token
    pub bot_token: String,
    /// 监控群组列表
    pub groups: Vec<GroupConfig>,
}

/// 单个监控群组配置
///
/// 每个群组维护独立的域名列表与通知目标，探测过程对全部群组统一进行
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupConfig {
    /// 群组标识（用于通知分区）
    pub id: String,
    /// 群组显示名称
    #[serde(default)]
    pub name: String,
    /// Telegram 聊天ID
    pub chat_id: String,
    /// 监控域名列表（可省略协议，默认 https://）
    pub domains: Vec<String>,
    /// 群组级期望状态码（省略时使用默认集合）
    pub expected_status_codes: Option<Vec<u16>>,
}

/// 日志配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 输出格式（pretty 或 json）
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// 默认值函数
fn default_interval_minutes() -> u64 {
    30
}
fn default_timeout() -> u64 {
    10
}
fn default_retry_count() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    5
}
fn default_max_concurrent() -> usize {
    50
}
fn default_min_concurrent() -> usize {
    4
}
fn default_auto_adjust() -> bool {
    true
}
fn default_notify_mode() -> NotifyMode {
    NotifyMode::Smart
}
fn default_failure_threshold() -> u32 {
    2
}
fn default_cooldown_minutes() -> u64 {
    60
}
fn default_notify_on_recovery() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// 经过验证的域名标识
///
/// 以URL的host部分作为域名的唯一键，状态表与去重都以它为准
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(String);

impl DomainId {
    /// 从URL解析域名标识
    ///
    /// # 参数
    /// * `url` - 完整URL（需包含协议前缀）
    ///
    /// # 返回
    /// * `Result<Self, ConfigError>` - 域名标识或错误
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| ConfigError::InvalidDomain {
                domain: url.to_string(),
            })?;

        let host = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidDomain {
                domain: url.to_string(),
            });
        }

        Ok(Self(host))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 群组标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 单个监控目标
///
/// 从配置加载后在一轮检查内不可变，配置重载时整体替换
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainTarget {
    /// 域名标识（host部分）
    pub id: DomainId,
    /// 探测URL
    pub url: String,
    /// 显示名称
    pub display_name: String,
    /// 期望的状态码列表
    pub expected_status_codes: Vec<u16>,
    /// 所属群组
    pub group_id: GroupId,
}

impl DomainTarget {
    /// 从配置中的域名条目构建监控目标
    ///
    /// 省略协议的条目自动补全 https:// 前缀
    pub fn from_entry(
        entry: &str,
        group: &GroupConfig,
    ) -> Result<Self, ConfigError> {
        let entry = entry.trim();
        let url = if entry.starts_with("http://") || entry.starts_with("https://") {
            entry.to_string()
        } else {
            format!("https://{entry}")
        };

        let id = DomainId::parse(&url)?;
        let expected = group
            .expected_status_codes
            .clone()
            .unwrap_or_else(|| DEFAULT_EXPECTED_STATUS_CODES.to_vec());

        Ok(Self {
            display_name: id.to_string(),
            id,
            url,
            expected_status_codes: expected,
            group_id: GroupId::new(group.id.clone()),
        })
    }

    /// 判断状态码是否在期望集合中
    pub fn is_expected_status(&self, status_code: u16) -> bool {
        self.expected_status_codes.contains(&status_code)
    }
}

impl Config {
    /// 构建全部监控目标
    ///
    /// 在加载边界完成协议补全、验证与按域名标识去重；
    /// 同一域名在多个群组出现时保留首次出现的归属
    pub fn build_targets(&self) -> Result<Vec<DomainTarget>, ConfigError> {
        let mut seen: HashSet<DomainId> = HashSet::new();
        let mut targets = Vec::new();

        for group in &self.telegram.groups {
            for entry in &group.domains {
                let target = DomainTarget::from_entry(entry, group)?;
                if seen.insert(target.id.clone()) {
                    targets.push(target);
                }
            }
        }

        Ok(targets)
    }
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证检查配置
    if config.check.interval_minutes == 0 {
        return Err("最大循环时间不能为0".to_string());
    }

    if config.check.timeout_seconds == 0 {
        return Err("探测超时时间不能为0".to_string());
    }

    if config.check.max_concurrent == 0 {
        return Err("最大并发探测数不能为0".to_string());
    }

    if config.check.min_concurrent == 0 || config.check.min_concurrent > config.check.max_concurrent
    {
        return Err(format!(
            "并发下限 {} 必须在 [1, {}] 范围内",
            config.check.min_concurrent, config.check.max_concurrent
        ));
    }

    // 验证通知配置
    if config.notification.failure_threshold == 0 {
        return Err("失败阈值不能为0".to_string());
    }

    // 验证日志级别
    let valid_log_levels = ["debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.logging.level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.logging.level, valid_log_levels
        ));
    }

    let valid_log_formats = ["pretty", "json"];
    if !valid_log_formats.contains(&config.logging.format.as_str()) {
        return Err(format!(
            "无效的日志格式: {}，支持的格式: {:?}",
            config.logging.format, valid_log_formats
        ));
    }

    // 验证群组配置
    if config.telegram.bot_token.trim().is_empty() {
        return Err("必须配置 Telegram Bot Token".to_string());
    }

    if config.telegram.groups.is_empty() {
        return Err("至少需要配置一个监控群组".to_string());
    }

    let mut group_ids = HashSet::new();
    for group in &config.telegram.groups {
        if group.id.trim().is_empty() {
            return Err("群组标识不能为空".to_string());
        }

        if !group_ids.insert(group.id.as_str()) {
            return Err(format!("群组标识重复: {}", group.id));
        }

        if group.chat_id.trim().is_empty() {
            return Err(format!("群组 {} 的聊天ID不能为空", group.id));
        }

        if group.domains.is_empty() {
            return Err(format!("群组 {} 至少需要配置一个域名", group.id));
        }

        for entry in &group.domains {
            if entry.trim().is_empty() {
                return Err(format!("群组 {} 存在空的域名条目", group.id));
            }
        }

        if let Some(codes) = &group.expected_status_codes {
            if codes.is_empty() {
                return Err(format!("群组 {} 的期望状态码列表不能为空", group.id));
            }
            for &code in codes {
                if !(100..=599).contains(&code) {
                    return Err(format!("群组 {} 的状态码 {} 无效", group.id, code));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            check: CheckConfig::default(),
            notification: NotificationConfig::default(),
            telegram: TelegramConfig {
                bot_token: "123456:test-token".to_string(),
                groups: vec![GroupConfig {
                    id: "ops".to_string(),
                    name: "运维监控群".to_string(),
                    chat_id: "-1001234567890".to_string(),
                    domains: vec!["example.com".to_string(), "https://api.example.com/health".to_string()],
                    expected_status_codes: None,
                }],
            },
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = create_test_config();

        let serialized = toml::to_string(&config).expect("序列化失败");
        assert!(!serialized.is_empty());

        let deserialized: Config = toml::from_str(&serialized).expect("反序列化失败");
        assert_eq!(
            config.check.interval_minutes,
            deserialized.check.interval_minutes
        );
        assert_eq!(
            config.telegram.groups.len(),
            deserialized.telegram.groups.len()
        );
        assert_eq!(config.telegram.groups[0].id, deserialized.telegram.groups[0].id);
    }

    #[test]
    fn test_default_values() {
        let check = CheckConfig::default();
        assert_eq!(check.interval_minutes, 30);
        assert_eq!(check.timeout_seconds, 10);
        assert_eq!(check.retry_count, 2);
        assert_eq!(check.retry_delay_seconds, 5);
        assert_eq!(check.max_concurrent, 50);
        assert_eq!(check.min_concurrent, 4);
        assert!(check.auto_adjust_concurrent);

        let notification = NotificationConfig::default();
        assert_eq!(notification.mode, NotifyMode::Smart);
        assert_eq!(notification.failure_threshold, 2);
        assert_eq!(notification.cooldown_minutes, 60);
        assert!(notification.notify_on_recovery);
        assert!(!notification.notify_on_all_success);
    }

    #[test]
    fn test_domain_id_parse() {
        let id = DomainId::parse("https://Example.COM/path?q=1").unwrap();
        assert_eq!(id.as_str(), "example.com");

        let id = DomainId::parse("http://api.example.com:8443/health").unwrap();
        assert_eq!(id.as_str(), "api.example.com:8443");

        assert!(DomainId::parse("example.com").is_err());
        assert!(DomainId::parse("https://").is_err());
    }

    #[test]
    fn test_target_from_entry_adds_scheme() {
        let group = GroupConfig {
            id: "g1".to_string(),
            name: String::new(),
            chat_id: "-100".to_string(),
            domains: vec![],
            expected_status_codes: None,
        };

        let target = DomainTarget::from_entry("example.com", &group).unwrap();
        assert_eq!(target.url, "https://example.com");
        assert_eq!(target.display_name, "example.com");
        assert_eq!(
            target.expected_status_codes,
            DEFAULT_EXPECTED_STATUS_CODES.to_vec()
        );

        let target = DomainTarget::from_entry("http://legacy.example.com", &group).unwrap();
        assert_eq!(target.url, "http://legacy.example.com");
    }

    #[test]
    fn test_build_targets_dedup() {
        let mut config = create_test_config();
        config.telegram.groups[0]
            .domains
            .push("https://example.com".to_string());

        let targets = config.build_targets().unwrap();
        // example.com 出现两次，去重后保留 example.com 与 api.example.com
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id.as_str(), "example.com");
        assert_eq!(targets[1].id.as_str(), "api.example.com");
    }

    #[test]
    fn test_build_targets_keeps_first_group() {
        let mut config = create_test_config();
        config.telegram.groups.push(GroupConfig {
            id: "second".to_string(),
            name: String::new(),
            chat_id: "-200".to_string(),
            domains: vec!["example.com".to_string()],
            expected_status_codes: None,
        });

        let targets = config.build_targets().unwrap();
        let example = targets
            .iter()
            .find(|t| t.id.as_str() == "example.com")
            .unwrap();
        assert_eq!(example.group_id.as_str(), "ops");
    }

    #[test]
    fn test_config_validation() {
        let config = create_test_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_config_validation_empty_groups() {
        let mut config = create_test_config();
        config.telegram.groups.clear();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("至少需要配置一个监控群组"));
    }

    #[test]
    fn test_config_validation_duplicate_group_id() {
        let mut config = create_test_config();
        let duplicate = config.telegram.groups[0].clone();
        config.telegram.groups.push(duplicate);

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("群组标识重复"));
    }

    #[test]
    fn test_config_validation_invalid_status_code() {
        let mut config = create_test_config();
        config.telegram.groups[0].expected_status_codes = Some(vec![999]);

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("状态码"));
    }

    #[test]
    fn test_config_validation_concurrency_bounds() {
        let mut config = create_test_config();
        config.check.min_concurrent = 100;
        config.check.max_concurrent = 10;

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("并发下限"));
    }

    #[test]
    fn test_expected_status_check() {
        let group = GroupConfig {
            id: "g1".to_string(),
            name: String::new(),
            chat_id: "-100".to_string(),
            domains: vec![],
            expected_status_codes: Some(vec![200, 204]),
        };

        let target = DomainTarget::from_entry("example.com", &group).unwrap();
        assert!(target.is_expected_status(200));
        assert!(target.is_expected_status(204));
        assert!(!target.is_expected_status(301));
        assert!(!target.is_expected_status(500));
    }
}
