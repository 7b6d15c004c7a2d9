//! 配置管理模块
//!
//! 提供配置类型定义与TOML加载功能

pub mod loader;
pub mod types;

pub use loader::{ConfigLoader, TomlConfigLoader};
pub use types::{
    validate_config, CheckConfig, Config, DomainId, DomainTarget, GroupConfig, GroupId,
    LoggingConfig, NotificationConfig, NotifyMode, TelegramConfig,
    DEFAULT_EXPECTED_STATUS_CODES,
};
