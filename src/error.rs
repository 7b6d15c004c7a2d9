//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Domain Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum DomainVitalsError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 检查轮次相关错误
    #[error("检查错误: {0}")]
    Check(#[from] CheckError),

    /// 通知相关错误
    #[error("通知错误: {0}")]
    Notification(#[from] NotificationError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },

    /// 域名标识无效
    #[error("无效的域名: {domain}")]
    InvalidDomain { domain: String },
}

/// 检查轮次错误类型
///
/// 注意：单个域名的探测失败不属于错误，它们总是以 `ProbeOutcome` 值的
/// 形式返回。这里只有"整轮无法开始"级别的失败。
#[derive(Error, Debug)]
pub enum CheckError {
    /// 已有检查轮次在运行中
    #[error("已有检查轮次在运行中")]
    RoundInProgress,

    /// 域名列表为空
    #[error("没有配置监控域名")]
    NoTargets,

    /// HTTP客户端创建失败
    #[error("HTTP客户端创建失败: {0}")]
    ClientError(#[from] reqwest::Error),
}

/// 通知错误类型
#[derive(Error, Debug)]
pub enum NotificationError {
    /// 发送失败
    #[error("通知发送失败: {0}")]
    SendError(String),

    /// 模板渲染错误
    #[error("模板渲染失败: {0}")]
    TemplateError(String),

    /// 配置错误
    #[error("通知配置错误: {0}")]
    ConfigError(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, DomainVitalsError>;
