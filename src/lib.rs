//! Domain Vitals - 批量域名可用性监控引擎
//!
//! 这是一个用Rust编写的域名可用性监控工具，支持：
//! - HTTP/HTTPS批量探测与错误分类
//! - 自适应并发控制（基于CPU/内存水位）
//! - 失败阈值、冷却时间与恢复通知的状态机
//! - 按群组分区的Telegram通知
//! - 结构化日志记录

pub mod check;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;

// 重新导出主要类型
pub use check::{BatchScheduler, CheckRound, ProbeErrorKind, ProbeOutcome, Prober};
pub use config::{Config, DomainTarget, GroupId};
pub use error::DomainVitalsError;
pub use monitor::{DomainState, DomainStatus, StateEngine};
pub use notification::{NotificationPayload, PayloadKind};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
