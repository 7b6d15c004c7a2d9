//! 通知模块
//!
//! 定义通知载荷、分发trait、消息模板与Telegram分发实现

pub mod dispatcher;
pub mod payload;
pub mod telegram;
pub mod template;

pub use dispatcher::{NoOpDispatcher, NotificationDispatcher};
pub use payload::{DomainReport, GroupSummary, NotificationPayload, PayloadKind, ReportEvent};
pub use telegram::TelegramDispatcher;
pub use template::MessageRenderer;
