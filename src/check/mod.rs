//! 检查引擎模块
//!
//! 包含探测器、重试策略、并发控制与批量调度器

pub mod concurrency;
pub mod outcome;
pub mod prober;
pub mod retry;
pub mod scheduler;

pub use concurrency::{ConcurrencyBudget, ConcurrencyController, LoadSignal};
pub use outcome::{CheckRound, ProbeErrorKind, ProbeOutcome, RoundSummary};
pub use prober::{HttpProber, Prober};
pub use retry::RetryPolicy;
pub use scheduler::BatchScheduler;
