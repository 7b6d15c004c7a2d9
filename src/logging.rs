//! 日志系统模块
//!
//! 提供结构化日志配置和初始化功能

use crate::config::LoggingConfig;
use log::LevelFilter;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// 全局日志初始化状态（进程内只允许初始化一次）
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<bool>> = OnceLock::new();

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 是否使用JSON格式
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            json_format: false,
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        let level = match config.level.as_str() {
            "debug" => LevelFilter::Debug,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            _ => LevelFilter::Info,
        };

        Self {
            level,
            json_format: config.format == "json",
        }
    }
}

/// 初始化日志系统
///
/// 重复初始化是安全的no-op。RUST_LOG环境变量优先于配置中的级别
///
/// # 参数
/// * `config` - 日志配置
///
/// # 返回
/// * `Result<(), String>` - 初始化结果
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let state = GLOBAL_LOGGING_STATE.get_or_init(|| Mutex::new(false));
    let mut initialized = state.lock().map_err(|e| format!("日志状态锁中毒: {e}"))?;

    if *initialized {
        return Ok(());
    }

    // 桥接log宏到tracing
    tracing_log::LogTracer::init().map_err(|e| format!("初始化log桥接失败: {e}"))?;

    let default_directive = match config.level {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    if config.json_format {
        let subscriber = registry()
            .with(env_filter)
            .with(fmt::layer().json().with_target(true));
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| format!("初始化日志订阅器失败: {e}"))?;
    } else {
        let subscriber = registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false));
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| format!("初始化日志订阅器失败: {e}"))?;
    }

    *initialized = true;
    Ok(())
}
