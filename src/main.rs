//! Domain Vitals 主程序入口

use anyhow::{Context, Result};
use clap::Parser;
use domain_vitals::cli::{Cli, Commands};
use domain_vitals::config::{Config, ConfigLoader, TomlConfigLoader};
use domain_vitals::logging::{init_logging, LogConfig};
use domain_vitals::monitor::DomainMonitor;
use domain_vitals::notification::{
    NoOpDispatcher, NotificationDispatcher, TelegramDispatcher,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path();

    let loader = TomlConfigLoader::new(true);
    let config = loader
        .load_from_file(&config_path)
        .await
        .with_context(|| format!("加载配置文件失败: {}", config_path.display()))?;

    init_logging_from(&cli, &config)?;
    info!(
        "{} v{} 启动，配置文件: {}",
        domain_vitals::APP_NAME,
        domain_vitals::VERSION,
        config_path.display()
    );

    match cli.command {
        Commands::ValidateConfig => validate_config(&config),
        Commands::Check { no_notify } => run_single_check(&config, no_notify).await,
        Commands::Run { no_notify } => run_monitor(&config, no_notify).await,
    }
}

/// 初始化日志，命令行级别优先于配置
fn init_logging_from(cli: &Cli, config: &Config) -> Result<()> {
    let mut logging_config = config.logging.clone();
    if let Some(level) = &cli.log_level {
        logging_config.level = level.clone();
    }

    init_logging(&LogConfig::from(&logging_config))
        .map_err(|e| anyhow::anyhow!("初始化日志系统失败: {e}"))
}

/// 构建通知分发器
fn build_dispatcher(config: &Config, no_notify: bool) -> Result<Arc<dyn NotificationDispatcher>> {
    if no_notify {
        info!("通知发送已禁用");
        return Ok(Arc::new(NoOpDispatcher));
    }

    let dispatcher = TelegramDispatcher::new(&config.telegram)?;
    Ok(Arc::new(dispatcher))
}

/// 验证配置文件
fn validate_config(config: &Config) -> Result<()> {
    let targets = config.build_targets()?;
    println!("配置验证通过");
    println!("群组数量: {}", config.telegram.groups.len());
    println!("监控域名: {} 个（去重后）", targets.len());
    Ok(())
}

/// 执行单轮检查
async fn run_single_check(config: &Config, no_notify: bool) -> Result<()> {
    let dispatcher = build_dispatcher(config, no_notify)?;
    let monitor = DomainMonitor::new(config, dispatcher).await?;

    let round = monitor.run_round().await?;
    let snapshot = monitor.snapshot().await;

    println!(
        "第 {} 轮检查完成: 共 {} 个域名，正常 {} 个，异常 {} 个",
        round.round_id, round.summary.total, round.summary.healthy, round.summary.failing
    );

    for state in snapshot.domains.iter().filter(|d| !d.status.is_healthy()) {
        println!(
            "  ✗ {} - {}（连续失败 {} 次）",
            state.display_name,
            state
                .last_error_kind
                .map(|k| k.description())
                .unwrap_or("未知错误"),
            state.consecutive_failures
        );
    }

    if round.summary.failing > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// 启动周期监控服务
async fn run_monitor(config: &Config, no_notify: bool) -> Result<()> {
    let dispatcher = build_dispatcher(config, no_notify)?;

    if let Err(e) = dispatcher.test_connection().await {
        warn!("通知通道连通性测试失败: {}", e);
    }

    let monitor = Arc::new(DomainMonitor::new(config, dispatcher).await?);

    let budget = monitor.concurrency_budget();
    info!(
        "定时检查已启动，最大循环时间 {} 分钟，并发数 {}（范围 {}-{}）",
        config.check.interval_minutes, budget.current, budget.min, budget.max
    );

    let loop_monitor = Arc::clone(&monitor);
    let loop_handle = tokio::spawn(async move { loop_monitor.run_forever().await });

    tokio::signal::ctrl_c()
        .await
        .context("等待退出信号失败")?;
    info!("收到退出信号，正在停止监控...");
    monitor.shutdown();

    if let Err(e) = loop_handle.await {
        error!("监控循环异常退出: {}", e);
    }

    info!("监控服务已停止");
    Ok(())
}
