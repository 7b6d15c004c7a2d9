//! 监控核心模块
//!
//! 将批量调度器、状态引擎与通知分发器组装为完整的监控服务

pub mod engine;
pub mod state;

pub use engine::{EngineSettings, RoundEvent, StateEngine};
pub use state::{DomainState, DomainStatus, EngineStats, StateSnapshot};

use crate::check::{
    BatchScheduler, CheckRound, ConcurrencyBudget, ConcurrencyController, HttpProber, Prober,
};
use crate::config::{CheckConfig, Config, DomainTarget};
use crate::error::Result;
use crate::notification::NotificationDispatcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// 域名监控服务
///
/// 对外暴露触发、取消、目标替换与状态查询四个操作；
/// 一轮检查完成后结果交给状态引擎，产出的载荷交给分发器
pub struct DomainMonitor {
    scheduler: Arc<BatchScheduler>,
    engine: Arc<StateEngine>,
    concurrency: Arc<ConcurrencyController>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    check_config: CheckConfig,
    /// 停止标志
    shutdown: AtomicBool,
    /// 停止唤醒器（打断轮次之间的等待）
    shutdown_notify: Notify,
}

impl DomainMonitor {
    /// 从配置创建监控服务
    ///
    /// # 参数
    /// * `config` - 应用配置
    /// * `dispatcher` - 通知分发器
    pub async fn new(
        config: &Config,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Result<Self> {
        let prober = Arc::new(HttpProber::new(Duration::from_secs(
            config.check.timeout_seconds,
        ))?);
        Self::with_prober(config, dispatcher, prober).await
    }

    /// 使用自定义探测器创建监控服务（测试用）
    pub async fn with_prober(
        config: &Config,
        dispatcher: Arc<dyn NotificationDispatcher>,
        prober: Arc<dyn Prober>,
    ) -> Result<Self> {
        let concurrency = Arc::new(ConcurrencyController::new(&config.check));
        let scheduler = Arc::new(BatchScheduler::new(
            prober,
            Arc::clone(&concurrency),
            &config.check,
        ));
        let engine = Arc::new(StateEngine::new(EngineSettings::from(&config.notification)));

        let targets = config.build_targets()?;
        info!("已加载 {} 个监控目标", targets.len());
        scheduler.replace_targets(targets.clone()).await?;
        engine.sync_targets(&targets).await;

        Ok(Self {
            scheduler,
            engine,
            concurrency,
            dispatcher,
            check_config: config.check.clone(),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
        })
    }

    /// 执行一轮检查并分发通知
    ///
    /// 已有轮次在运行时快速失败；通知投递失败只记录日志，
    /// 不影响状态机与本轮结果
    pub async fn run_round(&self) -> Result<CheckRound> {
        let round = self.scheduler.run_round().await?;
        let payloads = self.engine.apply_round(&round).await;

        for payload in &payloads {
            if let Err(e) = self.dispatcher.dispatch(payload).await {
                error!("群组 {} 的通知分发失败: {}", payload.group_id, e);
            }
        }

        Ok(round)
    }

    /// 请求取消当前轮次
    pub fn cancel_round(&self) {
        self.scheduler.cancel_round();
    }

    /// 是否有轮次正在进行
    pub fn is_round_running(&self) -> bool {
        self.scheduler.is_round_running()
    }

    /// 整体替换监控目标集（轮次进行中时拒绝）
    pub async fn replace_targets(&self, targets: Vec<DomainTarget>) -> Result<()> {
        self.scheduler.replace_targets(targets).await?;
        // 状态表与调度器使用同一份去重后的目标集
        let deduped = self.scheduler.targets().await;
        self.engine.sync_targets(&deduped).await;
        Ok(())
    }

    /// 获取全部域名状态的只读快照
    pub async fn snapshot(&self) -> StateSnapshot {
        self.engine.snapshot().await
    }

    /// 获取当前并发预算
    pub fn concurrency_budget(&self) -> ConcurrencyBudget {
        self.concurrency.budget()
    }

    /// 请求停止周期循环
    ///
    /// 进行中的轮次按取消语义收尾（当前波次跑完，后续波次跳过）
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.scheduler.cancel_round();
        self.shutdown_notify.notify_waiters();
    }

    /// 周期执行检查直到收到停止请求
    ///
    /// `interval_minutes` 是最大循环时间：检查提前完成则等待剩余
    /// 时间，超时则立即开始下一轮
    pub async fn run_forever(&self) {
        let max_cycle = Duration::from_secs(self.check_config.interval_minutes * 60);

        while !self.shutdown.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();

            match self.run_round().await {
                Ok(round) => {
                    if round.partial {
                        warn!("第 {} 轮未完整执行", round.round_id);
                    }
                }
                Err(e) => {
                    error!("执行检查轮次失败: {}", e);
                }
            }

            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let elapsed = cycle_start.elapsed();
            if elapsed < max_cycle {
                let wait = max_cycle - elapsed;
                info!(
                    "本轮检查用时 {:.1} 秒，等待 {} 秒后开始下一轮",
                    elapsed.as_secs_f64(),
                    wait.as_secs()
                );
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.shutdown_notify.notified() => break,
                }
            } else {
                warn!(
                    "检查用时 {:.1} 秒，超过最大循环时间 {} 秒，立即开始下一轮",
                    elapsed.as_secs_f64(),
                    max_cycle.as_secs()
                );
            }
        }

        info!("监控循环已停止");
    }
}
