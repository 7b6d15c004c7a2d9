//! 批量检查调度器
//!
//! 将全部监控目标切分为受并发上限约束的波次，驱动重试策略完成一轮
//! 完整检查；支持轮次互斥与波次之间的协作式取消

use crate::check::concurrency::ConcurrencyController;
use crate::check::outcome::{CheckRound, ProbeErrorKind, ProbeOutcome};
use crate::check::prober::Prober;
use crate::check::retry::RetryPolicy;
use crate::config::{CheckConfig, DomainId, DomainTarget};
use crate::error::{CheckError, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// 波次之间的短暂停顿，避免对网络持续满压
const WAVE_PAUSE: Duration = Duration::from_millis(500);

/// 批量检查调度器
///
/// 同一时刻最多允许一轮检查在进行：轮次所有权通过单槽互斥锁表达，
/// 获取失败立即返回"已有轮次在运行"而不是排队等待
pub struct BatchScheduler {
    /// 探测器
    prober: Arc<dyn Prober>,
    /// 重试策略
    retry_policy: RetryPolicy,
    /// 并发控制器（调度器只读取上限，从不修改）
    concurrency: Arc<ConcurrencyController>,
    /// 单次探测超时
    probe_timeout: Duration,
    /// 当前监控目标集（整体替换，轮内只读）
    targets: RwLock<Vec<DomainTarget>>,
    /// 轮次所有权令牌
    round_slot: Mutex<()>,
    /// 协作式取消标志（只在波次之间检查）
    cancel_flag: AtomicBool,
    /// 轮次ID计数器
    round_counter: AtomicU64,
}

impl BatchScheduler {
    /// 创建新的批量调度器
    ///
    /// # 参数
    /// * `prober` - 探测器
    /// * `concurrency` - 并发控制器
    /// * `config` - 检查配置
    pub fn new(
        prober: Arc<dyn Prober>,
        concurrency: Arc<ConcurrencyController>,
        config: &CheckConfig,
    ) -> Self {
        Self {
            prober,
            retry_policy: RetryPolicy::new(
                config.retry_count,
                Duration::from_secs(config.retry_delay_seconds),
            ),
            concurrency,
            probe_timeout: Duration::from_secs(config.timeout_seconds),
            targets: RwLock::new(Vec::new()),
            round_slot: Mutex::new(()),
            cancel_flag: AtomicBool::new(false),
            round_counter: AtomicU64::new(0),
        }
    }

    /// 整体替换监控目标集
    ///
    /// 替换在轮次静止时进行：有轮次在运行时立即拒绝，避免运行中的
    /// 轮次观察到半更新的目标集。目标按域名标识去重
    ///
    /// # 参数
    /// * `new_targets` - 新的目标集
    pub async fn replace_targets(&self, new_targets: Vec<DomainTarget>) -> Result<()> {
        let _slot = self
            .round_slot
            .try_lock()
            .map_err(|_| CheckError::RoundInProgress)?;

        let mut seen: HashSet<DomainId> = HashSet::new();
        let mut deduped = Vec::with_capacity(new_targets.len());
        for target in new_targets {
            if seen.insert(target.id.clone()) {
                deduped.push(target);
            }
        }

        let mut targets = self.targets.write().await;
        info!(
            "监控目标集已替换: {} -> {} 个域名",
            targets.len(),
            deduped.len()
        );
        *targets = deduped;

        Ok(())
    }

    /// 获取当前目标集快照
    pub async fn targets(&self) -> Vec<DomainTarget> {
        self.targets.read().await.clone()
    }

    /// 请求取消当前轮次
    ///
    /// 进行中的波次会执行完毕，后续波次被跳过，轮次标记为不完整
    pub fn cancel_round(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        info!("已请求取消当前检查轮次");
    }

    /// 是否有轮次正在进行
    pub fn is_round_running(&self) -> bool {
        self.round_slot.try_lock().is_err()
    }

    /// 执行一轮完整检查
    ///
    /// 已有轮次在运行或目标集为空时快速失败，不做任何探测。
    /// 每轮开始时让并发控制器根据系统负载调整一次并发上限
    ///
    /// # 返回
    /// * `Result<CheckRound>` - 本轮检查结果
    pub async fn run_round(&self) -> Result<CheckRound> {
        let _slot = self
            .round_slot
            .try_lock()
            .map_err(|_| CheckError::RoundInProgress)?;

        self.cancel_flag.store(false, Ordering::SeqCst);

        let targets = self.targets.read().await.clone();
        if targets.is_empty() {
            return Err(CheckError::NoTargets.into());
        }

        let round_id = self.round_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Utc::now();

        // 并发调整每轮一次，轮内各波次使用同一上限
        let limit = self.concurrency.adjust_from_sample();
        let total_waves = targets.len().div_ceil(limit);

        info!(
            "开始第 {} 轮检查: {} 个域名，并发数 {}，共 {} 个波次",
            round_id,
            targets.len(),
            limit,
            total_waves
        );

        let mut outcomes: Vec<ProbeOutcome> = Vec::with_capacity(targets.len());
        let mut partial = false;

        for (wave_index, wave) in targets.chunks(limit).enumerate() {
            if wave_index > 0 {
                if self.cancel_flag.load(Ordering::SeqCst) {
                    warn!(
                        "第 {} 轮在波次 {}/{} 前被取消，跳过剩余波次",
                        round_id,
                        wave_index + 1,
                        total_waves
                    );
                    partial = true;
                    break;
                }
                tokio::time::sleep(WAVE_PAUSE).await;
            }

            debug!(
                "执行波次 {}/{}，包含 {} 个域名",
                wave_index + 1,
                total_waves,
                wave.len()
            );

            outcomes.extend(self.run_wave(wave).await);
        }

        let round = CheckRound::new(round_id, outcomes, partial, started_at);

        info!(
            "第 {} 轮检查完成: 共 {} 个域名，正常 {} 个，异常 {} 个，耗时 {:.1} 秒{}",
            round.round_id,
            round.summary.total,
            round.summary.healthy,
            round.summary.failing,
            round.duration().num_milliseconds() as f64 / 1000.0,
            if round.partial { "（不完整）" } else { "" }
        );

        Ok(round)
    }

    /// 并发执行一个波次
    ///
    /// 波次内每个域名一个任务；任务崩溃被捕获并转换为终止性的
    /// 失败结果，不影响同波次的其他域名
    async fn run_wave(&self, wave: &[DomainTarget]) -> Vec<ProbeOutcome> {
        let handles: Vec<_> = wave
            .iter()
            .map(|target| {
                let prober = Arc::clone(&self.prober);
                let retry_policy = self.retry_policy.clone();
                let probe_timeout = self.probe_timeout;
                let target = target.clone();
                tokio::spawn(async move {
                    retry_policy
                        .run(prober.as_ref(), &target, probe_timeout)
                        .await
                })
            })
            .collect();

        let results = futures::future::join_all(handles).await;

        results
            .into_iter()
            .zip(wave.iter())
            .map(|(result, target)| match result {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    error!(
                        "域名 {} 的探测任务异常终止: {}",
                        target.display_name, join_error
                    );
                    ProbeOutcome::failure(
                        target.id.clone(),
                        target.url.clone(),
                        ProbeErrorKind::Unknown,
                        format!("探测任务异常终止: {join_error}"),
                        Duration::ZERO,
                    )
                }
            })
            .collect()
    }
}
