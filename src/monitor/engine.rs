//! 状态与通知引擎
//!
//! 消费完整的检查轮次，推进每个域名的状态机，应用阈值与冷却规则，
//! 并按群组分区产出通知载荷

use crate::check::{CheckRound, ProbeErrorKind, ProbeOutcome};
use crate::config::{DomainId, DomainTarget, GroupId, NotificationConfig, NotifyMode};
use crate::monitor::state::{DomainState, DomainStatus, EngineStats, StateSnapshot};
use crate::notification::payload::{
    DomainReport, GroupSummary, NotificationPayload, PayloadKind, ReportEvent,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 单个域名一轮状态转移产生的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// 无需通知
    None,
    /// 触发告警
    AlertFired,
    /// 阈值已到但冷却未过，告警被抑制
    AlertSuppressed,
    /// 从异常恢复正常
    Recovered,
}

/// 引擎运行参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 通知模式
    pub mode: NotifyMode,
    /// 失败阈值
    pub failure_threshold: u32,
    /// 告警冷却时间
    pub cooldown: ChronoDuration,
    /// 是否发送恢复通知
    pub notify_on_recovery: bool,
    /// 全量模式下全部正常时是否也产出汇总
    pub notify_on_all_success: bool,
}

impl From<&NotificationConfig> for EngineSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            mode: config.mode,
            failure_threshold: config.failure_threshold,
            cooldown: ChronoDuration::minutes(config.cooldown_minutes as i64),
            notify_on_recovery: config.notify_on_recovery,
            notify_on_all_success: config.notify_on_all_success,
        }
    }
}

struct EngineInner {
    /// 全部域名状态，键为域名标识
    states: HashMap<DomainId, DomainState>,
    /// 累计统计
    stats: EngineStats,
}

/// 状态与通知引擎
///
/// 域名状态表由引擎独占，只在一轮检查完成后整体更新一次；
/// 更新持有写锁原子完成，外部读者（状态查询）只能看到
/// 完整更新前后的快照，不存在半更新可见性
pub struct StateEngine {
    settings: EngineSettings,
    inner: RwLock<EngineInner>,
}

impl StateEngine {
    /// 创建新的状态引擎
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            inner: RwLock::new(EngineInner {
                states: HashMap::new(),
                stats: EngineStats::default(),
            }),
        }
    }

    /// 同步域名状态表与目标集
    ///
    /// 移除不再配置的域名，为新增域名创建Healthy初始状态；
    /// 与目标替换同步调用，保证状态表与配置一一对应
    pub async fn sync_targets(&self, targets: &[DomainTarget]) {
        let mut inner = self.inner.write().await;
        let keep: HashSet<&DomainId> = targets.iter().map(|t| &t.id).collect();
        inner.states.retain(|id, _| keep.contains(id));

        for target in targets {
            inner
                .states
                .entry(target.id.clone())
                .or_insert_with(|| DomainState::new(target));
        }

        debug!("状态表已同步，当前 {} 个域名", inner.states.len());
    }

    /// 对单个域名状态应用一轮探测结果
    ///
    /// 状态机转移规则：
    /// - 成功：计数清零；此前异常则转为Recovered并产生恢复事件，
    ///   此前Recovered/Healthy则为Healthy
    /// - 失败：计数加一；达到阈值且无未过期冷却则转为Alerting并告警，
    ///   冷却未过则抑制（计数继续累加）
    ///
    /// 冷却锚点在恢复后保留：同一域名两次告警的间隔永远不小于冷却时间
    pub fn transition(
        state: &mut DomainState,
        outcome: &ProbeOutcome,
        settings: &EngineSettings,
        now: DateTime<Utc>,
    ) -> RoundEvent {
        state.last_checked_at = Some(outcome.timestamp);
        state.last_status_code = outcome.status_code;
        state.last_latency_ms = Some(outcome.latency_ms());

        if outcome.success {
            let was_failing = matches!(
                state.status,
                DomainStatus::Failing | DomainStatus::Alerting
            );
            state.consecutive_failures = 0;
            state.last_error_kind = None;

            if was_failing {
                state.status = DomainStatus::Recovered;
                return RoundEvent::Recovered;
            }

            state.status = DomainStatus::Healthy;
            return RoundEvent::None;
        }

        state.consecutive_failures += 1;
        state.last_error_kind = Some(outcome.error_kind.unwrap_or(ProbeErrorKind::Unknown));

        if state.status.is_healthy() {
            state.status = DomainStatus::Failing;
        }

        if state.consecutive_failures >= settings.failure_threshold {
            let cooldown_expired = state
                .last_alert_at
                .map(|at| now - at >= settings.cooldown)
                .unwrap_or(true);

            if cooldown_expired {
                state.status = DomainStatus::Alerting;
                state.last_alert_at = Some(now);
                return RoundEvent::AlertFired;
            }

            return RoundEvent::AlertSuppressed;
        }

        RoundEvent::None
    }

    /// 消费一轮检查结果，返回按群组分区的通知载荷
    ///
    /// 不完整轮次只更新实际探测过的域名；未覆盖的域名状态保持不变
    pub async fn apply_round(&self, round: &CheckRound) -> Vec<NotificationPayload> {
        let mut inner = self.inner.write().await;
        let EngineInner { states, stats } = &mut *inner;
        let now = Utc::now();

        let mut tallies: BTreeMap<GroupId, GroupSummary> = BTreeMap::new();
        let mut smart_rows: BTreeMap<GroupId, Vec<DomainReport>> = BTreeMap::new();
        let mut full_rows: BTreeMap<GroupId, Vec<DomainReport>> = BTreeMap::new();

        for outcome in &round.outcomes {
            let Some(state) = states.get_mut(&outcome.domain) else {
                warn!("收到未登记域名的探测结果，已忽略: {}", outcome.domain);
                continue;
            };

            let event = Self::transition(state, outcome, &self.settings, now);
            let group = state.group_id.clone();

            let tally = tallies.entry(group.clone()).or_default();
            tally.total += 1;
            if outcome.success {
                tally.healthy += 1;
            } else {
                tally.failing += 1;
            }

            match event {
                RoundEvent::AlertFired => {
                    stats.alerts_emitted += 1;
                    let report = Self::report(state, ReportEvent::Alert);
                    smart_rows
                        .entry(group.clone())
                        .or_default()
                        .push(report.clone());
                    full_rows.entry(group).or_default().push(report);
                }
                RoundEvent::Recovered => {
                    if self.settings.notify_on_recovery {
                        stats.recoveries_emitted += 1;
                        let report = Self::report(state, ReportEvent::Recovery);
                        smart_rows
                            .entry(group.clone())
                            .or_default()
                            .push(report.clone());
                        full_rows.entry(group).or_default().push(report);
                    }
                }
                RoundEvent::AlertSuppressed | RoundEvent::None => {
                    if !outcome.success {
                        full_rows
                            .entry(group)
                            .or_default()
                            .push(Self::report(state, ReportEvent::Failing));
                    }
                }
            }
        }

        stats.rounds_processed += 1;
        stats.checks_processed += round.summary.total as u64;

        let mut payloads = Vec::new();
        match self.settings.mode {
            NotifyMode::Full => {
                for (group, tally) in &tallies {
                    let mut rows = full_rows.remove(group).unwrap_or_default();
                    if rows.is_empty() && !self.settings.notify_on_all_success {
                        continue;
                    }
                    Self::sort_rows(&mut rows);
                    payloads.push(NotificationPayload {
                        group_id: group.clone(),
                        kind: PayloadKind::Full,
                        round_id: round.round_id,
                        partial: round.partial,
                        domains: rows,
                        summary: *tally,
                    });
                }
            }
            NotifyMode::Smart => {
                for (group, mut rows) in smart_rows {
                    if rows.is_empty() {
                        continue;
                    }
                    Self::sort_rows(&mut rows);
                    let summary = tallies.get(&group).copied().unwrap_or_default();
                    payloads.push(NotificationPayload {
                        group_id: group,
                        kind: PayloadKind::SmartDiff,
                        round_id: round.round_id,
                        partial: round.partial,
                        domains: rows,
                        summary,
                    });
                }
            }
        }

        payloads
    }

    /// 获取全部域名状态的只读快照
    pub async fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.read().await;
        let mut domains: Vec<DomainState> = inner.states.values().cloned().collect();
        domains.sort_by(|a, b| a.domain.cmp(&b.domain));

        let healthy = domains.iter().filter(|d| d.status.is_healthy()).count();
        let total = domains.len();

        StateSnapshot {
            generated_at: Utc::now(),
            total,
            healthy,
            failing: total - healthy,
            stats: inner.stats,
            domains,
        }
    }

    /// 从状态构建通知条目
    fn report(state: &DomainState, event: ReportEvent) -> DomainReport {
        DomainReport {
            domain: state.domain.clone(),
            display_name: state.display_name.clone(),
            url: state.url.clone(),
            event,
            status: state.status,
            error_kind: if event == ReportEvent::Recovery {
                None
            } else {
                state.last_error_kind
            },
            status_code: state.last_status_code,
            latency_ms: state.last_latency_ms,
            consecutive_failures: state.consecutive_failures,
        }
    }

    /// 条目排序：按错误类型聚类，同类内按域名排序，恢复条目在前
    fn sort_rows(rows: &mut [DomainReport]) {
        rows.sort_by(|a, b| {
            let key = |r: &DomainReport| {
                (
                    r.event != ReportEvent::Recovery,
                    r.error_kind.map(|k| k as u8).unwrap_or(u8::MAX),
                    r.domain.clone(),
                )
            };
            key(a).cmp(&key(b))
        });
    }
}
