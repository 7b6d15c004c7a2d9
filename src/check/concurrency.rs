//! 自适应并发控制器
//!
//! 根据进程所在系统的CPU与内存水位，在每轮检查之间调整并发探测上限

use crate::config::CheckConfig;
use std::sync::Mutex;
use std::time::Instant;
use sysinfo::System;
use tracing::{debug, info, warn};

/// CPU使用率高水位（百分比），超过则降低并发
const HIGH_CPU_WATERMARK: f32 = 80.0;
/// 内存使用率高水位（百分比），超过则降低并发
const HIGH_MEMORY_WATERMARK: f32 = 85.0;
/// CPU使用率低水位（百分比），低于且满足冷却条件才提高并发
const LOW_CPU_WATERMARK: f32 = 30.0;
/// 内存使用率低水位（百分比）
const LOW_MEMORY_WATERMARK: f32 = 70.0;
/// 两次提升之间的最小间隔（秒），避免来回震荡
const INCREASE_COOLDOWN_SECS: u64 = 300;

/// 系统负载采样
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSignal {
    /// CPU使用率（0-100）
    pub cpu_percent: f32,
    /// 内存使用率（0-100）
    pub memory_percent: f32,
}

/// 并发预算
///
/// 进程级单例，只由并发控制器在轮次之间修改；调度器只读
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyBudget {
    /// 当前并发上限
    pub current: usize,
    /// 下限
    pub min: usize,
    /// 上限
    pub max: usize,
    /// 上次调整时间
    pub last_adjusted_at: Option<Instant>,
}

struct ControllerInner {
    budget: ConcurrencyBudget,
    /// 上次提升并发的时间（用于提升冷却）
    last_increase_at: Option<Instant>,
    /// 系统信息采样器
    system: System,
}

/// 并发控制器
///
/// 启动时使用配置的默认并发数。启用自适应时每轮调整一次：
/// 任一资源越过高水位则下调一个步长；两者都低于低水位且距上次
/// 提升超过冷却时间则上调一个步长。调整结果始终落在 [min, max] 内
pub struct ConcurrencyController {
    inner: Mutex<ControllerInner>,
    /// 调整步长
    step: usize,
    /// 是否启用自适应
    auto_adjust: bool,
}

impl ConcurrencyController {
    /// 从检查配置创建并发控制器
    pub fn new(config: &CheckConfig) -> Self {
        let mut system = System::new();
        // 先采一次样，让下一次CPU读数有基线
        system.refresh_cpu_usage();
        system.refresh_memory();

        let budget = ConcurrencyBudget {
            current: config.max_concurrent,
            min: config.min_concurrent,
            max: config.max_concurrent,
            last_adjusted_at: None,
        };

        // 步长取量程的十分之一，至少为1
        let step = (config.max_concurrent / 10).max(1);

        Self {
            inner: Mutex::new(ControllerInner {
                budget,
                last_increase_at: None,
                system,
            }),
            step,
            auto_adjust: config.auto_adjust_concurrent,
        }
    }

    /// 获取当前并发上限
    pub fn current_limit(&self) -> usize {
        self.inner.lock().expect("并发预算锁中毒").budget.current
    }

    /// 获取并发预算快照
    pub fn budget(&self) -> ConcurrencyBudget {
        self.inner.lock().expect("并发预算锁中毒").budget
    }

    /// 采样当前系统负载
    pub fn sample_load(&self) -> LoadSignal {
        let mut inner = self.inner.lock().expect("并发预算锁中毒");
        inner.system.refresh_cpu_usage();
        inner.system.refresh_memory();

        let cpu_percent = inner.system.global_cpu_usage();
        let total = inner.system.total_memory();
        let memory_percent = if total > 0 {
            (inner.system.used_memory() as f64 / total as f64 * 100.0) as f32
        } else {
            0.0
        };

        LoadSignal {
            cpu_percent,
            memory_percent,
        }
    }

    /// 根据负载信号调整并发上限
    ///
    /// 每轮检查开始时由调度器调用一次，单轮最多变化一个步长
    ///
    /// # 参数
    /// * `signal` - 负载采样
    ///
    /// # 返回
    /// * `usize` - 调整后的并发上限
    pub fn adjust(&self, signal: LoadSignal) -> usize {
        if !self.auto_adjust {
            return self.current_limit();
        }

        let mut inner = self.inner.lock().expect("并发预算锁中毒");
        let now = Instant::now();
        let current = inner.budget.current;

        let over_high = signal.cpu_percent > HIGH_CPU_WATERMARK
            || signal.memory_percent > HIGH_MEMORY_WATERMARK;
        let under_low = signal.cpu_percent < LOW_CPU_WATERMARK
            && signal.memory_percent < LOW_MEMORY_WATERMARK;

        if over_high {
            let new_limit = current.saturating_sub(self.step).max(inner.budget.min);
            if new_limit != current {
                warn!(
                    "系统负载过高 (CPU:{:.1}%, MEM:{:.1}%)，降低并发数: {} -> {}",
                    signal.cpu_percent, signal.memory_percent, current, new_limit
                );
                inner.budget.current = new_limit;
                inner.budget.last_adjusted_at = Some(now);
            }
        } else if under_low {
            let cooled_down = inner
                .last_increase_at
                .map(|at| now.duration_since(at).as_secs() >= INCREASE_COOLDOWN_SECS)
                .unwrap_or(true);

            let new_limit = (current + self.step).min(inner.budget.max);
            if cooled_down && new_limit != current {
                info!(
                    "系统负载空闲 (CPU:{:.1}%, MEM:{:.1}%)，提高并发数: {} -> {}",
                    signal.cpu_percent, signal.memory_percent, current, new_limit
                );
                inner.budget.current = new_limit;
                inner.budget.last_adjusted_at = Some(now);
                inner.last_increase_at = Some(now);
            }
        } else {
            debug!(
                "系统负载正常 (CPU:{:.1}%, MEM:{:.1}%)，并发数保持 {}",
                signal.cpu_percent, signal.memory_percent, current
            );
        }

        inner.budget.current
    }

    /// 采样并调整，返回调整后的并发上限
    pub fn adjust_from_sample(&self) -> usize {
        if !self.auto_adjust {
            return self.current_limit();
        }
        let signal = self.sample_load();
        self.adjust(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckConfig;

    fn config(min: usize, max: usize, auto: bool) -> CheckConfig {
        CheckConfig {
            min_concurrent: min,
            max_concurrent: max,
            auto_adjust_concurrent: auto,
            ..CheckConfig::default()
        }
    }

    fn high_load() -> LoadSignal {
        LoadSignal {
            cpu_percent: 95.0,
            memory_percent: 50.0,
        }
    }

    fn idle_load() -> LoadSignal {
        LoadSignal {
            cpu_percent: 5.0,
            memory_percent: 20.0,
        }
    }

    fn normal_load() -> LoadSignal {
        LoadSignal {
            cpu_percent: 50.0,
            memory_percent: 50.0,
        }
    }

    #[test]
    fn test_starts_at_configured_default() {
        let controller = ConcurrencyController::new(&config(4, 50, true));
        assert_eq!(controller.current_limit(), 50);

        let budget = controller.budget();
        assert_eq!(budget.min, 4);
        assert_eq!(budget.max, 50);
    }

    #[test]
    fn test_decrease_on_high_cpu() {
        let controller = ConcurrencyController::new(&config(4, 50, true));
        let limit = controller.adjust(high_load());
        assert_eq!(limit, 45);
    }

    #[test]
    fn test_decrease_on_high_memory() {
        let controller = ConcurrencyController::new(&config(4, 50, true));
        let limit = controller.adjust(LoadSignal {
            cpu_percent: 10.0,
            memory_percent: 90.0,
        });
        assert_eq!(limit, 45);
    }

    #[test]
    fn test_never_below_min() {
        let controller = ConcurrencyController::new(&config(4, 10, true));
        for _ in 0..20 {
            controller.adjust(high_load());
        }
        assert_eq!(controller.current_limit(), 4);
    }

    #[test]
    fn test_at_most_one_step_per_adjust() {
        let controller = ConcurrencyController::new(&config(4, 50, true));
        let before = controller.current_limit();
        let after = controller.adjust(high_load());
        assert_eq!(before - after, 5);
    }

    #[test]
    fn test_increase_respects_cooldown() {
        let controller = ConcurrencyController::new(&config(4, 50, true));
        // 先降两档
        controller.adjust(high_load());
        controller.adjust(high_load());
        assert_eq!(controller.current_limit(), 40);

        // 首次提升：没有历史提升记录，立即生效
        let limit = controller.adjust(idle_load());
        assert_eq!(limit, 45);

        // 冷却期内不再提升
        let limit = controller.adjust(idle_load());
        assert_eq!(limit, 45);
    }

    #[test]
    fn test_never_above_max() {
        let controller = ConcurrencyController::new(&config(4, 50, true));
        let limit = controller.adjust(idle_load());
        // 已在上限，保持不变
        assert_eq!(limit, 50);
    }

    #[test]
    fn test_normal_load_no_change() {
        let controller = ConcurrencyController::new(&config(4, 50, true));
        controller.adjust(high_load());
        let before = controller.current_limit();
        let after = controller.adjust(normal_load());
        assert_eq!(before, after);
    }

    #[test]
    fn test_auto_adjust_disabled() {
        let controller = ConcurrencyController::new(&config(4, 50, false));
        assert_eq!(controller.adjust(high_load()), 50);
        assert_eq!(controller.adjust(idle_load()), 50);
        assert_eq!(controller.current_limit(), 50);
    }

    #[test]
    fn test_sample_load_in_range() {
        let controller = ConcurrencyController::new(&config(4, 50, true));
        let signal = controller.sample_load();
        assert!(signal.memory_percent >= 0.0 && signal.memory_percent <= 100.0);
        assert!(signal.cpu_percent >= 0.0);
    }
}
