//! 控制器运行指标
//!
//! 原子计数器，控制线程写入，任意线程读取，无锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制器实时指标
///
/// ```rust
/// use strider_control::ControllerMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = ControllerMetrics::default();
/// metrics.ticks.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().ticks, 1);
/// ```
#[derive(Debug, Default)]
pub struct ControllerMetrics {
    /// `update()` 调用总次数
    pub ticks: AtomicU64,

    /// 成功发布关节指令的次数
    pub commands_issued: AtomicU64,

    /// 策略推理次数
    pub inferences: AtomicU64,

    /// 因传感器/推理错误被跳过的 tick 数
    ///
    /// 持续增长说明某路传感器断流或推理引擎异常。
    pub skipped_ticks: AtomicU64,

    /// 控制线程观察到的模式进入事件
    pub mode_transitions: AtomicU64,

    /// 控制循环超时（单次 tick 耗时超过周期）次数
    pub loop_overruns: AtomicU64,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            commands_issued: self.commands_issued.load(Ordering::Relaxed),
            inferences: self.inferences.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            mode_transitions: self.mode_transitions.load(Ordering::Relaxed),
            loop_overruns: self.loop_overruns.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.commands_issued.store(0, Ordering::Relaxed);
        self.inferences.store(0, Ordering::Relaxed);
        self.skipped_ticks.store(0, Ordering::Relaxed);
        self.mode_transitions.store(0, Ordering::Relaxed);
        self.loop_overruns.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub commands_issued: u64,
    pub inferences: u64,
    pub skipped_ticks: u64,
    pub mode_transitions: u64,
    pub loop_overruns: u64,
}

impl MetricsSnapshot {
    /// 被跳过的 tick 占比（百分比）；`ticks` 为 0 时返回 0.0
    pub fn skip_rate(&self) -> f64 {
        if self.ticks == 0 {
            return 0.0;
        }
        (self.skipped_ticks as f64 / self.ticks as f64) * 100.0
    }
}
