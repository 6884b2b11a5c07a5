//! 固定频率控制循环
//!
//! 使用绝对时间锚点驱动 [`RlController::update`]：锚点每周期前移一个周期，
//! 与单次 tick 耗时无关，不会累积漂移。tick 耗时超过周期时记一次超时，
//! 锚点重置到当前时刻，不做追赶。

use crate::controller::{RlController, TickOutcome};
use crate::error::ControllerError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use strider_protocol::ControlConfig;
use tracing::{info, warn};

/// 连续超时时，每隔多少次输出一条告警
const OVERRUN_LOG_INTERVAL: u64 = 1000;

/// 控制循环参数
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// 控制频率（Hz）
    pub frequency_hz: f64,
    /// 最大迭代次数，`None` 表示直到停止标志被清除
    pub max_iterations: Option<u64>,
}

impl LoopConfig {
    /// 使用配置中的 `control_rate_hz`
    pub fn from_control(config: &ControlConfig) -> Self {
        Self {
            frequency_hz: config.control_rate_hz,
            max_iterations: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn period(&self) -> Result<Duration, ControllerError> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(ControllerError::LoopConfig(format!(
                "frequency must be positive and finite, got {}",
                self.frequency_hz
            )));
        }
        Ok(Duration::from_secs_f64(1.0 / self.frequency_hz))
    }
}

/// 循环结束时的统计
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopStats {
    pub iterations: u64,
    pub skipped: u64,
    pub overruns: u64,
    pub elapsed: Duration,
}

/// 以固定频率运行控制器，直到 `running` 被清除或达到最大迭代次数
///
/// 每个 tick 结束后调用 `on_tick`（在控制线程中，不应阻塞）。
pub fn run_control_loop<F>(
    controller: &mut RlController,
    config: &LoopConfig,
    running: &AtomicBool,
    mut on_tick: F,
) -> Result<LoopStats, ControllerError>
where
    F: FnMut(&TickOutcome),
{
    let period = config.period()?;

    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => info!("Control thread priority set to MAX (realtime)"),
            Err(e) => warn!(
                "Failed to set control thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                e
            ),
        }
    }

    info!(
        "Control loop started at {} Hz (period {:?})",
        config.frequency_hz, period
    );

    let handle = controller.handle();
    let mut stats = LoopStats::default();
    let start = Instant::now();
    let mut next_tick = start;
    let mut consecutive_overruns = 0u64;

    // Acquire：观察到 false 时，停止方在此之前的写入均可见
    while running.load(Ordering::Acquire) {
        if config.max_iterations.is_some_and(|max| stats.iterations >= max) {
            break;
        }
        next_tick += period;

        let outcome = controller.update();
        stats.iterations += 1;
        if outcome.is_skipped() {
            stats.skipped += 1;
        }
        on_tick(&outcome);

        let now = Instant::now();
        if next_tick > now {
            consecutive_overruns = 0;
            spin_sleep::sleep(next_tick - now);
        } else {
            stats.overruns += 1;
            handle.metrics().loop_overruns.fetch_add(1, Ordering::Relaxed);
            if consecutive_overruns % OVERRUN_LOG_INTERVAL == 0 {
                warn!(
                    "Control loop overrun: tick finished {:?} late (period {:?})",
                    now.duration_since(next_tick),
                    period
                );
            }
            consecutive_overruns += 1;
            next_tick = now;
        }
    }

    stats.elapsed = start.elapsed();
    info!(
        "Control loop stopped: {} iterations, {} skipped, {} overruns in {:?}",
        stats.iterations, stats.skipped, stats.overruns, stats.elapsed
    );
    Ok(stats)
}
