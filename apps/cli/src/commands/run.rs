//! run 命令
//!
//! 在当前线程运行固定频率控制循环，合成回环线程提供传感器样本，
//! 发布线程把关节指令以 JSON 行写到 stdout。
//!
//! 模式时间表：Stand `--stand-secs` 秒 → Walk `--walk-secs` 秒 → Zero → 退出。

use crate::plant::{self, KinematicPlant};
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::{Receiver, TrySendError, bounded};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use strider_control::{
    CommandOutput, LinearPolicyLoader, LoopConfig, RlController, TickOutcome, run_control_loop,
};
use strider_protocol::{ControlMode, Float64MultiArray, JointCommand, Twist};
use tracing::{info, warn};

/// 发布通道容量（满时丢弃，不阻塞控制线程）
const EMIT_QUEUE_CAPACITY: usize = 64;

/// 控制循环命令参数
#[derive(Args, Debug)]
pub struct RunCommand {
    /// 控制配置文件（TOML）
    #[arg(short, long)]
    pub config: PathBuf,

    /// 输出仿真格式（Float64MultiArray），否则输出真机格式
    #[arg(long)]
    pub sim: bool,

    /// 覆盖控制频率（Hz）
    #[arg(long)]
    pub rate: Option<f64>,

    /// 站立时长（秒）
    #[arg(long, default_value_t = 2.0)]
    pub stand_secs: f64,

    /// 行走时长（秒）
    #[arg(long, default_value_t = 5.0)]
    pub walk_secs: f64,

    /// 回零时长（秒）
    #[arg(long, default_value_t = 0.0)]
    pub zero_secs: f64,

    /// 前向速度指令（m/s）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub vx: f64,

    /// 侧向速度指令（m/s）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub vy: f64,

    /// 偏航角速度指令（rad/s）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub wz: f64,

    /// 每隔多少个 tick 输出一次指令（0 表示不输出）
    #[arg(long, default_value_t = 50)]
    pub emit_every: u64,

    /// 合成关节模型时间常数（秒）
    #[arg(long, default_value_t = 0.02)]
    pub plant_tau: f64,
}

/// 单条输出记录
#[derive(Debug, Serialize)]
struct EmitRecord {
    tick: u64,
    mode: &'static str,
    ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sim: Option<Float64MultiArray>,
    #[serde(skip_serializing_if = "Option::is_none")]
    real: Option<JointCommand>,
}

impl EmitRecord {
    fn new(tick: u64, mode: ControlMode, ready: bool, output: CommandOutput) -> Self {
        let (sim, real) = match output {
            CommandOutput::Sim(array) => (Some(array), None),
            CommandOutput::Real(cmd) => (None, Some(cmd)),
        };
        Self {
            tick,
            mode: mode.name(),
            ready,
            sim,
            real,
        }
    }
}

/// 模式时间表（tick 边界）
#[derive(Debug, Clone, Copy, PartialEq)]
struct Schedule {
    walk_at: u64,
    zero_at: u64,
    end_at: u64,
}

impl Schedule {
    fn new(rate_hz: f64, stand_secs: f64, walk_secs: f64, zero_secs: f64) -> Self {
        let ticks = |secs: f64| (secs.max(0.0) * rate_hz).round() as u64;
        let walk_at = ticks(stand_secs);
        let zero_at = walk_at + ticks(walk_secs);
        Self {
            walk_at,
            zero_at,
            end_at: zero_at + ticks(zero_secs),
        }
    }

    /// 在第 `tick` 个 tick 之后需要切换到的模式
    fn transition_after(&self, tick: u64) -> Option<ControlMode> {
        if tick == self.walk_at && self.walk_at < self.zero_at {
            Some(ControlMode::Walk)
        } else if tick == self.zero_at && self.zero_at < self.end_at {
            Some(ControlMode::Zero)
        } else {
            None
        }
    }
}

fn spawn_emitter(rx: Receiver<EmitRecord>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("strider-emit".into())
        .spawn(move || {
            let stdout = std::io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for record in rx {
                match serde_json::to_string(&record) {
                    Ok(line) => {
                        if writeln!(out, "{}", line).and_then(|_| out.flush()).is_err() {
                            break;
                        }
                    },
                    Err(e) => warn!("Failed to serialize command: {}", e),
                }
            }
        })
}

impl RunCommand {
    pub fn execute(&self) -> Result<()> {
        let mut config = super::load_config(&self.config)?;
        if let Some(rate) = self.rate {
            config.control_rate_hz = rate;
            config.validate().context("Invalid --rate override")?;
        }
        let rate_hz = config.control_rate_hz;
        let init = config.init_angles();
        let names = config.ordered_joint_names.clone();

        let mut controller = RlController::new(config, self.sim, &LinearPolicyLoader)
            .context("Failed to create controller")?;
        let handle = controller.handle();

        let running = Arc::new(AtomicBool::new(true));
        {
            let running = running.clone();
            ctrlc::set_handler(move || {
                eprintln!("\nReceived interrupt signal. Stopping control loop...");
                running.store(false, Ordering::Release);
            })
            .context("Failed to set signal handler")?;
        }

        let plant_thread = plant::spawn(
            handle.clone(),
            KinematicPlant::new(names, init, self.plant_tau, 1.0 / rate_hz),
            rate_hz,
            running.clone(),
        )
        .context("Failed to spawn plant thread")?;

        let (tx, rx) = bounded(EMIT_QUEUE_CAPACITY);
        let emitter = spawn_emitter(rx).context("Failed to spawn emitter thread")?;

        let schedule = Schedule::new(rate_hz, self.stand_secs, self.walk_secs, self.zero_secs);
        let loop_config = LoopConfig::from_control(controller.config())
            .with_max_iterations(schedule.end_at);

        handle.set_velocity_command(Twist::planar(self.vx, self.vy, self.wz));
        handle.set_mode(ControlMode::Stand);
        info!(
            "Schedule: stand {} ticks, walk {} ticks, zero {} ticks",
            schedule.walk_at,
            schedule.zero_at - schedule.walk_at,
            schedule.end_at - schedule.zero_at
        );

        let mut tick = 0u64;
        let mut dropped = 0u64;
        let stats = run_control_loop(&mut controller, &loop_config, &running, |outcome| {
            tick += 1;
            if let Some(mode) = schedule.transition_after(tick) {
                handle.set_mode(mode);
            }
            if self.emit_every == 0 || tick % self.emit_every != 0 {
                return;
            }
            let mode = match outcome {
                TickOutcome::Idle => ControlMode::Idle,
                TickOutcome::Commanded { mode, .. } | TickOutcome::Skipped { mode, .. } => *mode,
            };
            let record = EmitRecord::new(tick, mode, handle.is_ready(), handle.command_of_record());
            if let Err(TrySendError::Full(_)) = tx.try_send(record) {
                dropped += 1;
            }
        })?;

        running.store(false, Ordering::Release);
        drop(tx);
        if plant_thread.join().is_err() {
            warn!("Plant thread panicked");
        }
        if emitter.join().is_err() {
            warn!("Emitter thread panicked");
        }

        let metrics = handle.metrics().snapshot();
        info!(
            "Run finished: {} ticks, {} inferences, {} commands, {} skipped ({:.2}%), {} overruns, {} dropped emits",
            stats.iterations,
            metrics.inferences,
            metrics.commands_issued,
            metrics.skipped_ticks,
            metrics.skip_rate(),
            metrics.loop_overruns,
            dropped
        );
        Ok(())
    }
}
