//! 合成传感器回环
//!
//! 一阶惯性关节模型：每步按 `dt / tau` 的比例跟随当前发布的关节目标，
//! 并以固定频率把关节状态和 IMU 样本写回控制器，代替真实的传输层。

use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use strider_control::ControllerHandle;
use strider_protocol::{Imu, JointState};
use tracing::{debug, info};

/// 一阶惯性关节模型
#[derive(Debug, Clone)]
pub struct KinematicPlant {
    names: Vec<String>,
    position: Vec<f64>,
    velocity: Vec<f64>,
    /// 每步跟随比例 `dt / tau`，限制在 (0, 1]
    gain: f64,
    dt: f64,
}

impl KinematicPlant {
    pub fn new(names: Vec<String>, initial: Vec<f64>, time_constant_s: f64, dt: f64) -> Self {
        let n = names.len();
        Self {
            names,
            position: initial,
            velocity: vec![0.0; n],
            gain: (dt / time_constant_s.max(dt)).min(1.0),
            dt,
        }
    }

    pub fn position(&self) -> &[f64] {
        &self.position
    }

    /// 向目标前进一步
    pub fn step(&mut self, targets: &[f64]) {
        for ((q, dq), &target) in self
            .position
            .iter_mut()
            .zip(self.velocity.iter_mut())
            .zip(targets)
        {
            let delta = (target - *q) * self.gain;
            *q += delta;
            *dq = delta / self.dt;
        }
    }

    /// 当前关节状态样本（逆序发布，由控制器重排为规范顺序）
    pub fn joint_state(&self) -> JointState {
        JointState::from_triples(
            self.names
                .iter()
                .zip(&self.position)
                .zip(&self.velocity)
                .rev()
                .map(|((name, &q), &dq)| (name.clone(), q, dq)),
        )
    }
}

/// 启动回环线程，直到 `running` 被清除
pub fn spawn(
    handle: ControllerHandle,
    mut plant: KinematicPlant,
    rate_hz: f64,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let period = Duration::from_secs_f64(1.0 / rate_hz);
    thread::Builder::new()
        .name("strider-plant".into())
        .spawn(move || {
            info!("Synthetic plant running at {} Hz", rate_hz);
            let sleeper = SpinSleeper::default();
            let mut steps = 0u64;

            // 首帧样本先于控制器第一次读取写入
            handle.set_joint_state(plant.joint_state());
            handle.set_imu(Imu::default());

            while running.load(Ordering::Acquire) {
                let command = handle.joint_command();
                plant.step(&command.position);
                handle.set_joint_state(plant.joint_state());
                handle.set_imu(Imu::default());
                steps += 1;
                sleeper.sleep(period);
            }
            debug!("Synthetic plant stopped after {} steps", steps);
        })
}
