//! 观测组装
//!
//! # 单帧观测布局
//!
//! ```text
//! [ sin φ, cos φ,                         步态相位 (2)
//!   vx·lin_vel, vy·lin_vel, wz·ang_vel,   速度指令 (3)
//!   ω·ang_vel,                            基座角速度 (3)
//!   (q − q₀)·dof_pos,                     关节位置 (N)
//!   q̇·dof_vel,                            关节速度 (N)
//!   a_prev,                               上一帧原始动作 (N)
//!   euler_xyz·quat ]                      基座姿态 (3)
//! ```
//!
//! 整帧逐元素裁剪到 `[-obs_clip, obs_clip]` 后写入历史缓冲区。
//!
//! # 历史缓冲区
//!
//! 固定容量 `num_hist` 的环形缓冲区，按时间顺序（旧 → 新）展平为策略输入。
//! 首次写入时用同一帧填满全部槽位，避免冷启动伪影。

use crate::action::clip;
use crate::proprioception::Proprioception;
use nalgebra::DVector;
use std::f64::consts::PI;
use strider_protocol::{ControlConfig, ObsScales, Twist};

/// 固定长度的观测历史环形缓冲区
///
/// 不变量：`data.len() == obs_size * capacity`，构造后不再变化。
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    data: Vec<f32>,
    obs_size: usize,
    capacity: usize,
    /// 最旧一帧所在的槽位
    head: usize,
    seeded: bool,
}

impl HistoryBuffer {
    pub fn new(obs_size: usize, capacity: usize) -> Self {
        Self {
            data: vec![0.0; obs_size * capacity],
            obs_size,
            capacity,
            head: 0,
            seeded: false,
        }
    }

    /// 展平后的总长度
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// 写入最新一帧，覆盖最旧一帧
    ///
    /// 未播种时用该帧填满全部槽位。
    pub fn push(&mut self, obs: &[f32]) {
        debug_assert_eq!(obs.len(), self.obs_size);
        if !self.seeded {
            for slot in self.data.chunks_exact_mut(self.obs_size) {
                slot.copy_from_slice(obs);
            }
            self.head = 0;
            self.seeded = true;
            return;
        }

        let start = self.head * self.obs_size;
        self.data[start..start + self.obs_size].copy_from_slice(obs);
        self.head = (self.head + 1) % self.capacity;
    }

    /// 按时间顺序（旧 → 新）展平到 `out`
    pub fn flatten_into(&self, out: &mut Vec<f32>) {
        out.clear();
        out.reserve(self.data.len());
        for k in 0..self.capacity {
            let slot = (self.head + k) % self.capacity;
            let start = slot * self.obs_size;
            out.extend_from_slice(&self.data[start..start + self.obs_size]);
        }
    }

    /// 假定再写入 `next` 后的展平结果，缓冲区本身不变
    pub fn flatten_with_into(&self, next: &[f32], out: &mut Vec<f32>) {
        debug_assert_eq!(next.len(), self.obs_size);
        out.clear();
        out.reserve(self.data.len());
        if !self.seeded {
            for _ in 0..self.capacity {
                out.extend_from_slice(next);
            }
            return;
        }
        for k in 1..self.capacity {
            let slot = (self.head + k) % self.capacity;
            let start = slot * self.obs_size;
            out.extend_from_slice(&self.data[start..start + self.obs_size]);
        }
        out.extend_from_slice(next);
    }

    pub fn flatten(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.data.len());
        self.flatten_into(&mut out);
        out
    }

    /// 清除播种标志，下一次写入重新填满缓冲区
    pub fn reset(&mut self) {
        self.seeded = false;
    }
}

/// 观测组装器
#[derive(Debug, Clone)]
pub struct ObservationAssembler {
    scales: ObsScales,
    init_angles: DVector<f64>,
    obs_size: usize,
    obs_clip: f64,
    /// 每个推理步的相位增量
    phase_step: f64,
    sw_mode: bool,
    cmd_threshold: f64,
    /// 步态相位，保持在 [0, 2π)
    phase: f64,
    history: HistoryBuffer,
    input: Vec<f32>,
}

impl ObservationAssembler {
    pub fn new(config: &ControlConfig) -> Self {
        let onnx = &config.onnx_conf;
        Self {
            scales: config.obs_scales.clone(),
            init_angles: DVector::from_vec(config.init_angles()),
            obs_size: onnx.obs_size,
            obs_clip: onnx.obs_clip,
            phase_step: 2.0 * PI * config.policy_dt() / config.walk_step_conf.cycle_time,
            sw_mode: config.walk_step_conf.sw_mode,
            cmd_threshold: config.walk_step_conf.cmd_threshold,
            phase: 0.0,
            history: HistoryBuffer::new(onnx.obs_size, onnx.num_hist),
            input: Vec::with_capacity(onnx.input_len()),
        }
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// 速度指令死区：范数低于阈值时视为零指令
    pub fn deadband(&self, command: &Twist) -> Option<[f64; 3]> {
        let [vx, vy, wz] = command.planar_command();
        if (vx * vx + vy * vy + wz * wz).sqrt() < self.cmd_threshold {
            None
        } else {
            Some([vx, vy, wz])
        }
    }

    /// 本帧使用的步态相位
    ///
    /// `sw_mode` 下死区内的指令使相位回到零（原地站立）。
    fn phase_for(&self, command: &Twist) -> f64 {
        if self.sw_mode && self.deadband(command).is_none() {
            0.0
        } else {
            self.phase
        }
    }

    /// 构造当前帧观测（已缩放、已裁剪）
    ///
    /// 不修改任何状态：历史与步态时钟只在 [`commit`](Self::commit) 时前进。
    pub fn assemble(&self, propri: &Proprioception, command: &Twist) -> Vec<f32> {
        let [vx, vy, wz] = self.deadband(command).unwrap_or([0.0; 3]);
        let phase = self.phase_for(command);

        let s = &self.scales;
        let mut obs = Vec::with_capacity(self.obs_size);
        obs.push(phase.sin());
        obs.push(phase.cos());
        obs.extend([vx * s.lin_vel, vy * s.lin_vel, wz * s.ang_vel]);
        obs.extend(propri.base_ang_vel.iter().map(|w| w * s.ang_vel));
        obs.extend(
            propri
                .joint_pos
                .iter()
                .zip(self.init_angles.iter())
                .map(|(q, q0)| (q - q0) * s.dof_pos),
        );
        obs.extend(propri.joint_vel.iter().map(|dq| dq * s.dof_vel));
        obs.extend(propri.last_actions.iter().copied());
        obs.extend(propri.base_euler_xyz.iter().map(|e| e * s.quat));

        debug_assert_eq!(obs.len(), self.obs_size);
        obs.into_iter().map(|v| clip(v, self.obs_clip) as f32).collect()
    }

    /// 以 `obs` 作为最新一帧的策略输入（尚未写入历史）
    pub fn candidate_input(&mut self, obs: &[f32]) -> &[f32] {
        self.history.flatten_with_into(obs, &mut self.input);
        &self.input
    }

    /// 推理成功后提交：写入历史并推进步态时钟
    pub fn commit(&mut self, obs: &[f32], command: &Twist) {
        self.history.push(obs);
        self.phase = (self.phase_for(command) + self.phase_step).rem_euclid(2.0 * PI);
    }

    /// 重新播种：清除首帧标志并将步态相位归零
    pub fn reset(&mut self) {
        self.history.reset();
        self.phase = 0.0;
    }
}
