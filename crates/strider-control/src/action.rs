//! 动作后处理
//!
//! 原始动作 → 缩放 → 裁剪 → 叠加初始角度 → 逐关节低通滤波 → 关节目标。
//! 另外提供站立/回零过渡使用的进度计数和线性混合。

use crate::filter::LowPassFilter;
use nalgebra::DVector;
use strider_protocol::ControlConfig;

/// 对称裁剪到 `[-limit, limit]`
///
/// 幂等：对已裁剪的值再次裁剪结果不变。
#[inline]
pub fn clip(value: f64, limit: f64) -> f64 {
    value.clamp(-limit, limit)
}

/// 动作后处理器
#[derive(Debug, Clone)]
pub struct ActionPostProcessor {
    action_scale: f64,
    actions_clip: f64,
    init_angles: DVector<f64>,
    filters: Vec<LowPassFilter>,
    /// 上一帧滤波输出
    last_output: DVector<f64>,
}

impl ActionPostProcessor {
    pub fn new(config: &ControlConfig) -> Self {
        let sample_time = 1.0 / config.control_rate_hz;
        let cutoff = config.walk_step_conf.filter_cutoff_hz;
        Self {
            action_scale: config.walk_step_conf.action_scale,
            actions_clip: config.onnx_conf.actions_clip,
            init_angles: DVector::from_vec(config.init_angles()),
            filters: (0..config.num_joints())
                .map(|_| LowPassFilter::new(cutoff, sample_time))
                .collect(),
            last_output: DVector::from_vec(config.init_angles()),
        }
    }

    /// 关节目标位置：`init + clip(action * scale)`
    pub fn targets(&self, actions: &[f32]) -> DVector<f64> {
        DVector::from_iterator(
            self.init_angles.len(),
            self.init_angles.iter().zip(actions).map(|(init, &action)| {
                init + clip(action as f64 * self.action_scale, self.actions_clip)
            }),
        )
    }

    /// 逐关节滤波，输出限制在 `init ± actions_clip` 内
    ///
    /// 二阶滤波器的阶跃响应有少量超调，最终指令不得越过裁剪包络。
    /// 若上一帧输出位于包络之外（从包络外的姿态重新起步），
    /// 本帧的允许区间放宽到包含上一帧输出，输出只会向包络收拢而不会跳变。
    pub fn filter(&mut self, targets: &DVector<f64>) -> DVector<f64> {
        let clip_limit = self.actions_clip;
        for (i, (filter, &target)) in self.filters.iter_mut().zip(targets.iter()).enumerate() {
            let init = self.init_angles[i];
            let last = self.last_output[i];
            let lo = (init - clip_limit).min(last);
            let hi = (init + clip_limit).max(last);
            self.last_output[i] = filter.input(target).clamp(lo, hi);
        }
        self.last_output.clone()
    }

    /// 将所有滤波器置为给定姿态的稳态
    pub fn reset_filters(&mut self, positions: &DVector<f64>) {
        for (filter, &p) in self.filters.iter_mut().zip(positions.iter()) {
            filter.reset(p);
        }
        self.last_output.copy_from(positions);
    }
}

/// 过渡进度（百分比，[0, 100]）
///
/// 按已经过的 tick 数计算，到达过渡时长时恰好为 100；`reset()` 归零。
#[derive(Debug, Clone)]
pub struct TransitionProgress {
    elapsed_ticks: u64,
    total_ticks: f64,
}

impl TransitionProgress {
    /// 按过渡时长与控制频率计算总 tick 数
    pub fn new(duration_ms: f64, control_rate_hz: f64) -> Self {
        Self {
            elapsed_ticks: 0,
            total_ticks: (duration_ms * control_rate_hz / 1000.0).round().max(1.0),
        }
    }

    pub fn reset(&mut self) {
        self.elapsed_ticks = 0;
    }

    #[inline]
    pub fn percent(&self) -> f64 {
        (self.elapsed_ticks as f64 / self.total_ticks * 100.0).min(100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed_ticks as f64 >= self.total_ticks
    }

    /// 前进一个 tick，返回新进度（单调不减，封顶 100）
    pub fn advance(&mut self) -> f64 {
        if !self.is_complete() {
            self.elapsed_ticks += 1;
        }
        self.percent()
    }
}

/// 线性混合：`held + (target - held) * percent / 100`
pub fn blend(held: &DVector<f64>, target: &DVector<f64>, percent: f64) -> DVector<f64> {
    let w = (percent / 100.0).clamp(0.0, 1.0);
    held + (target - held) * w
}
