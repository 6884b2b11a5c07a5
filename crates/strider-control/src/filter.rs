//! 二阶 Butterworth 数字低通滤波器
//!
//! 连续域原型：
//!
//! ```text
//! H(s) = ωc² / (s² + √2·ωc·s + ωc²)
//! ```
//!
//! 经双线性变换（无预畸变）离散化，令 `K = ωc·Ts/2`：
//!
//! ```text
//! y[n] = b0·x[n] + b1·x[n-1] + b2·x[n-2] - a1·y[n-1] - a2·y[n-2]
//!
//! b0 = b2 = K² / D,  b1 = 2·K² / D
//! a1 = 2·(K² - 1) / D
//! a2 = (1 - √2·K + K²) / D
//! D  = 1 + √2·K + K²
//! ```
//!
//! 直流增益为 1：稳态输入会被原样输出。

use std::f64::consts::{PI, SQRT_2};

/// 标量低通滤波器（有状态）
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    /// [x[n-1], x[n-2]]
    input_prev: [f64; 2],
    /// [y[n-1], y[n-2]]
    output_prev: [f64; 2],
}

impl LowPassFilter {
    /// 创建滤波器
    ///
    /// # 参数
    ///
    /// - `cutoff_hz`: 截止频率（Hz）
    /// - `sample_time_s`: 采样周期（秒）
    pub fn new(cutoff_hz: f64, sample_time_s: f64) -> Self {
        let wc = 2.0 * PI * cutoff_hz;
        let k = wc * sample_time_s / 2.0;
        let k2 = k * k;
        let d = 1.0 + SQRT_2 * k + k2;

        Self {
            b0: k2 / d,
            b1: 2.0 * k2 / d,
            b2: k2 / d,
            a1: 2.0 * (k2 - 1.0) / d,
            a2: (1.0 - SQRT_2 * k + k2) / d,
            input_prev: [0.0; 2],
            output_prev: [0.0; 2],
        }
    }

    /// 输入一个采样，返回新的输出
    pub fn input(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.b1 * self.input_prev[0] + self.b2 * self.input_prev[1]
            - self.a1 * self.output_prev[0]
            - self.a2 * self.output_prev[1];

        self.input_prev = [x, self.input_prev[0]];
        self.output_prev = [y, self.output_prev[0]];
        y
    }

    /// 最近一次输出
    #[inline]
    pub fn output(&self) -> f64 {
        self.output_prev[0]
    }

    /// 将内部状态置为稳态 `value`
    ///
    /// 之后持续输入 `value` 时输出保持 `value` 不变，无启动瞬态。
    pub fn reset(&mut self, value: f64) {
        self.input_prev = [value; 2];
        self.output_prev = [value; 2];
    }
}
