//! 消息结构体定义
//!
//! 输入：速度指令（[`Twist`]）、惯性测量（[`Imu`]）、关节状态（[`JointState`]），
//! 由传输层以各自频率推送，"最后写入者胜出"。
//!
//! 输出：同一份关节指令的两种表示：
//! - [`Float64MultiArray`]：仿真执行器使用的扁平数组
//! - [`JointCommand`]：实机执行器使用的按关节结构化指令

use serde::{Deserialize, Serialize};

/// 速度指令
///
/// 只使用 `linear.x`、`linear.y`（m/s）和 `angular.z`（rad/s）。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    /// 线速度 [x, y, z]（m/s）
    pub linear: [f64; 3],
    /// 角速度 [x, y, z]（rad/s）
    pub angular: [f64; 3],
}

impl Twist {
    /// 平面运动指令 (vx, vy, wz)
    pub fn planar(vx: f64, vy: f64, wz: f64) -> Self {
        Self {
            linear: [vx, vy, 0.0],
            angular: [0.0, 0.0, wz],
        }
    }

    /// 返回 [vx, vy, wz]
    #[inline]
    pub fn planar_command(&self) -> [f64; 3] {
        [self.linear[0], self.linear[1], self.angular[2]]
    }
}

/// 四元数（x, y, z, w 顺序，与 ROS 消息一致）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    /// 单位四元数（无旋转）
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// IMU 样本
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Imu {
    /// 基座姿态（世界系 → 机体系）
    pub orientation: Quaternion,
    /// 机体系角速度（rad/s）
    pub angular_velocity: [f64; 3],
    /// 机体系线加速度（m/s²），控制核心不使用
    pub linear_acceleration: [f64; 3],
}

/// 关节状态样本
///
/// `name` 的顺序任意，控制核心在快照时按配置中的规范顺序重新索引。
/// `velocity` 为空时视为全零；非空时长度必须与 `name` 一致。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointState {
    pub name: Vec<String>,
    /// 关节位置（rad）
    pub position: Vec<f64>,
    /// 关节速度（rad/s）
    pub velocity: Vec<f64>,
    /// 关节力矩（N·m），控制核心不使用
    pub effort: Vec<f64>,
}

impl JointState {
    /// 由 (名称, 位置, 速度) 三元组构造
    pub fn from_triples<S: Into<String>>(items: impl IntoIterator<Item = (S, f64, f64)>) -> Self {
        let mut state = JointState::default();
        for (name, pos, vel) in items {
            state.name.push(name.into());
            state.position.push(pos);
            state.velocity.push(vel);
        }
        state
    }
}

/// 仿真执行器指令（扁平数组）
///
/// 布局：每个关节连续 [`Float64MultiArray::STRIDE`] 个值，
/// `[position, velocity, effort, stiffness, damping]`，关节按规范顺序排列。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Float64MultiArray {
    pub data: Vec<f64>,
}

impl Float64MultiArray {
    /// 每个关节占用的元素个数
    pub const STRIDE: usize = 5;

    /// 第 `joint` 个关节的目标位置
    pub fn position(&self, joint: usize) -> Option<f64> {
        self.data.get(joint * Self::STRIDE).copied()
    }

    /// 关节个数
    pub fn num_joints(&self) -> usize {
        self.data.len() / Self::STRIDE
    }
}

/// 实机执行器指令（按关节结构化）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointCommand {
    pub name: Vec<String>,
    /// 目标位置（rad）
    pub position: Vec<f64>,
    /// 目标速度（rad/s）
    pub velocity: Vec<f64>,
    /// 前馈力矩（N·m）
    pub effort: Vec<f64>,
    /// 刚度 Kp（N·m/rad）
    pub stiffness: Vec<f64>,
    /// 阻尼 Kd（N·m·s/rad）
    pub damping: Vec<f64>,
}
