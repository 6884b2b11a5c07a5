//! 强化学习足式运动控制核心
//!
//! 本 crate 实现固定频率控制循环中的全部计算：
//! - 传感器存储（三路独立读写锁，快照后重排为规范关节顺序）
//! - 本体感知估计（欧拉角、投影重力）
//! - 观测组装与历史缓冲
//! - 策略推理（可插拔引擎）
//! - 动作后处理（缩放、裁剪、低通滤波）
//! - 模式状态机（Idle / Zero / Stand / Walk）与指令发布
//!
//! # 线程模型
//!
//! [`RlController`] 由一个控制线程独占并以固定频率调用 `update()`；
//! 任意数量的发布线程通过 [`ControllerHandle`] 写入传感器样本、切换模式、读取指令。
//!
//! ```rust,no_run
//! use strider_control::{ControlConfig, ControlMode, LinearPolicyLoader, RlController};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControlConfig::load_from_file("configs/biped.toml")?;
//! let mut controller = RlController::new(config, true, &LinearPolicyLoader)?;
//! let handle = controller.handle();
//!
//! handle.set_mode(ControlMode::Stand);
//! controller.update();
//! let cmd = handle.sim_joint_cmd();
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod command;
pub mod controller;
mod error;
pub mod filter;
pub mod metrics;
pub mod observation;
pub mod policy;
pub mod proprioception;
pub mod runner;
pub mod sensor;

#[cfg(test)]
mod test_support;

pub use command::{CommandOutput, JointCommandSet};
pub use controller::{ControllerHandle, RlController, TickOutcome};
pub use error::{ControllerError, PolicyError, TickError};
pub use metrics::{ControllerMetrics, MetricsSnapshot};
pub use policy::{LinearPolicy, LinearPolicyLoader, PolicyEngine, PolicyInvoker, PolicyLoader};
pub use runner::{LoopConfig, LoopStats, run_control_loop};
pub use sensor::{SensorSnapshot, SensorStore};

pub use strider_protocol::{
    ControlConfig, ControlMode, Float64MultiArray, Imu, JointCommand, JointState, Quaternion,
    Twist,
};
