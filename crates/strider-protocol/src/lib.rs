//! # Strider Protocol
//!
//! 控制核心与外部协作者之间交换的数据定义（无状态、纯数据）：
//!
//! - [`messages`] - 输入传感器样本（速度指令、IMU、关节状态）与输出关节指令
//! - [`mode`] - 控制模式枚举及其无锁原子版本
//! - [`config`] - 控制配置（TOML 反序列化 + 校验）
//!
//! 本 crate 不依赖控制核心，传输层可以只依赖它来构造/解析消息。

pub mod config;
pub mod error;
pub mod messages;
pub mod mode;

pub use config::{
    ControlConfig, InferenceConfig, JointConf, ObsScales, WalkStepConfig, observation_len,
};
pub use error::ConfigError;
pub use messages::{Float64MultiArray, Imu, JointCommand, JointState, Quaternion, Twist};
pub use mode::{AtomicControlMode, ControlMode, ModeStamp};
