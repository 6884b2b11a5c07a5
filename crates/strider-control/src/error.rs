//! 控制层错误类型定义
//!
//! 错误按处理方式分为两类：
//! - [`ControllerError`]：构造期致命错误，控制器拒绝创建
//! - [`TickError`]：单 tick 致命错误，本 tick 被跳过，保持上一帧输出

use strider_protocol::ConfigError;
use thiserror::Error;

/// 策略推理引擎错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// 模型加载失败
    #[error("Failed to load policy '{model}': {reason}")]
    Load { model: String, reason: String },

    /// 输入/输出维度与配置不一致
    #[error("Policy {what} length mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// 推理引擎运行时错误
    #[error("Inference failed: {0}")]
    Runtime(String),

    /// 推理输出包含 NaN/Inf
    #[error("Policy produced non-finite action at index {index}")]
    NonFiniteOutput { index: usize },
}

/// 单 tick 致命错误
///
/// 不会终止控制循环：本 tick 被跳过，上一帧指令保持不变，就绪信号被清除。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickError {
    /// 关节状态样本中缺少某个规范关节
    #[error("Joint '{0}' missing from joint state sample")]
    MissingJoint(String),

    /// 关节状态样本格式错误（数组长度不一致等）
    #[error("Malformed joint state: {0}")]
    MalformedJointState(String),

    /// 姿态四元数无法归一化
    #[error("Malformed orientation quaternion (x={x}, y={y}, z={z}, w={w})")]
    MalformedOrientation { x: f64, y: f64, z: f64, w: f64 },

    /// 传感器样本包含 NaN/Inf
    #[error("Non-finite value in {0} sample")]
    NonFiniteSample(&'static str),

    /// 策略推理失败
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),
}

/// 构造期致命错误
#[derive(Error, Debug)]
pub enum ControllerError {
    /// 配置非法
    #[error("Invalid control config: {0}")]
    Config(#[from] ConfigError),

    /// 策略加载失败或维度与配置不符
    #[error("Policy initialization failed: {0}")]
    Policy(#[from] PolicyError),

    /// 控制循环参数非法
    #[error("Invalid loop config: {0}")]
    LoopConfig(String),
}
