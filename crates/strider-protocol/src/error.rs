//! 配置层错误类型定义

use thiserror::Error;

/// 配置加载与校验错误
///
/// 校验错误属于"构造期致命错误"：控制器拒绝以非法配置启动。
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML 解析失败
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// 关节列表为空
    #[error("ordered_joint_names must not be empty")]
    EmptyJointList,

    /// 关节名重复
    #[error("Duplicate joint name in ordered_joint_names: {0}")]
    DuplicateJoint(String),

    /// 某个关节缺少参数（init_state / stiffness / damping）
    #[error("Joint '{joint}' has no entry in joint_conf.{table}")]
    MissingJointParam { table: &'static str, joint: String },

    /// 向量维度不匹配
    #[error("Dimension mismatch for {field}: expected {expected}, got {actual}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// 数值非法（非有限、非正等）
    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
}
