//! # 控制配置
//!
//! 控制器启动前加载一次、此后只读的配置。
//!
//! ## 文件格式（TOML）
//!
//! ```toml
//! control_rate_hz = 1000.0
//! ordered_joint_names = ["left_knee", "right_knee"]
//!
//! [joint_conf.init_state]
//! left_knee = 0.3
//! right_knee = 0.3
//!
//! [joint_conf.stiffness]
//! left_knee = 40.0
//! right_knee = 40.0
//!
//! [joint_conf.damping]
//! left_knee = 1.0
//! right_knee = 1.0
//!
//! [walk_step_conf]
//! action_scale = 0.5
//! decimation = 10
//! cycle_time = 0.7
//! sw_mode = true
//! cmd_threshold = 0.05
//!
//! [obs_scales]
//! lin_vel = 2.0
//! ang_vel = 0.25
//! dof_pos = 1.0
//! dof_vel = 0.05
//! quat = 1.0
//!
//! [onnx_conf]
//! policy_file = "policy.json"
//! actions_size = 2
//! obs_size = 17
//! num_hist = 3
//! obs_clip = 18.0
//! actions_clip = 18.0
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 单帧观测向量长度
///
/// 布局：相位 (2) + 速度指令 (3) + 角速度 (3) + 关节位置 (N) + 关节速度 (N)
/// + 上一帧动作 (N) + 欧拉角 (3)。
#[inline]
pub const fn observation_len(num_joints: usize) -> usize {
    2 + 3 + 3 + 3 * num_joints + 3
}

fn default_control_rate_hz() -> f64 {
    1000.0
}

fn default_filter_cutoff_hz() -> f64 {
    20.0
}

fn default_stand_transition_ms() -> f64 {
    2000.0
}

/// 控制配置（根结构）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// 控制循环频率（Hz），即 `update()` 的调用频率
    #[serde(default = "default_control_rate_hz")]
    pub control_rate_hz: f64,

    /// 规范关节顺序（所有按关节索引的向量都遵循此顺序）
    pub ordered_joint_names: Vec<String>,

    /// 按关节名索引的初始角度 / 刚度 / 阻尼
    pub joint_conf: JointConf,

    /// 行走参数
    pub walk_step_conf: WalkStepConfig,

    /// 观测缩放系数
    pub obs_scales: ObsScales,

    /// 推理参数
    pub onnx_conf: InferenceConfig,
}

/// 按关节名索引的关节参数表
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointConf {
    /// 初始（站立）角度（rad）
    pub init_state: BTreeMap<String, f64>,
    /// 刚度 Kp
    pub stiffness: BTreeMap<String, f64>,
    /// 阻尼 Kd
    pub damping: BTreeMap<String, f64>,
}

/// 行走参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkStepConfig {
    /// 动作缩放
    pub action_scale: f64,
    /// 每次推理对应的控制 tick 数
    pub decimation: u32,
    /// 步态周期（秒），用于相位时钟
    pub cycle_time: f64,
    /// 原地站立模式：指令落入死区时将步态相位保持为零
    pub sw_mode: bool,
    /// 速度指令死区（对 (vx, vy, wz) 的欧氏范数做绝对比较）
    pub cmd_threshold: f64,
    /// 动作低通滤波截止频率（Hz）
    #[serde(default = "default_filter_cutoff_hz")]
    pub filter_cutoff_hz: f64,
    /// 站立/回零过渡时长（ms）
    #[serde(default = "default_stand_transition_ms")]
    pub stand_transition_ms: f64,
}

/// 观测缩放系数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsScales {
    pub lin_vel: f64,
    pub ang_vel: f64,
    pub dof_pos: f64,
    pub dof_vel: f64,
    /// 姿态项（欧拉角）缩放
    pub quat: f64,
}

/// 推理参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// 策略模型标识（文件路径）
    pub policy_file: String,
    /// 动作向量长度（必须等于关节数）
    pub actions_size: usize,
    /// 单帧观测长度
    pub obs_size: usize,
    /// 历史帧数
    pub num_hist: usize,
    /// 观测裁剪范围 [-obs_clip, obs_clip]
    pub obs_clip: f64,
    /// 动作裁剪范围 [-actions_clip, actions_clip]
    pub actions_clip: f64,
}

impl InferenceConfig {
    /// 策略输入长度（`obs_size * num_hist`）
    #[inline]
    pub fn input_len(&self) -> usize {
        self.obs_size * self.num_hist
    }
}

impl ControlConfig {
    /// 从 TOML 文件加载配置（不做校验，见 [`ControlConfig::load_validated`]）
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 文件加载并校验配置
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// 关节个数
    #[inline]
    pub fn num_joints(&self) -> usize {
        self.ordered_joint_names.len()
    }

    /// 控制周期
    pub fn control_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.control_rate_hz)
    }

    /// 每次推理之间的时间（秒）
    pub fn policy_dt(&self) -> f64 {
        self.walk_step_conf.decimation as f64 / self.control_rate_hz
    }

    /// 规范顺序的初始角度
    pub fn init_angles(&self) -> Vec<f64> {
        self.ordered_params(&self.joint_conf.init_state)
    }

    /// 规范顺序的刚度
    pub fn stiffness(&self) -> Vec<f64> {
        self.ordered_params(&self.joint_conf.stiffness)
    }

    /// 规范顺序的阻尼
    pub fn damping(&self) -> Vec<f64> {
        self.ordered_params(&self.joint_conf.damping)
    }

    // 缺失项按 0 处理；validate() 保证不会缺失
    fn ordered_params(&self, table: &BTreeMap<String, f64>) -> Vec<f64> {
        self.ordered_joint_names
            .iter()
            .map(|name| table.get(name).copied().unwrap_or(0.0))
            .collect()
    }

    /// 校验配置，返回第一个违规项
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ordered_joint_names.is_empty() {
            return Err(ConfigError::EmptyJointList);
        }

        let mut seen = HashSet::with_capacity(self.ordered_joint_names.len());
        for name in &self.ordered_joint_names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateJoint(name.clone()));
            }
        }

        let tables = [
            ("init_state", &self.joint_conf.init_state),
            ("stiffness", &self.joint_conf.stiffness),
            ("damping", &self.joint_conf.damping),
        ];
        for (table_name, table) in tables {
            for name in &self.ordered_joint_names {
                match table.get(name) {
                    Some(value) if value.is_finite() => {},
                    Some(value) => {
                        return Err(ConfigError::InvalidValue {
                            field: table_name,
                            value: *value,
                            reason: "must be finite",
                        });
                    },
                    None => {
                        return Err(ConfigError::MissingJointParam {
                            table: table_name,
                            joint: name.clone(),
                        });
                    },
                }
            }
        }

        positive("control_rate_hz", self.control_rate_hz)?;

        let walk = &self.walk_step_conf;
        finite("walk_step_conf.action_scale", walk.action_scale)?;
        if walk.decimation == 0 {
            return Err(ConfigError::InvalidValue {
                field: "walk_step_conf.decimation",
                value: 0.0,
                reason: "must be >= 1",
            });
        }
        positive("walk_step_conf.cycle_time", walk.cycle_time)?;
        non_negative("walk_step_conf.cmd_threshold", walk.cmd_threshold)?;
        positive("walk_step_conf.filter_cutoff_hz", walk.filter_cutoff_hz)?;
        positive("walk_step_conf.stand_transition_ms", walk.stand_transition_ms)?;

        let scales = &self.obs_scales;
        finite("obs_scales.lin_vel", scales.lin_vel)?;
        finite("obs_scales.ang_vel", scales.ang_vel)?;
        finite("obs_scales.dof_pos", scales.dof_pos)?;
        finite("obs_scales.dof_vel", scales.dof_vel)?;
        finite("obs_scales.quat", scales.quat)?;

        let onnx = &self.onnx_conf;
        let joints = self.num_joints();
        if onnx.actions_size != joints {
            return Err(ConfigError::DimensionMismatch {
                field: "onnx_conf.actions_size",
                expected: joints,
                actual: onnx.actions_size,
            });
        }
        let expected_obs = observation_len(joints);
        if onnx.obs_size != expected_obs {
            return Err(ConfigError::DimensionMismatch {
                field: "onnx_conf.obs_size",
                expected: expected_obs,
                actual: onnx.obs_size,
            });
        }
        if onnx.num_hist == 0 {
            return Err(ConfigError::InvalidValue {
                field: "onnx_conf.num_hist",
                value: 0.0,
                reason: "must be >= 1",
            });
        }
        positive("onnx_conf.obs_clip", onnx.obs_clip)?;
        positive("onnx_conf.actions_clip", onnx.actions_clip)?;

        Ok(())
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "must be finite",
        })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "must be > 0",
        })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "must be >= 0",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_JOINT_TOML: &str = r#"
ordered_joint_names = ["left_knee", "right_knee"]

[joint_conf.init_state]
left_knee = 0.3
right_knee = -0.3

[joint_conf.stiffness]
left_knee = 40.0
right_knee = 45.0

[joint_conf.damping]
left_knee = 1.0
right_knee = 1.5

[walk_step_conf]
action_scale = 0.5
decimation = 10
cycle_time = 0.7
sw_mode = true
cmd_threshold = 0.05

[obs_scales]
lin_vel = 2.0
ang_vel = 0.25
dof_pos = 1.0
dof_vel = 0.05
quat = 1.0

[onnx_conf]
policy_file = "policy.json"
actions_size = 2
obs_size = 17
num_hist = 3
obs_clip = 18.0
actions_clip = 18.0
"#;

    fn two_joint() -> ControlConfig {
        ControlConfig::from_toml_str(TWO_JOINT_TOML).unwrap()
    }

    #[test]
    fn test_parse_applies_defaults() {
        let config = two_joint();
        assert_eq!(config.control_rate_hz, 1000.0);
        assert_eq!(config.walk_step_conf.filter_cutoff_hz, 20.0);
        assert_eq!(config.walk_step_conf.stand_transition_ms, 2000.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ordered_params_follow_canonical_order() {
        let config = two_joint();
        assert_eq!(config.init_angles(), vec![0.3, -0.3]);
        assert_eq!(config.stiffness(), vec![40.0, 45.0]);
        assert_eq!(config.damping(), vec![1.0, 1.5]);
    }

    #[test]
    fn test_derived_timing() {
        let config = two_joint();
        assert_eq!(config.control_period(), Duration::from_millis(1));
        assert!((config.policy_dt() - 0.01).abs() < 1e-12);
        assert_eq!(config.onnx_conf.input_len(), 51);
    }

    #[test]
    fn test_observation_len() {
        assert_eq!(observation_len(2), 17);
        assert_eq!(observation_len(12), 47);
    }

    #[test]
    fn test_validate_missing_joint_param() {
        let mut config = two_joint();
        config.joint_conf.damping.remove("right_knee");
        match config.validate() {
            Err(ConfigError::MissingJointParam { table, joint }) => {
                assert_eq!(table, "damping");
                assert_eq!(joint, "right_knee");
            },
            other => panic!("Expected MissingJointParam, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_duplicate_joint() {
        let mut config = two_joint();
        config.ordered_joint_names.push("left_knee".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateJoint(name)) if name == "left_knee"
        ));
    }

    #[test]
    fn test_validate_dimension_mismatch() {
        let mut config = two_joint();
        config.onnx_conf.actions_size = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DimensionMismatch {
                field: "onnx_conf.actions_size",
                expected: 2,
                actual: 3
            })
        ));

        let mut config = two_joint();
        config.onnx_conf.obs_size = 47;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DimensionMismatch {
                field: "onnx_conf.obs_size",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = two_joint();
        config.walk_step_conf.decimation = 0;
        assert!(config.validate().is_err());

        let mut config = two_joint();
        config.onnx_conf.num_hist = 0;
        assert!(config.validate().is_err());

        let mut config = two_joint();
        config.onnx_conf.obs_clip = 0.0;
        assert!(config.validate().is_err());

        let mut config = two_joint();
        config.control_rate_hz = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = two_joint();
        config.ordered_joint_names.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyJointList)));
    }

    #[test]
    fn test_load_validated_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_JOINT_TOML.as_bytes()).unwrap();
        let config = ControlConfig::load_validated(file.path()).unwrap();
        assert_eq!(config.num_joints(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ControlConfig::load_from_file("/nonexistent/strider.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_parse_error() {
        let err = ControlConfig::from_toml_str("ordered_joint_names = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
