//! 策略推理
//!
//! 推理引擎通过 [`PolicyEngine`] trait 抽象：输入为展平后的观测历史（f32），
//! 输出为原始动作（f32）。[`PolicyInvoker`] 在构造期校验引擎维度与配置一致，
//! 并在每次推理时校验输入/输出长度和有限性。
//!
//! 内置的 [`LinearPolicy`] 是 `y = W·x + b` 形式的线性策略，从 JSON 文件加载，
//! 用于仿真联调与测试。

use crate::error::PolicyError;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use strider_protocol::InferenceConfig;
use tracing::{debug, info};

/// 推理引擎
///
/// 引擎由控制线程独占；实现需要 `Send` 以便控制器移动到控制线程。
pub trait PolicyEngine: Send {
    /// 期望的输入长度（`obs_size * num_hist`）
    fn input_len(&self) -> usize;

    /// 输出动作长度
    fn output_len(&self) -> usize;

    /// 执行一次推理
    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, PolicyError>;
}

/// 推理引擎加载器
pub trait PolicyLoader {
    fn load(&self, config: &InferenceConfig) -> Result<Box<dyn PolicyEngine>, PolicyError>;
}

impl<F> PolicyLoader for F
where
    F: Fn(&InferenceConfig) -> Result<Box<dyn PolicyEngine>, PolicyError>,
{
    fn load(&self, config: &InferenceConfig) -> Result<Box<dyn PolicyEngine>, PolicyError> {
        self(config)
    }
}

/// 维度校验过的推理句柄
pub struct PolicyInvoker {
    engine: Box<dyn PolicyEngine>,
    input_len: usize,
    output_len: usize,
}

impl std::fmt::Debug for PolicyInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyInvoker")
            .field("input_len", &self.input_len)
            .field("output_len", &self.output_len)
            .finish_non_exhaustive()
    }
}

impl PolicyInvoker {
    /// 通过加载器创建引擎并校验维度
    pub fn load(loader: &dyn PolicyLoader, config: &InferenceConfig) -> Result<Self, PolicyError> {
        let engine = loader.load(config)?;
        Self::new(engine, config)
    }

    /// 包装已创建的引擎
    ///
    /// 引擎的输入长度必须等于 `obs_size * num_hist`，输出长度必须等于 `actions_size`。
    pub fn new(engine: Box<dyn PolicyEngine>, config: &InferenceConfig) -> Result<Self, PolicyError> {
        let input_len = config.input_len();
        let output_len = config.actions_size;

        if engine.input_len() != input_len {
            return Err(PolicyError::ShapeMismatch {
                what: "input",
                expected: input_len,
                actual: engine.input_len(),
            });
        }
        if engine.output_len() != output_len {
            return Err(PolicyError::ShapeMismatch {
                what: "output",
                expected: output_len,
                actual: engine.output_len(),
            });
        }

        info!(
            "Policy '{}' ready: input {} ({} x {}), output {}",
            config.policy_file, input_len, config.obs_size, config.num_hist, output_len
        );
        Ok(Self {
            engine,
            input_len,
            output_len,
        })
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    /// 执行一次推理
    ///
    /// 返回的动作长度恰好为 `output_len`，且全部为有限值。
    pub fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>, PolicyError> {
        if input.len() != self.input_len {
            return Err(PolicyError::ShapeMismatch {
                what: "input",
                expected: self.input_len,
                actual: input.len(),
            });
        }

        let actions = self.engine.run(input)?;

        if actions.len() != self.output_len {
            return Err(PolicyError::ShapeMismatch {
                what: "output",
                expected: self.output_len,
                actual: actions.len(),
            });
        }
        if let Some(index) = actions.iter().position(|a| !a.is_finite()) {
            return Err(PolicyError::NonFiniteOutput { index });
        }
        Ok(actions)
    }
}

/// 线性策略的 JSON 表示
///
/// ```json
/// { "input_len": 51, "output_len": 2, "weights": [...], "bias": [0.0, 0.0] }
/// ```
///
/// `weights` 按行优先存储，长度为 `output_len * input_len`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPolicyFile {
    pub input_len: usize,
    pub output_len: usize,
    pub weights: Vec<f32>,
    #[serde(default)]
    pub bias: Vec<f32>,
}

/// 线性策略：`y = W·x + b`
#[derive(Debug, Clone)]
pub struct LinearPolicy {
    weights: DMatrix<f32>,
    bias: DVector<f32>,
}

impl LinearPolicy {
    /// 全零策略（输出恒为零动作）
    pub fn zeros(input_len: usize, output_len: usize) -> Self {
        Self {
            weights: DMatrix::zeros(output_len, input_len),
            bias: DVector::zeros(output_len),
        }
    }

    pub fn from_parts(file: LinearPolicyFile) -> Result<Self, PolicyError> {
        let model = "<linear>".to_string();
        if file.weights.len() != file.input_len * file.output_len {
            return Err(PolicyError::Load {
                model,
                reason: format!(
                    "weights has {} entries, expected {} x {}",
                    file.weights.len(),
                    file.output_len,
                    file.input_len
                ),
            });
        }
        let bias = if file.bias.is_empty() {
            DVector::zeros(file.output_len)
        } else if file.bias.len() == file.output_len {
            DVector::from_vec(file.bias)
        } else {
            return Err(PolicyError::Load {
                model,
                reason: format!(
                    "bias has {} entries, expected {}",
                    file.bias.len(),
                    file.output_len
                ),
            });
        };

        Ok(Self {
            weights: DMatrix::from_row_slice(file.output_len, file.input_len, &file.weights),
            bias,
        })
    }

    /// 从 JSON 文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let load_err = |reason: String| PolicyError::Load {
            model: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let file: LinearPolicyFile =
            serde_json::from_str(&content).map_err(|e| load_err(e.to_string()))?;
        let policy = Self::from_parts(file).map_err(|e| match e {
            PolicyError::Load { reason, .. } => load_err(reason),
            other => other,
        })?;

        debug!(
            "Loaded linear policy from {}: {} -> {}",
            path.display(),
            policy.weights.ncols(),
            policy.weights.nrows()
        );
        Ok(policy)
    }
}

impl PolicyEngine for LinearPolicy {
    fn input_len(&self) -> usize {
        self.weights.ncols()
    }

    fn output_len(&self) -> usize {
        self.weights.nrows()
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, PolicyError> {
        if input.len() != self.weights.ncols() {
            return Err(PolicyError::Runtime(format!(
                "linear policy expects {} inputs, got {}",
                self.weights.ncols(),
                input.len()
            )));
        }
        let x = DVector::from_column_slice(input);
        let y = &self.weights * x + &self.bias;
        Ok(y.as_slice().to_vec())
    }
}

/// 从 `policy_file` 加载 [`LinearPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearPolicyLoader;

impl PolicyLoader for LinearPolicyLoader {
    fn load(&self, config: &InferenceConfig) -> Result<Box<dyn PolicyEngine>, PolicyError> {
        Ok(Box::new(LinearPolicy::load_from_file(&config.policy_file)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ConstantPolicy, two_joint_config};
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn constant(input_len: usize, action: Vec<f32>) -> Box<dyn PolicyEngine> {
        Box::new(ConstantPolicy {
            input_len,
            action,
            calls: Arc::new(AtomicUsize::new(0)),
            last_input: Arc::default(),
        })
    }

    #[test]
    fn test_invoker_rejects_wrong_input_shape() {
        let config = two_joint_config();
        let err = PolicyInvoker::new(constant(10, vec![0.0, 0.0]), &config.onnx_conf).unwrap_err();
        assert_eq!(
            err,
            PolicyError::ShapeMismatch {
                what: "input",
                expected: 51,
                actual: 10
            }
        );
    }

    #[test]
    fn test_invoker_rejects_wrong_output_shape() {
        let config = two_joint_config();
        let err = PolicyInvoker::new(constant(51, vec![0.0; 3]), &config.onnx_conf).unwrap_err();
        assert!(matches!(err, PolicyError::ShapeMismatch { what: "output", .. }));
    }

    #[test]
    fn test_invoker_checks_runtime_input_and_output() {
        let config = two_joint_config();
        let mut invoker =
            PolicyInvoker::new(constant(51, vec![0.1, f32::NAN]), &config.onnx_conf).unwrap();
        assert!(matches!(
            invoker.infer(&[0.0; 50]),
            Err(PolicyError::ShapeMismatch { what: "input", .. })
        ));
        assert_eq!(
            invoker.infer(&[0.0; 51]),
            Err(PolicyError::NonFiniteOutput { index: 1 })
        );
    }

    #[test]
    fn test_loader_closure() {
        let config = two_joint_config();
        let loader = |cfg: &InferenceConfig| -> Result<Box<dyn PolicyEngine>, PolicyError> {
            Ok(Box::new(LinearPolicy::zeros(cfg.input_len(), cfg.actions_size)))
        };
        let mut invoker = PolicyInvoker::load(&loader, &config.onnx_conf).unwrap();
        assert_eq!(invoker.infer(&[1.0; 51]).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_linear_policy_math() {
        let mut policy = LinearPolicy::from_parts(LinearPolicyFile {
            input_len: 3,
            output_len: 2,
            weights: vec![1.0, 0.0, 0.0, 0.0, 2.0, 1.0],
            bias: vec![0.5, -0.5],
        })
        .unwrap();
        assert_eq!(policy.run(&[1.0, 2.0, 3.0]).unwrap(), vec![1.5, 6.5]);
        assert!(matches!(policy.run(&[1.0]), Err(PolicyError::Runtime(_))));
    }

    #[test]
    fn test_linear_policy_bad_weights() {
        let err = LinearPolicy::from_parts(LinearPolicyFile {
            input_len: 3,
            output_len: 2,
            weights: vec![1.0; 5],
            bias: vec![],
        })
        .unwrap_err();
        assert!(matches!(err, PolicyError::Load { .. }));
    }

    #[test]
    fn test_linear_policy_loader_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let weights = vec![0.0f32; 2 * 51];
        let json = serde_json::to_string(&LinearPolicyFile {
            input_len: 51,
            output_len: 2,
            weights,
            bias: vec![0.25, -0.25],
        })
        .unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let mut config = two_joint_config();
        config.onnx_conf.policy_file = file.path().display().to_string();
        let mut invoker = PolicyInvoker::load(&LinearPolicyLoader, &config.onnx_conf).unwrap();
        assert_eq!(invoker.infer(&[0.3; 51]).unwrap(), vec![0.25, -0.25]);
    }

    #[test]
    fn test_linear_policy_loader_missing_file() {
        let mut config = two_joint_config();
        config.onnx_conf.policy_file = "/nonexistent/policy.json".to_string();
        let err = PolicyInvoker::load(&LinearPolicyLoader, &config.onnx_conf).unwrap_err();
        match err {
            PolicyError::Load { model, .. } => assert!(model.contains("nonexistent")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
