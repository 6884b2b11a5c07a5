//! 单元测试共用的配置与假推理引擎

use crate::error::PolicyError;
use crate::policy::PolicyEngine;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use strider_protocol::{
    ControlConfig, InferenceConfig, JointConf, ObsScales, WalkStepConfig, observation_len,
};

/// 两关节配置：init = [0.3, -0.3]，1 kHz，decimation = 1，num_hist = 3
pub fn two_joint_config() -> ControlConfig {
    let names = vec!["left_knee".to_string(), "right_knee".to_string()];
    let table = |a: f64, b: f64| -> BTreeMap<String, f64> {
        BTreeMap::from([(names[0].clone(), a), (names[1].clone(), b)])
    };
    ControlConfig {
        control_rate_hz: 1000.0,
        joint_conf: JointConf {
            init_state: table(0.3, -0.3),
            stiffness: table(40.0, 45.0),
            damping: table(1.0, 1.5),
        },
        ordered_joint_names: names.clone(),
        walk_step_conf: WalkStepConfig {
            action_scale: 0.5,
            decimation: 1,
            cycle_time: 0.7,
            sw_mode: false,
            cmd_threshold: 0.0,
            filter_cutoff_hz: 20.0,
            stand_transition_ms: 10.0,
        },
        obs_scales: ObsScales {
            lin_vel: 2.0,
            ang_vel: 0.1,
            dof_pos: 1.0,
            dof_vel: 0.05,
            quat: 1.0,
        },
        onnx_conf: InferenceConfig {
            policy_file: "test-policy".to_string(),
            actions_size: 2,
            obs_size: observation_len(2),
            num_hist: 3,
            obs_clip: 1.0,
            actions_clip: 1.0,
        },
    }
}

/// 返回固定动作的假引擎，记录调用次数
pub struct ConstantPolicy {
    pub input_len: usize,
    pub action: Vec<f32>,
    pub calls: Arc<AtomicUsize>,
    pub last_input: Arc<parking_lot::Mutex<Vec<f32>>>,
}

impl PolicyEngine for ConstantPolicy {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.action.len()
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, PolicyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_input.lock() = input.to_vec();
        Ok(self.action.clone())
    }
}
