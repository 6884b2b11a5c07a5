//! 集成测试共用工具
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use strider_control::{ControllerHandle, PolicyEngine, PolicyError, RlController};
use strider_protocol::{
    ControlConfig, Imu, InferenceConfig, JointConf, JointState, ObsScales, WalkStepConfig,
    observation_len,
};

pub const JOINTS: [&str; 3] = ["hip", "knee", "ankle"];
pub const INIT: [f64; 3] = [0.1, 0.6, -0.4];

/// 三关节配置：1 kHz，obs_clip = 1.0，ang_vel 缩放 0.1
pub fn config(decimation: u32, num_hist: usize) -> ControlConfig {
    let table = |values: [f64; 3]| -> BTreeMap<String, f64> {
        JOINTS
            .iter()
            .zip(values)
            .map(|(name, v)| (name.to_string(), v))
            .collect()
    };
    ControlConfig {
        control_rate_hz: 1000.0,
        ordered_joint_names: JOINTS.iter().map(|s| s.to_string()).collect(),
        joint_conf: JointConf {
            init_state: table(INIT),
            stiffness: table([50.0, 60.0, 30.0]),
            damping: table([1.0, 1.2, 0.8]),
        },
        walk_step_conf: WalkStepConfig {
            action_scale: 0.25,
            decimation,
            cycle_time: 0.64,
            sw_mode: false,
            cmd_threshold: 0.0,
            filter_cutoff_hz: 20.0,
            stand_transition_ms: 100.0,
        },
        obs_scales: ObsScales {
            lin_vel: 2.0,
            ang_vel: 0.1,
            dof_pos: 1.0,
            dof_vel: 0.05,
            quat: 1.0,
        },
        onnx_conf: InferenceConfig {
            policy_file: "recording".to_string(),
            actions_size: JOINTS.len(),
            obs_size: observation_len(JOINTS.len()),
            num_hist,
            obs_clip: 1.0,
            actions_clip: 2.0,
        },
    }
}

/// 记录每次输入的假引擎
#[derive(Clone)]
pub struct RecordingPolicy {
    pub input_len: usize,
    pub output: Vec<f32>,
    pub calls: Arc<AtomicUsize>,
    pub inputs: Arc<Mutex<Vec<Vec<f32>>>>,
    /// 置位后下一次推理返回运行时错误
    pub fail_next: Arc<AtomicBool>,
}

impl RecordingPolicy {
    pub fn new(config: &ControlConfig, output: Vec<f32>) -> Self {
        Self {
            input_len: config.onnx_conf.input_len(),
            output,
            calls: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::default(),
            fail_next: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_once(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn last_input(&self) -> Vec<f32> {
        self.inputs.lock().last().cloned().unwrap_or_default()
    }
}

impl PolicyEngine for RecordingPolicy {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.output.len()
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>, PolicyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PolicyError::Runtime("engine unavailable".to_string()));
        }
        self.inputs.lock().push(input.to_vec());
        Ok(self.output.clone())
    }
}

/// 创建控制器，返回引擎的共享视图
pub fn controller(
    decimation: u32,
    num_hist: usize,
    output: Vec<f32>,
) -> (RlController, RecordingPolicy) {
    let config = config(decimation, num_hist);
    let policy = RecordingPolicy::new(&config, output);
    let controller = RlController::with_engine(config, true, Box::new(policy.clone())).unwrap();
    (controller, policy)
}

/// 写入完整的关节状态（逆序）和单位姿态 IMU
pub fn feed(handle: &ControllerHandle, positions: [f64; 3]) {
    handle.set_joint_state(JointState::from_triples(
        JOINTS
            .iter()
            .zip(positions)
            .rev()
            .map(|(name, q)| (name.to_string(), q, 0.0)),
    ));
    handle.set_imu(Imu::default());
}
