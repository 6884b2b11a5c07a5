//! 控制器状态机
//!
//! [`RlController`] 由控制线程独占，每个 tick 调用一次 [`RlController::update`]；
//! [`ControllerHandle`] 可克隆，供发布线程写入传感器样本、切换模式、读取关节指令。
//!
//! # 模式
//!
//! | 模式  | 推理 | 输出 |
//! |-------|------|------|
//! | Idle  | 否   | 不发布，保持上一帧指令 |
//! | Zero  | 否   | 从进入时的关节姿态线性过渡到全零姿态 |
//! | Stand | 否   | 从进入时的关节姿态线性过渡到初始姿态 |
//! | Walk  | 每 `decimation` 个 tick 一次 | 策略动作经缩放、裁剪、滤波后发布 |
//!
//! 模式切换在下一个 tick 开始时生效。每次 `set_mode()`（包括重复设置当前模式）
//! 都是一次进入事件。
//!
//! # 单 tick 错误
//!
//! 传感器数据畸形、关节缺失或推理失败时本 tick 被跳过：不发布新指令，
//! 就绪信号清除，告警按连续次数限流。

use crate::action::{ActionPostProcessor, TransitionProgress, blend};
use crate::command::{CommandOutput, JointCommandSet};
use crate::error::{ControllerError, TickError};
use crate::metrics::ControllerMetrics;
use crate::observation::ObservationAssembler;
use crate::policy::{PolicyEngine, PolicyInvoker, PolicyLoader};
use crate::proprioception;
use crate::sensor::SensorStore;
use arc_swap::ArcSwap;
use nalgebra::DVector;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strider_protocol::{
    AtomicControlMode, ControlConfig, ControlMode, Float64MultiArray, Imu, JointCommand,
    JointState, ModeStamp, Twist,
};
use tracing::{debug, info, trace, warn};

/// 连续跳过 tick 时，每隔多少次输出一条告警
const SKIP_LOG_INTERVAL: u64 = 1000;

/// 控制线程与发布线程共享的状态
#[derive(Debug)]
struct SharedState {
    sensors: SensorStore,
    mode: AtomicControlMode,
    command: ArcSwap<JointCommandSet>,
    ready: AtomicBool,
    metrics: ControllerMetrics,
    use_sim_handles: bool,
}

/// 控制器句柄（可克隆，线程安全）
///
/// ```rust,no_run
/// # use strider_control::{ControllerHandle, ControlMode, Twist};
/// # fn demo(handle: ControllerHandle) {
/// handle.set_velocity_command(Twist::planar(0.3, 0.0, 0.0));
/// handle.set_mode(ControlMode::Walk);
/// if handle.is_ready() {
///     let cmd = handle.command_of_record();
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    shared: Arc<SharedState>,
}

impl ControllerHandle {
    /// 切换控制模式，下一个 tick 生效
    pub fn set_mode(&self, mode: ControlMode) -> ModeStamp {
        let stamp = self.shared.mode.set(mode);
        debug!("Mode requested: {} (epoch {})", mode, stamp.epoch);
        stamp
    }

    pub fn mode(&self) -> ControlMode {
        self.shared.mode.get()
    }

    pub fn set_velocity_command(&self, sample: Twist) {
        self.shared.sensors.set_velocity_command(sample);
    }

    pub fn set_imu(&self, sample: Imu) {
        self.shared.sensors.set_imu(sample);
    }

    pub fn set_joint_state(&self, sample: JointState) {
        self.shared.sensors.set_joint_state(sample);
    }

    /// 自构造或最近一次进入 Walk 以来，是否已有一次观测-推理-发布周期成功完成
    ///
    /// Stand/Zero 的过渡不运行推理，不会置位；任何被跳过的 tick 都会清除。
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    /// 当前发布的关节指令（规范顺序）
    pub fn joint_command(&self) -> Arc<JointCommandSet> {
        self.shared.command.load_full()
    }

    /// 仿真格式的当前指令
    pub fn sim_joint_cmd(&self) -> Float64MultiArray {
        self.shared.command.load().to_sim()
    }

    /// 真机格式的当前指令
    pub fn real_joint_cmd(&self) -> JointCommand {
        self.shared.command.load().to_real()
    }

    /// 按 `use_sim_handles` 选择的指令格式
    pub fn command_of_record(&self) -> CommandOutput {
        self.shared
            .command
            .load()
            .to_output(self.shared.use_sim_handles)
    }

    pub fn use_sim_handles(&self) -> bool {
        self.shared.use_sim_handles
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.shared.metrics
    }
}

/// 单个 tick 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Idle 模式，未发布
    Idle,
    /// 发布了新指令
    Commanded { mode: ControlMode, inferred: bool },
    /// 本 tick 被跳过，上一帧指令保持
    Skipped { mode: ControlMode, error: TickError },
}

impl TickOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TickOutcome::Skipped { .. })
    }
}

/// RL 运动控制器
pub struct RlController {
    shared: Arc<SharedState>,
    config: ControlConfig,
    invoker: PolicyInvoker,
    assembler: ObservationAssembler,
    post: ActionPostProcessor,
    progress: TransitionProgress,
    /// 已生效的模式戳
    active: ModeStamp,
    /// Stand/Zero 过渡起点（进入后首次成功读取的关节姿态）
    held: Option<DVector<f64>>,
    init_posture: DVector<f64>,
    zero_posture: DVector<f64>,
    /// 发布用模板（名称、刚度、阻尼）
    template: JointCommandSet,
    /// 最近一次推理得到的原始动作
    actions: Vec<f32>,
    /// Walk 模式下成功完成的 tick 数
    loop_count: u64,
    decimation: u64,
    consecutive_skips: u64,
}

impl std::fmt::Debug for RlController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RlController")
            .field("active", &self.active)
            .field("invoker", &self.invoker)
            .field("loop_count", &self.loop_count)
            .field("consecutive_skips", &self.consecutive_skips)
            .finish_non_exhaustive()
    }
}

impl RlController {
    /// 校验配置并通过加载器创建推理引擎
    ///
    /// # 错误
    ///
    /// - [`ControllerError::Config`]：配置非法
    /// - [`ControllerError::Policy`]：模型加载失败或维度不符
    pub fn new(
        config: ControlConfig,
        use_sim_handles: bool,
        loader: &dyn PolicyLoader,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let invoker = PolicyInvoker::load(loader, &config.onnx_conf)?;
        Ok(Self::build(config, use_sim_handles, invoker))
    }

    /// 使用已创建的推理引擎
    pub fn with_engine(
        config: ControlConfig,
        use_sim_handles: bool,
        engine: Box<dyn PolicyEngine>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let invoker = PolicyInvoker::new(engine, &config.onnx_conf)?;
        Ok(Self::build(config, use_sim_handles, invoker))
    }

    fn build(config: ControlConfig, use_sim_handles: bool, invoker: PolicyInvoker) -> Self {
        let sensors = SensorStore::new(&config.ordered_joint_names);
        let template = JointCommandSet::new(
            sensors.joint_index().names().clone(),
            config.init_angles(),
            config.stiffness(),
            config.damping(),
        );
        let mode = AtomicControlMode::new(ControlMode::Idle);
        let active = mode.load();
        let num_joints = config.num_joints();

        let shared = Arc::new(SharedState {
            sensors,
            mode,
            command: ArcSwap::from_pointee(template.clone()),
            ready: AtomicBool::new(false),
            metrics: ControllerMetrics::new(),
            use_sim_handles,
        });

        info!(
            "RL controller created: {} joints, {} Hz, decimation {}, output {}",
            num_joints,
            config.control_rate_hz,
            config.walk_step_conf.decimation,
            if use_sim_handles { "sim" } else { "real" }
        );

        Self {
            shared,
            invoker,
            assembler: ObservationAssembler::new(&config),
            post: ActionPostProcessor::new(&config),
            progress: TransitionProgress::new(
                config.walk_step_conf.stand_transition_ms,
                config.control_rate_hz,
            ),
            active,
            held: None,
            init_posture: DVector::from_vec(config.init_angles()),
            zero_posture: DVector::zeros(num_joints),
            template,
            actions: vec![0.0; num_joints],
            loop_count: 0,
            decimation: u64::from(config.walk_step_conf.decimation),
            consecutive_skips: 0,
            config,
        }
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            shared: self.shared.clone(),
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// 当前已生效的模式（可能落后于 `handle().mode()` 一个 tick）
    pub fn active_mode(&self) -> ControlMode {
        self.active.mode
    }

    /// 最近一次推理得到的原始动作
    pub fn last_actions(&self) -> &[f32] {
        &self.actions
    }

    /// Stand/Zero 过渡进度（百分比）
    pub fn progress(&self) -> f64 {
        self.progress.percent()
    }

    /// 执行一个控制周期
    pub fn update(&mut self) -> TickOutcome {
        self.shared.metrics.ticks.fetch_add(1, Ordering::Relaxed);

        let stamp = self.shared.mode.load();
        if stamp != self.active {
            self.enter(stamp);
        }

        let mode = stamp.mode;
        let result = match mode {
            ControlMode::Idle => return TickOutcome::Idle,
            ControlMode::Zero | ControlMode::Stand => self.transition_tick(mode),
            ControlMode::Walk => self.walk_tick(),
        };

        match result {
            Ok(inferred) => {
                if self.consecutive_skips > 0 {
                    info!(
                        "Control recovered in {} mode after {} skipped ticks",
                        mode, self.consecutive_skips
                    );
                    self.consecutive_skips = 0;
                }
                if inferred {
                    self.shared.ready.store(true, Ordering::Release);
                }
                TickOutcome::Commanded { mode, inferred }
            },
            Err(error) => {
                self.on_skip(mode, &error);
                TickOutcome::Skipped { mode, error }
            },
        }
    }

    /// 模式进入事件
    fn enter(&mut self, stamp: ModeStamp) {
        info!(
            "Entering {} mode (from {}, epoch {})",
            stamp.mode, self.active.mode, stamp.epoch
        );
        self.shared.metrics.mode_transitions.fetch_add(1, Ordering::Relaxed);

        match stamp.mode {
            ControlMode::Idle => {},
            ControlMode::Zero | ControlMode::Stand => {
                self.progress.reset();
                self.held = None;
            },
            ControlMode::Walk => {
                self.assembler.reset();
                self.loop_count = 0;
                self.actions.fill(0.0);
                self.shared.ready.store(false, Ordering::Release);
                // 滤波器从上一帧已发布指令起步，首个输出连续
                let last = self.shared.command.load();
                self.post
                    .reset_filters(&DVector::from_column_slice(&last.position));
            },
        }
        self.active = stamp;
    }

    /// Stand/Zero：从进入姿态线性过渡到目标姿态
    fn transition_tick(&mut self, mode: ControlMode) -> Result<bool, TickError> {
        let held = match self.held.take() {
            Some(held) => held,
            None => {
                let snapshot = self.shared.sensors.snapshot()?;
                debug!("{} transition starts from {:?}", mode, snapshot.joint_pos.as_slice());
                snapshot.joint_pos
            },
        };

        let target = if mode == ControlMode::Stand {
            &self.init_posture
        } else {
            &self.zero_posture
        };
        let command = blend(&held, target, self.progress.percent());
        self.held = Some(held);

        let percent = self.progress.advance();
        trace!("{} progress {:.1}%", mode, percent);
        self.publish(command);
        Ok(false)
    }

    /// Walk：每 `decimation` 个 tick 推理一次，其余 tick 复用上一帧动作
    fn walk_tick(&mut self) -> Result<bool, TickError> {
        let inferred = self.loop_count % self.decimation == 0;
        if inferred {
            let snapshot = self.shared.sensors.snapshot()?;
            let propri = proprioception::estimate(&snapshot, &self.actions)?;
            let obs = self.assembler.assemble(&propri, &snapshot.command);
            let actions = self.invoker.infer(self.assembler.candidate_input(&obs))?;
            // 推理失败时历史与相位保持不变，下一次重试看到同样的输入
            self.assembler.commit(&obs, &snapshot.command);
            self.actions = actions;
            self.shared.metrics.inferences.fetch_add(1, Ordering::Relaxed);
            trace!("Policy actions: {:?}", self.actions);
        }

        let targets = self.post.targets(&self.actions);
        let command = self.post.filter(&targets);
        self.publish(command);
        self.loop_count += 1;
        Ok(inferred)
    }

    fn publish(&mut self, position: DVector<f64>) {
        let next = self.template.with_position(position.as_slice().to_vec());
        self.shared.command.store(Arc::new(next));
        self.shared.metrics.commands_issued.fetch_add(1, Ordering::Relaxed);
    }

    fn on_skip(&mut self, mode: ControlMode, error: &TickError) {
        self.shared.ready.store(false, Ordering::Release);
        self.shared.metrics.skipped_ticks.fetch_add(1, Ordering::Relaxed);
        if self.consecutive_skips % SKIP_LOG_INTERVAL == 0 {
            warn!(
                "Skipping {} tick ({} consecutive): {}. Holding previous command.",
                mode,
                self.consecutive_skips + 1,
                error
            );
        }
        self.consecutive_skips += 1;
    }
}
