//! 控制模式定义
//!
//! 定义控制器的工作模式，以及供发布线程与控制线程共享的原子版本。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// 控制器工作模式
///
/// # 模式说明
///
/// - **Idle**: 不输出指令，执行器保持自身的安全默认状态
/// - **Zero**: 从当前姿态过渡到零位，不做推理
/// - **Stand**: 从当前姿态过渡到配置中的初始姿态，不做推理
/// - **Walk**: 完整流水线（状态估计 → 观测 → 推理 → 动作后处理）
///
/// 状态机是封闭的，没有终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ControlMode {
    /// 空闲（默认）
    #[default]
    Idle = 0,
    /// 回零
    Zero = 1,
    /// 站立过渡
    Stand = 2,
    /// 策略行走
    Walk = 3,
}

impl ControlMode {
    /// 所有模式
    pub const ALL: [ControlMode; 4] = [
        ControlMode::Idle,
        ControlMode::Zero,
        ControlMode::Stand,
        ControlMode::Walk,
    ];

    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Idle 模式（不输出指令是最保守的选择）。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Zero,
            2 => Self::Stand,
            3 => Self::Walk,
            _ => Self::Idle,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 该模式是否会输出关节指令
    pub fn issues_commands(self) -> bool {
        self != Self::Idle
    }

    /// 该模式是否调用策略推理
    pub fn runs_inference(self) -> bool {
        self == Self::Walk
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Zero => "zero",
            Self::Stand => "stand",
            Self::Walk => "walk",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "zero" => Ok(Self::Zero),
            "stand" => Ok(Self::Stand),
            "walk" => Ok(Self::Walk),
            other => Err(format!("unknown control mode: {other}")),
        }
    }
}

/// 模式戳：模式 + 设置序号
///
/// 每次 `set()` 都会递增序号，因此"重复设置同一模式"也能被控制线程识别为一次进入事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeStamp {
    pub mode: ControlMode,
    pub epoch: u64,
}

/// 控制模式（原子版本，用于线程间共享）
///
/// 模式与序号打包在同一个 `AtomicU64` 中（低 8 位为模式，高 56 位为序号），
/// 读取永远不会撕裂。
///
/// # 使用场景
///
/// - 发布线程通过 `set()` 切换模式
/// - 控制线程在每个 tick 开始时 `load()`
///
/// # 示例
///
/// ```rust
/// use strider_protocol::mode::{AtomicControlMode, ControlMode};
///
/// let mode = AtomicControlMode::new(ControlMode::Idle);
/// let before = mode.load();
///
/// mode.set(ControlMode::Stand);
/// let after = mode.load();
/// assert_eq!(after.mode, ControlMode::Stand);
/// assert!(after.epoch > before.epoch);
/// ```
#[derive(Debug)]
pub struct AtomicControlMode {
    inner: AtomicU64,
}

impl AtomicControlMode {
    const MODE_BITS: u32 = 8;
    const MODE_MASK: u64 = 0xFF;

    /// 创建新的原子模式（序号为 0）
    pub fn new(mode: ControlMode) -> Self {
        Self {
            inner: AtomicU64::new(mode.as_u8() as u64),
        }
    }

    #[inline]
    fn unpack(raw: u64) -> ModeStamp {
        ModeStamp {
            mode: ControlMode::from_u8((raw & Self::MODE_MASK) as u8),
            epoch: raw >> Self::MODE_BITS,
        }
    }

    /// 读取当前模式戳（SeqCst）
    pub fn load(&self) -> ModeStamp {
        Self::unpack(self.inner.load(Ordering::SeqCst))
    }

    /// 读取当前模式
    pub fn get(&self) -> ControlMode {
        self.load().mode
    }

    /// 设置模式并递增序号，返回新的模式戳
    pub fn set(&self, mode: ControlMode) -> ModeStamp {
        let mut current = self.inner.load(Ordering::SeqCst);
        loop {
            let epoch = (current >> Self::MODE_BITS).wrapping_add(1);
            let next = (epoch << Self::MODE_BITS) | mode.as_u8() as u64;
            match self.inner.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Self::unpack(next),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for AtomicControlMode {
    fn default() -> Self {
        Self::new(ControlMode::default())
    }
}
