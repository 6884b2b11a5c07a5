//! 关节指令
//!
//! 控制器每个 tick 产出一份 [`JointCommandSet`]（规范关节顺序），
//! 并按部署目标序列化为两种线格式之一：
//!
//! - 仿真：[`Float64MultiArray`]，每关节 5 个值 `[position, velocity, effort, stiffness, damping]`
//! - 真机：[`JointCommand`]，按字段分列并带关节名

use std::sync::Arc;
use strider_protocol::{Float64MultiArray, JointCommand};

/// 一帧关节指令（规范顺序）
///
/// 速度与力矩前馈恒为 0，刚度/阻尼取自配置。
#[derive(Debug, Clone, PartialEq)]
pub struct JointCommandSet {
    pub names: Arc<[String]>,
    pub position: Vec<f64>,
    pub stiffness: Vec<f64>,
    pub damping: Vec<f64>,
}

impl JointCommandSet {
    pub fn new(
        names: Arc<[String]>,
        position: Vec<f64>,
        stiffness: Vec<f64>,
        damping: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(names.len(), position.len());
        debug_assert_eq!(names.len(), stiffness.len());
        debug_assert_eq!(names.len(), damping.len());
        Self {
            names,
            position,
            stiffness,
            damping,
        }
    }

    /// 相同增益、不同目标位置的新指令
    pub fn with_position(&self, position: Vec<f64>) -> Self {
        Self::new(
            self.names.clone(),
            position,
            self.stiffness.clone(),
            self.damping.clone(),
        )
    }

    pub fn len(&self) -> usize {
        self.position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// 仿真格式：按关节交织 `[pos, vel, effort, kp, kd]`
    pub fn to_sim(&self) -> Float64MultiArray {
        let mut data = Vec::with_capacity(self.len() * Float64MultiArray::STRIDE);
        for i in 0..self.len() {
            data.extend_from_slice(&[
                self.position[i],
                0.0,
                0.0,
                self.stiffness[i],
                self.damping[i],
            ]);
        }
        Float64MultiArray { data }
    }

    /// 真机格式
    pub fn to_real(&self) -> JointCommand {
        let n = self.len();
        JointCommand {
            name: self.names.to_vec(),
            position: self.position.clone(),
            velocity: vec![0.0; n],
            effort: vec![0.0; n],
            stiffness: self.stiffness.clone(),
            damping: self.damping.clone(),
        }
    }

    /// 按部署目标序列化
    pub fn to_output(&self, use_sim_handles: bool) -> CommandOutput {
        if use_sim_handles {
            CommandOutput::Sim(self.to_sim())
        } else {
            CommandOutput::Real(self.to_real())
        }
    }
}

/// 已序列化的指令（二选一，由 `use_sim_handles` 决定）
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Sim(Float64MultiArray),
    Real(JointCommand),
}

impl CommandOutput {
    /// 第 `joint` 个关节的目标位置
    pub fn position(&self, joint: usize) -> Option<f64> {
        match self {
            CommandOutput::Sim(array) => array.position(joint),
            CommandOutput::Real(cmd) => cmd.position.get(joint).copied(),
        }
    }

    pub fn num_joints(&self) -> usize {
        match self {
            CommandOutput::Sim(array) => array.num_joints(),
            CommandOutput::Real(cmd) => cmd.position.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> JointCommandSet {
        JointCommandSet::new(
            Arc::from(vec!["a".to_string(), "b".to_string()]),
            vec![0.1, -0.2],
            vec![40.0, 45.0],
            vec![1.0, 1.5],
        )
    }

    #[test]
    fn test_sim_layout() {
        let sim = sample().to_sim();
        assert_eq!(
            sim.data,
            vec![0.1, 0.0, 0.0, 40.0, 1.0, -0.2, 0.0, 0.0, 45.0, 1.5]
        );
        assert_eq!(sim.num_joints(), 2);
        assert_eq!(sim.position(1), Some(-0.2));
    }

    #[test]
    fn test_real_layout() {
        let real = sample().to_real();
        assert_eq!(real.name, vec!["a", "b"]);
        assert_eq!(real.position, vec![0.1, -0.2]);
        assert_eq!(real.velocity, vec![0.0, 0.0]);
        assert_eq!(real.effort, vec![0.0, 0.0]);
        assert_eq!(real.stiffness, vec![40.0, 45.0]);
        assert_eq!(real.damping, vec![1.0, 1.5]);
    }

    #[test]
    fn test_output_selection() {
        let cmd = sample();
        assert!(matches!(cmd.to_output(true), CommandOutput::Sim(_)));
        let real = cmd.to_output(false);
        assert!(matches!(real, CommandOutput::Real(_)));
        assert_eq!(real.position(0), Some(0.1));
        assert_eq!(real.num_joints(), 2);
        assert_eq!(real.position(5), None);
    }

    #[test]
    fn test_with_position_keeps_gains() {
        let next = sample().with_position(vec![0.5, 0.5]);
        assert_eq!(next.position, vec![0.5, 0.5]);
        assert_eq!(next.stiffness, vec![40.0, 45.0]);
        assert_eq!(next.names.len(), 2);
    }
}
