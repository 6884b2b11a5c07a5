//! 传感器存储
//!
//! 三个互相独立的样本单元（速度指令、IMU、关节状态），每个单元一把读写锁：
//! - 写入方只在拷入期间持有写锁
//! - 控制线程只在拷出期间持有读锁
//! - 持锁期间不做任何数值计算
//!
//! 一个慢速的发布者不会阻塞与其无关的其他发布者。

use crate::error::TickError;
use nalgebra::DVector;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use strider_protocol::{Imu, JointState, Twist};

/// 规范关节顺序及名称 → 索引映射
///
/// 构造时从配置的关节列表建立一次，此后不变。
#[derive(Debug, Clone)]
pub struct JointIndex {
    names: Arc<[String]>,
    index: HashMap<String, usize>,
}

impl JointIndex {
    pub fn new(names: &[String]) -> Self {
        let index = names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();
        Self {
            names: names.into(),
            index,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 规范顺序的关节名
    pub fn names(&self) -> &Arc<[String]> {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// 将任意顺序的关节状态样本重排为规范顺序
    ///
    /// 未知关节被忽略；缺少任何规范关节都会返回 [`TickError::MissingJoint`]。
    pub fn reindex(&self, sample: &JointState) -> Result<(DVector<f64>, DVector<f64>), TickError> {
        let n = sample.name.len();
        if sample.position.len() != n {
            return Err(TickError::MalformedJointState(format!(
                "{} names but {} positions",
                n,
                sample.position.len()
            )));
        }
        if !sample.velocity.is_empty() && sample.velocity.len() != n {
            return Err(TickError::MalformedJointState(format!(
                "{} names but {} velocities",
                n,
                sample.velocity.len()
            )));
        }

        let mut pos = DVector::zeros(self.len());
        let mut vel = DVector::zeros(self.len());
        let mut seen = vec![false; self.len()];

        for (i, name) in sample.name.iter().enumerate() {
            let Some(idx) = self.index_of(name) else {
                continue;
            };
            pos[idx] = sample.position[i];
            vel[idx] = sample.velocity.get(i).copied().unwrap_or(0.0);
            seen[idx] = true;
        }

        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(TickError::MissingJoint(self.names[missing].clone()));
        }
        if pos.iter().chain(vel.iter()).any(|v| !v.is_finite()) {
            return Err(TickError::NonFiniteSample("joint_state"));
        }

        Ok((pos, vel))
    }
}

/// 一次快照：三个单元的最新值，关节量已按规范顺序排列
///
/// 三个样本可能来自不同时刻（不保证跨单元一致性）。
#[derive(Debug, Clone)]
pub struct SensorSnapshot {
    pub command: Twist,
    pub imu: Imu,
    /// 关节位置（规范顺序）
    pub joint_pos: DVector<f64>,
    /// 关节速度（规范顺序）
    pub joint_vel: DVector<f64>,
}

/// 传感器存储
#[derive(Debug)]
pub struct SensorStore {
    joint_index: JointIndex,
    velocity_command: RwLock<Twist>,
    imu: RwLock<Imu>,
    joint_state: RwLock<JointState>,
}

impl SensorStore {
    pub fn new(joint_names: &[String]) -> Self {
        Self {
            joint_index: JointIndex::new(joint_names),
            velocity_command: RwLock::new(Twist::default()),
            imu: RwLock::new(Imu::default()),
            joint_state: RwLock::new(JointState::default()),
        }
    }

    pub fn joint_index(&self) -> &JointIndex {
        &self.joint_index
    }

    pub fn set_velocity_command(&self, sample: Twist) {
        *self.velocity_command.write() = sample;
    }

    pub fn set_imu(&self, sample: Imu) {
        *self.imu.write() = sample;
    }

    pub fn set_joint_state(&self, sample: JointState) {
        *self.joint_state.write() = sample;
    }

    /// 拷出三个单元的最新值并重排关节量
    ///
    /// 每把读锁只在各自的拷贝语句内持有，重排发生在所有锁释放之后。
    pub fn snapshot(&self) -> Result<SensorSnapshot, TickError> {
        let command = *self.velocity_command.read();
        let imu = *self.imu.read();
        let joint_state = self.joint_state.read().clone();

        if !command.planar_command().iter().all(|v| v.is_finite()) {
            return Err(TickError::NonFiniteSample("velocity_command"));
        }
        let (joint_pos, joint_vel) = self.joint_index.reindex(&joint_state)?;
        Ok(SensorSnapshot {
            command,
            imu,
            joint_pos,
            joint_vel,
        })
    }
}
