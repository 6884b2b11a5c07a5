//! 本体感知估计
//!
//! 从一次传感器快照推导机器人本体状态：关节位置/速度（规范顺序）、
//! 基座角速度、基座欧拉角（XYZ）、投影到机体系的重力方向。

use crate::error::TickError;
use crate::sensor::SensorSnapshot;
use nalgebra::{DVector, Quaternion as NaQuaternion, UnitQuaternion, Vector3};
use strider_protocol::Quaternion;

/// 四元数范数下限，低于此值视为无法归一化
const MIN_QUAT_NORM: f64 = 1e-6;

/// 本体感知状态（每 tick 重新计算，不持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct Proprioception {
    pub joint_pos: DVector<f64>,
    pub joint_vel: DVector<f64>,
    pub base_ang_vel: Vector3<f64>,
    /// 基座欧拉角 [roll, pitch, yaw]
    pub base_euler_xyz: Vector3<f64>,
    /// 重力方向在机体系下的投影
    pub projected_gravity: Vector3<f64>,
    /// 上一次推理得到的原始动作（反馈进观测）
    pub last_actions: DVector<f64>,
}

/// 将消息中的四元数转换为单位四元数
///
/// 非有限或范数过小的四元数视为畸形数据。
pub fn unit_orientation(q: &Quaternion) -> Result<UnitQuaternion<f64>, TickError> {
    let raw = NaQuaternion::new(q.w, q.x, q.y, q.z);
    let norm = raw.norm();
    if !norm.is_finite() || norm < MIN_QUAT_NORM {
        return Err(TickError::MalformedOrientation {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        });
    }
    Ok(UnitQuaternion::from_quaternion(raw))
}

/// 由传感器快照和上一帧动作估计本体状态
pub fn estimate(
    snapshot: &SensorSnapshot,
    last_actions: &[f32],
) -> Result<Proprioception, TickError> {
    let orientation = unit_orientation(&snapshot.imu.orientation)?;

    let base_ang_vel = Vector3::from(snapshot.imu.angular_velocity);
    if base_ang_vel.iter().any(|v| !v.is_finite()) {
        return Err(TickError::NonFiniteSample("imu"));
    }

    let (roll, pitch, yaw) = orientation.euler_angles();
    // 重力方向 (0, 0, -1) 从世界系旋转到机体系
    let projected_gravity = orientation.inverse_transform_vector(&-Vector3::z());

    Ok(Proprioception {
        joint_pos: snapshot.joint_pos.clone(),
        joint_vel: snapshot.joint_vel.clone(),
        base_ang_vel,
        base_euler_xyz: Vector3::new(roll, pitch, yaw),
        projected_gravity,
        last_actions: DVector::from_iterator(
            last_actions.len(),
            last_actions.iter().map(|&a| a as f64),
        ),
    })
}
