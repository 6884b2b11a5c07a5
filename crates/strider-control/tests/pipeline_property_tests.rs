//! 观测/动作流水线的属性测试
//!
//! 使用 proptest 验证裁剪幂等、观测有界、历史缓冲长度与顺序、过渡进度单调。

mod common;

use nalgebra::{DVector, Vector3};
use proptest::prelude::*;
use strider_control::action::{ActionPostProcessor, TransitionProgress, blend, clip};
use strider_control::observation::{HistoryBuffer, ObservationAssembler};
use strider_control::proprioception::Proprioception;
use strider_control::sensor::JointIndex;
use strider_protocol::{JointState, Twist};

fn proprioception(values: &[f64]) -> Proprioception {
    Proprioception {
        joint_pos: DVector::from_column_slice(&values[0..3]),
        joint_vel: DVector::from_column_slice(&values[3..6]),
        base_ang_vel: Vector3::new(values[6], values[7], values[8]),
        base_euler_xyz: Vector3::new(values[9], values[10], values[11]),
        projected_gravity: Vector3::new(0.0, 0.0, -1.0),
        last_actions: DVector::from_column_slice(&values[12..15]),
    }
}

proptest! {
    /// 裁剪幂等且有界
    #[test]
    fn clip_is_idempotent(value in -1e6..1e6f64, limit in 0.0..100.0f64) {
        let once = clip(value, limit);
        prop_assert_eq!(clip(once, limit), once);
        prop_assert!(once.abs() <= limit);
    }

    /// 任意本体状态下，观测的每个元素都在 [-obs_clip, obs_clip] 内
    #[test]
    fn observation_is_bounded(
        values in prop::collection::vec(-200.0..200.0f64, 15),
        vx in -5.0..5.0f64,
        wz in -5.0..5.0f64,
    ) {
        let config = common::config(1, 2);
        let assembler = ObservationAssembler::new(&config);
        let obs = assembler.assemble(&proprioception(&values), &Twist::planar(vx, 0.0, wz));
        prop_assert_eq!(obs.len(), config.onnx_conf.obs_size);
        for v in obs {
            prop_assert!(v.abs() <= 1.0);
        }
    }

    /// 历史缓冲区长度恒定，展平结果为最近 `capacity` 帧（旧 → 新）
    #[test]
    fn history_keeps_latest_frames_in_order(
        capacity in 1usize..8,
        pushes in 1usize..30,
    ) {
        let obs_size = 3;
        let mut buf = HistoryBuffer::new(obs_size, capacity);
        for k in 0..pushes {
            buf.push(&[k as f32; 3]);
            prop_assert_eq!(buf.len(), obs_size * capacity);
        }

        let flat = buf.flatten();
        for slot in 0..capacity {
            // 播种帧（k = 0）填充不足的槽位
            let expected = (pushes + slot).saturating_sub(capacity) as f32;
            prop_assert_eq!(&flat[slot * obs_size..(slot + 1) * obs_size], &[expected; 3][..]);
        }
    }

    /// 关节目标始终落在 init ± actions_clip 内
    #[test]
    fn targets_stay_within_clip_envelope(actions in prop::collection::vec(-1e3..1e3f32, 3)) {
        let config = common::config(1, 2);
        let post = ActionPostProcessor::new(&config);
        let targets = post.targets(&actions);
        for (target, init) in targets.iter().zip(common::INIT) {
            prop_assert!((target - init).abs() <= config.onnx_conf.actions_clip + 1e-12);
        }
    }

    /// 过渡进度单调不减，到达时长后恰为 100
    #[test]
    fn transition_progress_is_monotonic(duration_ms in 1.0..500.0f64, rate in 50.0..2000.0f64) {
        let mut progress = TransitionProgress::new(duration_ms, rate);
        let total = (duration_ms * rate / 1000.0).round().max(1.0) as usize;
        let mut last = progress.percent();
        for _ in 0..total {
            let p = progress.advance();
            prop_assert!(p >= last);
            prop_assert!(p <= 100.0);
            last = p;
        }
        prop_assert_eq!(progress.percent(), 100.0);
    }

    /// 混合结果位于起点与目标之间
    #[test]
    fn blend_stays_between_endpoints(
        held in -3.0..3.0f64,
        target in -3.0..3.0f64,
        percent in 0.0..=100.0f64,
    ) {
        let out = blend(&DVector::from_element(1, held), &DVector::from_element(1, target), percent)[0];
        prop_assert!(out >= held.min(target) - 1e-12);
        prop_assert!(out <= held.max(target) + 1e-12);
    }

    /// 任意顺序（含未知关节）的样本都能重排为规范顺序
    #[test]
    fn reindexing_is_order_independent(
        positions in prop::collection::vec(-3.0..3.0f64, 3),
        seed in any::<u64>(),
    ) {
        let index = JointIndex::new(&common::JOINTS.map(String::from));
        let mut entries: Vec<(String, f64, f64)> = common::JOINTS
            .iter()
            .zip(&positions)
            .map(|(name, &q)| (name.to_string(), q, -q))
            .collect();
        entries.push(("unknown".to_string(), 42.0, 0.0));
        let len = entries.len();
        entries.rotate_left((seed as usize) % len);
        if seed % 2 == 1 {
            entries.reverse();
        }

        let (pos, vel) = index.reindex(&JointState::from_triples(entries)).unwrap();
        prop_assert_eq!(pos.as_slice(), positions.as_slice());
        for (v, q) in vel.iter().zip(&positions) {
            prop_assert_eq!(*v, -q);
        }
    }
}
