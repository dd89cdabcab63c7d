//! Tests for the step driver
//!
//! One control step = one action, `sim_freq / control_freq` physics ticks and
//! exactly one increment of every instance's step counter.

use super::*;
use crate::action::Action;
use crate::device::DeviceKind;
use crate::reset::ResetOptions;
use indexmap::IndexMap;
use ndarray::{arr1, Array2, ArrayD, IxDyn};
use simbatch_core::ErrorClass;

mod substep_tests {
    use super::*;

    /// INTENT: Verify 100 Hz physics under 20 Hz control runs five ticks per
    /// step and counts each step once
    #[test]
    fn should_run_substeps_and_count_control_steps() {
        let mut env = cube_env(4);
        assert_eq!(env.sim_config().substeps(), 5);
        env.reset(None, ResetOptions::new()).unwrap();

        for _ in 0..3 {
            env.step(Array2::<f32>::zeros((4, 3))).unwrap();
        }

        assert_eq!(env.elapsed_steps_batched(), &[3, 3, 3, 3]);
        assert_eq!(env.task().control_steps, 3);
        assert_eq!(env.task().sim_ticks, 15);
    }

    /// INTENT: Verify custom frequencies change the substep count and timesteps
    #[test]
    fn should_follow_configured_frequencies() {
        let env = cube_env_with(
            CubeTask::default(),
            EnvConfig::new(2)
                .with_reward_mode(RewardMode::None)
                .with_sim_freq(120)
                .with_control_freq(30),
        );

        assert_eq!(env.sim_config().substeps(), 4);
        assert!((env.sim_timestep() - 1.0 / 120.0).abs() < 1e-7);
        assert!((env.control_timestep() - 1.0 / 30.0).abs() < 1e-7);
    }

    /// INTENT: Verify indivisible frequencies are rejected at construction
    #[test]
    fn should_reject_indivisible_frequencies() {
        let result = BaseEnv::new(
            CubeTask::default(),
            EnvConfig::new(2).with_sim_freq(100).with_control_freq(30),
        );

        assert_eq!(result.err().map(|e| e.class()), Some(ErrorClass::Configuration));
    }

    /// INTENT: Verify a step without action still advances physics
    #[test]
    fn should_advance_physics_without_action() {
        let mut env = cube_env(2);
        env.reset(None, ResetOptions::new()).unwrap();

        env.step(Action::None).unwrap();

        assert!(env.task().cube_height(env.scene(), 0) < CUBE_START_Z);
        assert_eq!(env.elapsed_steps_batched(), &[1, 1]);
    }
}

mod action_tests {
    use super::*;

    /// INTENT: Verify an unbatched action on a batch larger than one is a
    /// contract violation
    #[test]
    fn should_reject_unbatched_action_on_batch() {
        let mut env = reach_env(2, ObsMode::State);
        env.reset(None, ResetOptions::new()).unwrap();

        let err = env.step(arr1(&[0.1f32, 0.0, 0.0]).into_dyn()).unwrap_err();

        assert_eq!(err.class(), ErrorClass::Contract);
        assert_eq!(env.elapsed_steps_batched(), &[0, 0]);
    }

    /// INTENT: Verify a wrongly shaped batched action is a shape error
    #[test]
    fn should_reject_wrong_action_width() {
        let mut env = reach_env(2, ObsMode::State);
        env.reset(None, ResetOptions::new()).unwrap();

        let err = env.step(Array2::<f32>::zeros((2, 4))).unwrap_err();

        assert_eq!(err.class(), ErrorClass::Contract);
    }

    /// INTENT: Verify the control mode can be switched through the action
    #[test]
    fn should_switch_control_mode_from_action() {
        let mut env = reach_env(2, ObsMode::State);
        env.reset(None, ResetOptions::new()).unwrap();

        env.step(Action::WithControlMode {
            control_mode: "pd_joint_vel".into(),
            action: ArrayD::<f32>::zeros(IxDyn(&[2, 3])),
        })
        .unwrap();

        assert_eq!(env.control_mode().as_deref(), Some("pd_joint_vel"));
    }

    /// INTENT: Verify a malformed action leaves the control mode untouched
    #[test]
    fn should_keep_control_mode_on_rejected_switch() {
        let mut env = reach_env(2, ObsMode::State);
        env.reset(None, ResetOptions::new()).unwrap();
        let before = env.control_mode();

        let err = env
            .step(Action::WithControlMode {
                control_mode: "pd_joint_pos".into(),
                action: ArrayD::<f32>::zeros(IxDyn(&[2, 5])),
            })
            .unwrap_err();

        assert_eq!(err.class(), ErrorClass::Contract);
        assert_eq!(env.control_mode(), before);
        assert_eq!(before.as_deref(), Some("pd_joint_delta_pos"));
    }

    /// INTENT: Verify per-agent actions are refused on a single-agent batch
    #[test]
    fn should_reject_per_agent_action_on_single_agent() {
        let mut env = reach_env(2, ObsMode::State);
        env.reset(None, ResetOptions::new()).unwrap();

        let mut map = IndexMap::new();
        map.insert("point_robot-0".to_string(), ArrayD::zeros(IxDyn(&[2, 3])));

        assert!(env.step(Action::PerAgent(map)).is_err());
    }

    /// INTENT: Verify a multi-robot batch keys its action space per agent and
    /// accepts per-agent actions
    #[test]
    fn should_drive_multi_agent_batch() {
        let mut env = cube_env_with(
            CubeTask::default(),
            EnvConfig::new(2)
                .with_reward_mode(RewardMode::None)
                .with_robot("point_robot")
                .with_robot("point_robot"),
        );
        env.reset(None, ResetOptions::new()).unwrap();

        let space = env.single_action_space().unwrap();
        let keys: Vec<&str> = space.as_dict().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["point_robot-0", "point_robot-1"]);

        let mut map = IndexMap::new();
        map.insert("point_robot-0".to_string(), ArrayD::zeros(IxDyn(&[2, 3])));
        map.insert("point_robot-1".to_string(), ArrayD::ones(IxDyn(&[2, 3])));
        assert!(env.step(Action::PerAgent(map)).is_ok());
    }
}

mod single_device_tests {
    use super::*;

    /// INTENT: Verify a single instance runs on the synchronous device and
    /// its outputs carry no batch axis
    #[test]
    fn should_return_unbatched_outputs_on_single_instance() {
        let mut env = reach_env(1, ObsMode::State);
        assert_eq!(env.device_kind(), DeviceKind::SingleInstance);
        let (obs, info) = env.reset(None, ResetOptions::new()).unwrap();
        assert_eq!(obs.shape().unwrap().len(), 1);
        assert_eq!(info["elapsed_steps"].shape().unwrap(), &[] as &[usize]);

        let out = env.step(arr1(&[0.1f32, 0.0, 0.0]).into_dyn()).unwrap();

        assert_eq!(out.reward.ndim(), 0);
        assert_eq!(out.terminated.ndim(), 0);
        assert_eq!(out.truncated.ndim(), 0);
        assert_eq!(out.obs.shape().unwrap().len(), 1);
        assert_eq!(out.info["elapsed_steps"].as_i32().unwrap()[IxDyn(&[])], 1);
        assert_eq!(env.elapsed_steps().ndim(), 0);
    }

    /// INTENT: Verify forcing the batched device keeps the batch axis for a
    /// single instance
    #[test]
    fn should_keep_batch_axis_when_forced_batched() {
        let mut env = reach_env_with(EnvConfig::new(1).with_force_batched(true));
        assert_eq!(env.device_kind(), DeviceKind::Batched);
        env.reset(None, ResetOptions::new()).unwrap();

        let out = env.step(arr1(&[0.1f32, 0.0, 0.0]).into_dyn()).unwrap();

        assert_eq!(out.reward.shape(), &[1]);
        assert_eq!(out.obs.shape().unwrap()[0], 1);
    }
}

mod reward_tests {
    use super::*;

    /// INTENT: Verify dense reward on a task without the capability is a
    /// contract violation raised at step time
    #[test]
    fn should_reject_dense_reward_without_capability() {
        let mut env = cube_env_with(CubeTask::default(), EnvConfig::new(2));
        env.reset(None, ResetOptions::new()).unwrap();

        let err = env.step(Action::None).unwrap_err();

        assert_eq!(err.class(), ErrorClass::Contract);
    }

    /// INTENT: Verify sparse reward needs a success signal
    #[test]
    fn should_reject_sparse_reward_without_success() {
        let mut env = cube_env_with(
            CubeTask::default(),
            EnvConfig::new(2).with_reward_mode(RewardMode::Sparse),
        );
        env.reset(None, ResetOptions::new()).unwrap();

        assert_eq!(
            env.step(Action::None).unwrap_err().class(),
            ErrorClass::Contract
        );
    }

    /// INTENT: Verify reward mode none yields zeros
    #[test]
    fn should_return_zero_reward_in_none_mode() {
        let mut env = cube_env(3);
        env.reset(None, ResetOptions::new()).unwrap();

        let out = env.step(Action::None).unwrap();

        assert_eq!(out.reward, ArrayD::<f32>::zeros(IxDyn(&[3])));
    }

    /// INTENT: Verify dense reward is bounded and normalized dense is half of it
    #[test]
    fn should_scale_normalized_dense_reward() {
        let mut dense = reach_env(2, ObsMode::State);
        let mut normalized =
            reach_env_with(EnvConfig::new(2).with_reward_mode(RewardMode::NormalizedDense));
        dense.reset(Some(3), ResetOptions::new()).unwrap();
        normalized.reset(Some(3), ResetOptions::new()).unwrap();

        let a = dense.step(Array2::<f32>::zeros((2, 3))).unwrap();
        let b = normalized.step(Array2::<f32>::zeros((2, 3))).unwrap();

        for (d, n) in a.reward.iter().zip(b.reward.iter()) {
            assert!(*d >= 0.0 && *d <= 2.0);
            assert!((d / 2.0 - n).abs() < 1e-6);
        }
    }
}

mod termination_tests {
    use super::*;

    /// INTENT: Verify a failure flag terminates the episode even without a
    /// success signal
    #[test]
    fn should_terminate_on_fail_only_info() {
        let mut env = cube_env_with(
            CubeTask::failing_after(2),
            EnvConfig::new(2).with_reward_mode(RewardMode::None),
        );
        env.reset(None, ResetOptions::new()).unwrap();

        let first = env.step(Action::None).unwrap();
        assert!(first.terminated.iter().all(|t| !t));

        let second = env.step(Action::None).unwrap();
        assert!(second.terminated.iter().all(|&t| t));
        assert!(second.truncated.iter().all(|t| !t));
        assert!(second.dones().iter().all(|&d| d));
    }

    /// INTENT: Verify driving the tip onto the goal reports success,
    /// terminates and pays the success reward
    #[test]
    fn should_terminate_when_goal_reached() {
        let mut env = reach_env_with(
            EnvConfig::new(2)
                .with_control_mode("pd_joint_pos")
                .with_reward_mode(RewardMode::Sparse),
        );
        env.reset(Some(11), ResetOptions::new()).unwrap();

        // Joint targets that put the tip on the goal, root at (-0.6, 0, 0).
        let mut action = env.task().goal_positions().clone();
        action.column_mut(0).mapv_inplace(|x| x + 0.6);

        let mut out = env.step(action.clone()).unwrap();
        for _ in 0..40 {
            out = env.step(action.clone()).unwrap();
        }

        assert!(out.terminated.iter().all(|&t| t));
        assert_eq!(out.reward, ArrayD::<f32>::ones(IxDyn(&[2])));
        let success = out.info["success"].as_bool().unwrap();
        assert!(success.iter().all(|&s| s));
    }
}

mod proptest_elapsed_steps {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// Counters advance once per step and restart only where masked
        #[test]
        fn test_elapsed_steps_follow_mask(steps in 1usize..5, mask in vec(any::<bool>(), 3)) {
            let mut env = cube_env(3);
            env.reset(None, ResetOptions::new()).unwrap();
            for _ in 0..steps {
                env.step(Action::None).unwrap();
            }
            let idx: Vec<usize> = (0..3).filter(|&i| mask[i]).collect();
            env.reset(None, ResetOptions::new().with_env_idx(idx)).unwrap();
            env.step(Action::None).unwrap();

            for (i, &masked) in mask.iter().enumerate() {
                let expected = if masked { 1 } else { steps as i32 + 1 };
                prop_assert_eq!(env.elapsed_steps_batched()[i], expected);
            }
        }
    }
}
