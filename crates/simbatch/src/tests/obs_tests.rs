//! Tests for observation dispatch through a live batch

use super::*;
use crate::reset::ResetOptions;
use crate::scene::ObjectId;
use ndarray::Array2;
use simbatch_core::{ObsValue, Space};

/// Segment id the reference renderer gives the third actor (the goal).
const GOAL_SEGMENT: i32 = 3;

fn reset_reach(n: usize, mode: ObsMode) -> (BaseEnv<ReachTarget>, ObsValue) {
    let mut env = reach_env(n, mode);
    let (obs, _) = env.reset(Some(21), ResetOptions::new()).unwrap();
    (env, obs)
}

fn shape_of<'a>(obs: &'a ObsValue, path: &str) -> &'a [usize] {
    obs.get_path(path)
        .and_then(ObsValue::shape)
        .unwrap_or_else(|| panic!("missing leaf '{}'", path))
}

mod layout_tests {
    use super::*;

    /// INTENT: Verify state mode flattens agent and extra entries into one
    /// (N, D) buffer and records the per-instance space
    #[test]
    fn should_flatten_state_observation() {
        let (env, obs) = reset_reach(2, ObsMode::State);

        // qpos, qvel, tcp_pos, goal_pos, tcp_to_goal_pos
        assert_eq!(obs.shape().unwrap(), &[2, 15]);
        assert_eq!(env.single_observation_space().unwrap().shape(), Some(&[15][..]));
        assert_eq!(env.observation_space().unwrap().shape(), Some(&[2, 15][..]));
    }

    /// INTENT: Verify state_dict mode keeps the nested structure
    #[test]
    fn should_nest_state_dict_observation() {
        let (_, obs) = reset_reach(2, ObsMode::StateDict);

        assert_eq!(shape_of(&obs, "agent/qpos"), &[2, 3]);
        assert_eq!(shape_of(&obs, "agent/tcp_pos"), &[2, 3]);
        assert_eq!(shape_of(&obs, "extra/goal_pos"), &[2, 3]);
        assert_eq!(shape_of(&obs, "extra/tcp_to_goal_pos"), &[2, 3]);
    }

    /// INTENT: Verify none mode returns an empty dictionary
    #[test]
    fn should_return_empty_observation_in_none_mode() {
        let (env, obs) = reset_reach(2, ObsMode::None);

        assert!(obs.as_dict().unwrap().is_empty());
        assert_eq!(
            env.single_observation_space().unwrap(),
            &Space::Dict(Default::default())
        );
    }

    /// INTENT: Verify sensor_data mode carries raw buffers and camera params
    #[test]
    fn should_capture_raw_sensor_buffers() {
        let (_, obs) = reset_reach(2, ObsMode::SensorData);

        assert_eq!(shape_of(&obs, "sensor_data/base_camera/Color"), &[2, 8, 8, 4]);
        assert_eq!(shape_of(&obs, "sensor_data/base_camera/Position"), &[2, 8, 8, 3]);
        assert_eq!(shape_of(&obs, "sensor_data/base_camera/Segmentation"), &[2, 8, 8, 1]);
        assert_eq!(shape_of(&obs, "sensor_param/base_camera/intrinsic_cv"), &[2, 3, 3]);
        assert_eq!(shape_of(&obs, "sensor_param/base_camera/cam2world_gl"), &[2, 4, 4]);
        assert!(obs.get_path("agent/qpos").is_some());
    }

    /// INTENT: Verify rgbd mode replaces raw buffers with rgb and depth
    #[test]
    fn should_convert_sensor_buffers_to_rgbd() {
        let (_, obs) = reset_reach(2, ObsMode::Rgbd);

        assert_eq!(shape_of(&obs, "sensor_data/base_camera/rgb"), &[2, 8, 8, 3]);
        assert_eq!(shape_of(&obs, "sensor_data/base_camera/depth"), &[2, 8, 8, 1]);
        assert!(obs.get_path("sensor_data/base_camera/Color").is_none());
    }

    /// INTENT: Verify pointcloud mode fuses every pixel and drops sensor_data
    #[test]
    fn should_fuse_pointcloud() {
        let (_, obs) = reset_reach(2, ObsMode::Pointcloud);

        assert_eq!(shape_of(&obs, "pointcloud/xyzw"), &[2, 64, 4]);
        assert_eq!(shape_of(&obs, "pointcloud/rgb"), &[2, 64, 3]);
        assert!(obs.get_path("sensor_data").is_none());
        assert!(obs.get_path("sensor_param/base_camera").is_some());
    }

    /// INTENT: Verify the single-instance device strips the batch axis from
    /// every leaf and from the batch space
    #[test]
    fn should_unbatch_observation_on_single_instance() {
        let (env, obs) = reset_reach(1, ObsMode::SensorData);

        assert_eq!(shape_of(&obs, "sensor_data/base_camera/Color"), &[8, 8, 4]);
        assert_eq!(shape_of(&obs, "agent/qpos"), &[3]);
        assert_eq!(
            env.observation_space().unwrap(),
            env.single_observation_space().unwrap().clone()
        );
    }
}

mod consistency_tests {
    use super::*;

    /// INTENT: Verify repeated get_obs calls without stepping agree with each
    /// other and with the reset observation
    #[test]
    fn should_return_same_observation_until_step() {
        for mode in [ObsMode::State, ObsMode::SensorData] {
            let (mut env, obs) = reset_reach(2, mode);

            let first = env.get_obs(None).unwrap();
            let second = env.get_obs(None).unwrap();

            assert_eq!(first, second, "mode {}", mode);
            assert_eq!(first, obs, "mode {}", mode);
        }
    }

    /// INTENT: Verify observations change once physics advances
    #[test]
    fn should_change_observation_after_step() {
        let (mut env, obs) = reset_reach(2, ObsMode::State);

        let out = env.step(Array2::<f32>::ones((2, 3))).unwrap();

        assert_ne!(out.obs, obs);
        assert_eq!(env.get_obs(None).unwrap(), out.obs);
    }

    /// INTENT: Verify info carries step counters and the task evaluation
    #[test]
    fn should_report_evaluation_in_info() {
        let (mut env, _) = reset_reach(3, ObsMode::State);

        let info = env.get_info().unwrap();

        assert_eq!(info["elapsed_steps"].shape().unwrap(), &[3]);
        assert_eq!(info["success"].shape().unwrap(), &[3]);
        assert_eq!(info["tcp_to_goal_dist"].shape().unwrap(), &[3]);

        let with_info = env.get_obs(Some(&info)).unwrap();
        assert_eq!(with_info, env.get_obs(None).unwrap());
    }
}

mod info_feedback_tests {
    use super::*;
    use crate::action::Action;

    /// INTENT: Verify info returned by step can be handed back to get_obs on
    /// both devices and reproduces the step observation
    #[test]
    fn should_accept_returned_info_on_both_devices() {
        for force_batched in [false, true] {
            let config = EnvConfig::new(1)
                .with_reward_mode(RewardMode::None)
                .with_force_batched(force_batched);
            let mut env = cube_env_with(CubeTask::echoing_fail(), config);
            env.reset(None, ResetOptions::new()).unwrap();
            let out = env.step(Action::None).unwrap();

            let obs = env.get_obs(Some(&out.info)).unwrap();

            assert_eq!(obs, out.obs, "force_batched={}", force_batched);
        }
    }

    /// INTENT: Verify info from get_info is accepted on the single-instance
    /// device
    #[test]
    fn should_accept_get_info_on_single_instance() {
        let config = EnvConfig::new(1).with_reward_mode(RewardMode::None);
        let mut env = cube_env_with(CubeTask::echoing_fail(), config);
        env.reset(None, ResetOptions::new()).unwrap();
        let info = env.get_info().unwrap();

        let with_info = env.get_obs(Some(&info)).unwrap();

        assert_eq!(with_info, env.get_obs(None).unwrap());
    }
}

mod hidden_object_tests {
    use super::*;

    /// INTENT: Verify observation cameras never see the goal marker and its
    /// visibility is restored afterwards
    #[test]
    fn should_hide_goal_from_observation_cameras() {
        let (env, obs) = reset_reach(4, ObsMode::SensorData);

        let seg = obs
            .get_path("sensor_data/base_camera/Segmentation")
            .and_then(ObsValue::as_i32)
            .unwrap();
        assert!(seg.iter().all(|&id| id != GOAL_SEGMENT));

        let goal = env.task().hidden_objects();
        assert_eq!(goal.len(), 1);
        let ObjectId::Actor(id) = goal[0] else {
            panic!("goal should be an actor");
        };
        assert!(env.scene().actor(id).visible);
    }
}
