//! Three-axis prismatic "point" robot: a gantry that moves a small tool in
//! x, y and z.

use ndarray::{Array2, ArrayView2};
use simbatch_core::{ObsDict, ObsValue, Result, SimError, Space};

use crate::math::Pose;
use crate::scene::{ArticulationBuilder, ArticulationId, Scene};

use super::controller::{ControlMode, PdJointController};
use super::Agent;

const LIMITS: [(f32, f32); 3] = [(-0.5, 0.5), (-0.5, 0.5), (0.0, 0.6)];

/// Rest joint configuration.
pub const REST_QPOS: [f32; 3] = [0.0, 0.0, 0.3];

pub struct PointRobot {
    uid: String,
    root_pose: Pose,
    controller: PdJointController,
    articulation: Option<ArticulationId>,
}

impl PointRobot {
    pub const UID: &'static str = "point_robot";

    pub fn new(mode: ControlMode) -> Self {
        Self {
            uid: Self::UID.to_string(),
            root_pose: Pose::from_position([-0.6, 0.0, 0.0]),
            controller: PdJointController::new(mode, LIMITS.to_vec()),
            articulation: None,
        }
    }

    pub fn with_root_pose(mut self, pose: Pose) -> Self {
        self.root_pose = pose;
        self
    }

    fn loaded(&self) -> Result<ArticulationId> {
        self.articulation
            .ok_or_else(|| SimError::state(format!("agent '{}' is not loaded", self.uid)))
    }
}

impl Default for PointRobot {
    fn default() -> Self {
        Self::new(ControlMode::PdJointDeltaPos)
    }
}

impl Agent for PointRobot {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn load(&mut self, scene: &mut Scene) -> Result<()> {
        let id = scene.add_articulation(
            ArticulationBuilder::new(self.uid.clone(), LIMITS.to_vec())
                .with_root_pose(self.root_pose)
                .with_drive(1000.0, 100.0),
        );
        self.articulation = Some(id);
        Ok(())
    }

    fn articulation(&self) -> Option<ArticulationId> {
        self.articulation
    }

    fn control_mode(&self) -> &str {
        self.controller.mode().as_str()
    }

    fn supported_control_modes(&self) -> Vec<String> {
        ControlMode::ALL.iter().map(|m| m.as_str().to_string()).collect()
    }

    fn set_control_mode(&mut self, scene: &mut Scene, mode: &str) -> Result<()> {
        let mode: ControlMode = mode.parse()?;
        self.controller.set_mode(mode);
        let id = self.loaded()?;
        let all: Vec<usize> = (0..scene.num_envs()).collect();
        self.controller.reset(scene.articulation_mut(id), &all);
        Ok(())
    }

    fn single_action_space(&self) -> Space {
        Space::Box(self.controller.action_space())
    }

    fn set_action(&mut self, scene: &mut Scene, action: ArrayView2<'_, f32>) -> Result<()> {
        let id = self.loaded()?;
        let expected = [scene.num_envs(), self.controller.action_dim()];
        if action.shape() != expected {
            return Err(SimError::shape("action", &expected, action.shape()));
        }
        let art = scene.articulation_mut(id);
        for (env, row) in action.outer_iter().enumerate() {
            self.controller.apply(art, env, row);
        }
        Ok(())
    }

    fn proprioception(&self, scene: &Scene) -> ObsDict {
        let mut obs = ObsDict::new();
        if let Some(id) = self.articulation {
            let art = scene.articulation(id);
            let n = scene.num_envs();
            let tcp = Array2::from_shape_fn((n, 3), |(env, k)| art.tip_position(env)[k]);
            obs.insert("qpos".into(), ObsValue::F32(art.qpos().to_owned().into_dyn()));
            obs.insert("qvel".into(), ObsValue::F32(art.qvel().to_owned().into_dyn()));
            obs.insert("tcp_pos".into(), ObsValue::F32(tcp.into_dyn()));
        }
        obs
    }

    fn reset(&mut self, scene: &mut Scene, env_idx: &[usize]) -> Result<()> {
        let id = self.loaded()?;
        let art = scene.articulation_mut(id);
        for &env in env_idx {
            art.set_root_pose(env, self.root_pose);
            art.set_qpos(env, &REST_QPOS);
            art.set_qvel(env, &[0.0; 3]);
        }
        art.update_kinematics();
        self.controller.reset(art, env_idx);
        Ok(())
    }
}
