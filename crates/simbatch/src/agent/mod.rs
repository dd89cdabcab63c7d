//! Robots controlled through the action interface.

pub mod controller;
pub mod point_robot;
pub mod registry;

use ndarray::ArrayView2;
use simbatch_core::{ObsDict, ObsValue, Result, Space};

use crate::scene::{ArticulationId, Scene};
use crate::sensor::CameraConfig;

pub use controller::{ControlMode, PdJointController};
pub use point_robot::PointRobot;
pub use registry::RobotRegistry;

/// A controllable robot.
///
/// Actions passed to [`Agent::set_action`] are always batched, `(N, dim)`.
pub trait Agent: Send {
    fn uid(&self) -> &str;

    /// Add the robot to a freshly built scene.
    fn load(&mut self, scene: &mut Scene) -> Result<()>;

    fn articulation(&self) -> Option<ArticulationId>;

    fn control_mode(&self) -> &str;

    fn supported_control_modes(&self) -> Vec<String>;

    /// Switch controller and reset it for every instance.
    fn set_control_mode(&mut self, scene: &mut Scene, mode: &str) -> Result<()>;

    fn single_action_space(&self) -> Space;

    fn set_action(&mut self, scene: &mut Scene, action: ArrayView2<'_, f32>) -> Result<()>;

    /// Called before every physics tick.
    fn before_simulation_step(&mut self, _scene: &mut Scene) {}

    /// Batched proprioceptive observation.
    fn proprioception(&self, scene: &Scene) -> ObsDict;

    /// Cameras carried by the robot.
    fn sensor_configs(&self) -> Vec<CameraConfig> {
        Vec::new()
    }

    /// Put the given instances in the rest configuration and reset their
    /// controllers.
    fn reset(&mut self, scene: &mut Scene, env_idx: &[usize]) -> Result<()>;
}

/// The robot(s) of a batch: one agent, or several addressed by key.
pub enum Agents {
    Single(Box<dyn Agent>),
    Multi(Vec<Box<dyn Agent>>),
}

impl Agents {
    /// Key of the `i`-th agent in multi-agent dictionaries.
    pub fn key(agent: &dyn Agent, i: usize) -> String {
        format!("{}-{}", agent.uid(), i)
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &dyn Agent> + '_> {
        match self {
            Agents::Single(a) => Box::new(std::iter::once(a.as_ref())),
            Agents::Multi(v) => Box::new(v.iter().map(|a| a.as_ref())),
        }
    }

    pub fn iter_mut(&mut self) -> Box<dyn Iterator<Item = &mut Box<dyn Agent>> + '_> {
        match self {
            Agents::Single(a) => Box::new(std::iter::once(a)),
            Agents::Multi(v) => Box::new(v.iter_mut()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Agents::Single(_) => 1,
            Agents::Multi(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Agents::Multi(_))
    }

    /// Single-agent access; `None` for multi-agent batches.
    pub fn single(&self) -> Option<&dyn Agent> {
        match self {
            Agents::Single(a) => Some(a.as_ref()),
            Agents::Multi(_) => None,
        }
    }

    pub fn single_mut(&mut self) -> Option<&mut Box<dyn Agent>> {
        match self {
            Agents::Single(a) => Some(a),
            Agents::Multi(_) => None,
        }
    }

    pub fn load(&mut self, scene: &mut Scene) -> Result<()> {
        self.iter_mut().try_for_each(|a| a.load(scene))
    }

    pub fn single_action_space(&self) -> Space {
        match self {
            Agents::Single(a) => a.single_action_space(),
            Agents::Multi(v) => Space::Dict(
                v.iter()
                    .enumerate()
                    .map(|(i, a)| (Self::key(a.as_ref(), i), a.single_action_space()))
                    .collect(),
            ),
        }
    }

    pub fn proprioception(&self, scene: &Scene) -> ObsDict {
        match self {
            Agents::Single(a) => a.proprioception(scene),
            Agents::Multi(v) => v
                .iter()
                .enumerate()
                .map(|(i, a)| (Self::key(a.as_ref(), i), ObsValue::Dict(a.proprioception(scene))))
                .collect(),
        }
    }

    pub fn sensor_configs(&self) -> Vec<CameraConfig> {
        self.iter().flat_map(|a| a.sensor_configs()).collect()
    }

    pub fn before_simulation_step(&mut self, scene: &mut Scene) {
        for a in self.iter_mut() {
            a.before_simulation_step(scene);
        }
    }

    pub fn reset(&mut self, scene: &mut Scene, env_idx: &[usize]) -> Result<()> {
        self.iter_mut().try_for_each(|a| a.reset(scene, env_idx))
    }

    /// Current control mode, joined with `,` for multi-agent batches.
    pub fn control_mode(&self) -> String {
        self.iter()
            .map(|a| a.control_mode().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}
