//! Physics/rendering backend interface.
//!
//! A backend owns the native simulation buffers of N instances. The logical
//! [`Scene`] is the source of truth for everything tasks and agents see;
//! devices decide when state moves between the two.

pub mod reference;

use simbatch_core::Result;

use crate::config::SimConfig;
use crate::scene::Scene;
use crate::sensor::{Camera, CameraFrame};

pub use reference::EulerBackend;

/// Operations the orchestrator needs from a physics engine.
pub trait PhysicsBackend: Send {
    fn name(&self) -> &str;

    /// Allocate `num_envs` empty instances.
    fn create_instances(&mut self, num_envs: usize, sim: &SimConfig) -> Result<()>;

    /// Release every instance and the entities inside them.
    fn destroy_instances(&mut self);

    /// Register the scene's actors and articulations in every instance.
    fn load_layout(&mut self, scene: &Scene) -> Result<()>;

    /// Switch to batched execution. Called once, before any instance exists.
    fn enable_batched(&mut self) -> Result<()>;

    /// One-time pass after a batched scene is fully loaded.
    fn initialize_batched(&mut self) -> Result<()>;

    /// Write poses, velocities and joint state from the scene.
    fn push_state(&mut self, scene: &Scene) -> Result<()>;

    /// Write joint drive targets from the scene.
    fn push_controls(&mut self, scene: &Scene) -> Result<()>;

    /// Read poses, velocities and joint state into the scene.
    fn pull_state(&self, scene: &mut Scene) -> Result<()>;

    /// Advance every instance by one physics timestep.
    fn tick(&mut self) -> Result<()>;

    /// Refresh link poses from joint positions without stepping.
    fn update_articulation_kinematics(&mut self);

    /// Sync poses and visibility into the renderer.
    fn update_render(&mut self, scene: &Scene) -> Result<()>;

    /// Render one camera in every instance.
    fn capture(&self, camera: &Camera) -> Result<CameraFrame>;
}
