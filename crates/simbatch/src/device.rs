//! Compute device selection and the state-synchronization contract.
//!
//! - [`SingleInstanceDevice`]: the scene is always current. State is pushed
//!   and pulled around every tick, so apply/fetch are no-ops.
//! - [`BatchedDevice`]: all instances advance in one backend call. State
//!   written to the scene reaches the backend only on [`SimDevice::apply_state`],
//!   and ticks become visible in the scene only after
//!   [`SimDevice::fetch_state`].

use log::info;
use simbatch_core::Result;

use crate::backend::PhysicsBackend;
use crate::config::SimConfig;
use crate::scene::Scene;

/// Which execution model a batch runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    SingleInstance,
    Batched,
}

impl DeviceKind {
    /// Batched when more than one instance is requested or when forced.
    pub fn select(num_envs: usize, force_batched: bool) -> Self {
        if num_envs > 1 || force_batched {
            DeviceKind::Batched
        } else {
            DeviceKind::SingleInstance
        }
    }

    pub fn is_batched(&self) -> bool {
        matches!(self, DeviceKind::Batched)
    }
}

/// One device interface over a physics backend.
pub trait SimDevice: Send {
    fn kind(&self) -> DeviceKind;

    fn backend(&self) -> &dyn PhysicsBackend;

    fn backend_mut(&mut self) -> &mut dyn PhysicsBackend;

    /// Drop existing instances and allocate fresh, empty ones.
    fn rebuild(&mut self, num_envs: usize, sim: &SimConfig) -> Result<()> {
        let backend = self.backend_mut();
        backend.destroy_instances();
        backend.create_instances(num_envs, sim)
    }

    /// Drop every instance.
    fn release(&mut self) {
        self.backend_mut().destroy_instances();
    }

    /// Finish backend setup once the scene's content is loaded.
    fn on_scene_loaded(&mut self, scene: &mut Scene) -> Result<()>;

    /// Make scene state visible to the backend.
    fn apply_state(&mut self, scene: &Scene) -> Result<()>;

    /// Make drive targets visible to the backend.
    fn apply_controls(&mut self, scene: &Scene) -> Result<()>;

    /// Advance one physics tick.
    fn advance_tick(&mut self, scene: &mut Scene) -> Result<()>;

    /// Make backend state visible in the scene.
    fn fetch_state(&mut self, scene: &mut Scene) -> Result<()>;

    /// Refresh link poses from joint positions.
    fn update_kinematics(&mut self, scene: &mut Scene);
}

/// Build the device for a batch and put the backend in the matching mode.
pub fn select_device(
    num_envs: usize,
    force_batched: bool,
    mut backend: Box<dyn PhysicsBackend>,
) -> Result<Box<dyn SimDevice>> {
    let kind = DeviceKind::select(num_envs, force_batched);
    info!(
        "Selected {:?} device for {} instance(s) on backend '{}'",
        kind,
        num_envs,
        backend.name()
    );
    Ok(match kind {
        DeviceKind::SingleInstance => Box::new(SingleInstanceDevice { backend }),
        DeviceKind::Batched => {
            backend.enable_batched()?;
            Box::new(BatchedDevice { backend })
        }
    })
}

// ============================================================================
// Single-instance device
// ============================================================================

pub struct SingleInstanceDevice {
    backend: Box<dyn PhysicsBackend>,
}

impl SingleInstanceDevice {
    pub fn new(backend: Box<dyn PhysicsBackend>) -> Self {
        Self { backend }
    }
}

impl SimDevice for SingleInstanceDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::SingleInstance
    }

    fn backend(&self) -> &dyn PhysicsBackend {
        self.backend.as_ref()
    }

    fn backend_mut(&mut self) -> &mut dyn PhysicsBackend {
        self.backend.as_mut()
    }

    fn on_scene_loaded(&mut self, scene: &mut Scene) -> Result<()> {
        self.backend.load_layout(scene)
    }

    fn apply_state(&mut self, _scene: &Scene) -> Result<()> {
        Ok(())
    }

    fn apply_controls(&mut self, _scene: &Scene) -> Result<()> {
        Ok(())
    }

    fn advance_tick(&mut self, scene: &mut Scene) -> Result<()> {
        self.backend.push_state(scene)?;
        self.backend.push_controls(scene)?;
        self.backend.tick()?;
        self.backend.pull_state(scene)
    }

    fn fetch_state(&mut self, _scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    fn update_kinematics(&mut self, scene: &mut Scene) {
        scene.update_articulation_kinematics();
    }
}

// ============================================================================
// Batched device
// ============================================================================

pub struct BatchedDevice {
    backend: Box<dyn PhysicsBackend>,
}

impl BatchedDevice {
    /// Wrap a backend that is already in batched mode.
    pub fn new(backend: Box<dyn PhysicsBackend>) -> Self {
        Self { backend }
    }
}

impl SimDevice for BatchedDevice {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Batched
    }

    fn backend(&self) -> &dyn PhysicsBackend {
        self.backend.as_ref()
    }

    fn backend_mut(&mut self) -> &mut dyn PhysicsBackend {
        self.backend.as_mut()
    }

    fn on_scene_loaded(&mut self, scene: &mut Scene) -> Result<()> {
        self.backend.load_layout(scene)?;
        self.backend.initialize_batched()?;
        self.backend.pull_state(scene)
    }

    fn apply_state(&mut self, scene: &Scene) -> Result<()> {
        self.backend.push_state(scene)?;
        self.backend.push_controls(scene)
    }

    fn apply_controls(&mut self, scene: &Scene) -> Result<()> {
        self.backend.push_controls(scene)
    }

    fn advance_tick(&mut self, _scene: &mut Scene) -> Result<()> {
        self.backend.tick()
    }

    fn fetch_state(&mut self, scene: &mut Scene) -> Result<()> {
        self.backend.pull_state(scene)
    }

    fn update_kinematics(&mut self, _scene: &mut Scene) {
        self.backend.update_articulation_kinematics();
    }
}
