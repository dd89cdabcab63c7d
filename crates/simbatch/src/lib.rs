//! # simbatch: Lifecycle Orchestration for Batched Simulated Environments
//!
//! Runs N parallel copies of a physics-simulated task behind one
//! `reset` / `step` contract, on either a single-instance synchronous device
//! or a batched device with explicit state transfer.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           BaseEnv<T>                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  reset(seed, options)                 step(action)               │
//! │     │                                    │                       │
//! │     ▼                                    ▼                       │
//! │  ┌──────────┐   ┌───────────┐      ┌────────────┐               │
//! │  │ DualRng  │──▶│ Lifecycle │      │ Action     │               │
//! │  │ main/ep. │   │ reconfig? │      │ normalize  │               │
//! │  └──────────┘   └─────┬─────┘      └─────┬──────┘               │
//! │                       ▼                  ▼                       │
//! │              ┌────────────────┐   ┌──────────────┐              │
//! │              │ Task hooks     │   │ substeps ×K  │              │
//! │              │ (masked idx)   │   │ SimDevice    │              │
//! │              └───────┬────────┘   └──────┬───────┘              │
//! │                      └─────────┬─────────┘                       │
//! │                                ▼                                 │
//! │                 ┌──────────────────────────────┐                 │
//! │                 │ obs / reward / termination   │                 │
//! │                 └──────────────────────────────┘                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use simbatch::{BaseEnv, EnvConfig, ObsMode, ResetOptions, tasks::ReachTarget};
//!
//! let config = EnvConfig::new(16)
//!     .with_obs_mode(ObsMode::State)
//!     .with_reconfiguration_freq(0);
//! let mut env = BaseEnv::new(ReachTarget::new(), config)?;
//! let (obs, _info) = env.reset(Some(7), ResetOptions::new())?;
//! let out = env.step(ndarray::Array2::<f32>::zeros((16, 3)))?;
//! ```

pub mod action;
pub mod agent;
pub mod backend;
pub mod config;
pub mod device;
pub mod env;
pub mod lifecycle;
pub mod math;
pub mod obs;
pub mod render;
pub mod reset;
pub mod reward;
pub mod rng;
pub mod scene;
pub mod sensor;
pub mod task;
pub mod tasks;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use action::Action;
pub use agent::{Agent, Agents, ControlMode, PointRobot, RobotRegistry};
pub use backend::{EulerBackend, PhysicsBackend};
pub use config::{EnvConfig, ObsMode, RenderMode, RewardMode, SimConfig, SimConfigPatch};
pub use device::{select_device, BatchedDevice, DeviceKind, SimDevice, SingleInstanceDevice};
pub use env::{BaseEnv, StepOutput};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use render::{RenderOutput, Viewer};
pub use reset::ResetOptions;
pub use rng::{DualRng, EpisodeRng, DEFAULT_MAIN_SEED};
pub use scene::{ActorBuilder, ActorId, ArticulationBuilder, ArticulationId, BodyType, ObjectId, Scene};
pub use sensor::{Camera, CameraConfig, CameraOverrides, CameraPatch};
pub use task::{DenseReward, EpisodeContext, EvalContext, Evaluation, LoadContext, RewardInput, StepContext, Task};

pub use simbatch_core::{ErrorClass, ObsDict, ObsValue, ResetMask, Result, SimError, Space};
