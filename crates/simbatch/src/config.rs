//! Configuration types and builders for a simulation batch.
//!
//! Provides builder-style configuration for:
//! - Observation, reward and render modes (parsed from strings)
//! - Physics and control frequencies, instance spacing, gravity
//! - Robot selection and control mode
//! - Sensor and render camera overrides

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use simbatch_core::{Result, SimError};

use crate::math::Vec3;
use crate::sensor::CameraOverrides;

// ============================================================================
// Modes
// ============================================================================

/// What `get_obs` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObsMode {
    None,
    State,
    StateDict,
    SensorData,
    Rgbd,
    Pointcloud,
}

impl ObsMode {
    pub const ALL: [ObsMode; 6] = [
        ObsMode::None,
        ObsMode::State,
        ObsMode::StateDict,
        ObsMode::SensorData,
        ObsMode::Rgbd,
        ObsMode::Pointcloud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObsMode::None => "none",
            ObsMode::State => "state",
            ObsMode::StateDict => "state_dict",
            ObsMode::SensorData => "sensor_data",
            ObsMode::Rgbd => "rgbd",
            ObsMode::Pointcloud => "pointcloud",
        }
    }

    /// Whether this mode captures camera sensors.
    pub fn uses_sensors(&self) -> bool {
        matches!(self, ObsMode::SensorData | ObsMode::Rgbd | ObsMode::Pointcloud)
    }
}

/// How reward is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMode {
    None,
    Sparse,
    Dense,
    NormalizedDense,
}

impl RewardMode {
    pub const ALL: [RewardMode; 4] = [
        RewardMode::None,
        RewardMode::Sparse,
        RewardMode::Dense,
        RewardMode::NormalizedDense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RewardMode::None => "none",
            RewardMode::Sparse => "sparse",
            RewardMode::Dense => "dense",
            RewardMode::NormalizedDense => "normalized_dense",
        }
    }
}

/// What `render` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Drive an attached interactive viewer.
    Human,
    /// Images from the human render cameras.
    RgbArray,
    /// Images from the observation sensors.
    Sensors,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Human => "human",
            RenderMode::RgbArray => "rgb_array",
            RenderMode::Sensors => "sensors",
        }
    }
}

macro_rules! impl_mode_parsing {
    ($ty:ty, $param:literal, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = SimError;

            fn from_str(s: &str) -> Result<Self> {
                [$($variant),+]
                    .into_iter()
                    .find(|m| m.as_str() == s)
                    .ok_or_else(|| SimError::config($param, format!("unsupported {}: '{}'", $param, s)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_mode_parsing!(ObsMode, "obs_mode", [
    ObsMode::None,
    ObsMode::State,
    ObsMode::StateDict,
    ObsMode::SensorData,
    ObsMode::Rgbd,
    ObsMode::Pointcloud,
]);
impl_mode_parsing!(RewardMode, "reward_mode", [
    RewardMode::None,
    RewardMode::Sparse,
    RewardMode::Dense,
    RewardMode::NormalizedDense,
]);
impl_mode_parsing!(RenderMode, "render_mode", [
    RenderMode::Human,
    RenderMode::RgbArray,
    RenderMode::Sensors,
]);

// ============================================================================
// Simulation Configuration
// ============================================================================

/// Physics parameters shared by every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Physics ticks per second.
    pub sim_freq: u32,
    /// Control steps per second.
    pub control_freq: u32,
    /// Distance between neighbouring instances on the layout grid.
    pub spacing: f32,
    pub gravity: Vec3,
    /// Velocity retained per second while sliding on the ground, in [0, 1].
    pub ground_friction: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sim_freq: 100,
            control_freq: 20,
            spacing: 5.0,
            gravity: [0.0, 0.0, -9.81],
            ground_friction: 0.5,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sim_freq(mut self, hz: u32) -> Self {
        self.sim_freq = hz;
        self
    }

    pub fn with_control_freq(mut self, hz: u32) -> Self {
        self.control_freq = hz;
        self
    }

    pub fn with_spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Physics substeps per control step.
    pub fn substeps(&self) -> u32 {
        self.sim_freq / self.control_freq
    }

    pub fn sim_timestep(&self) -> f32 {
        1.0 / self.sim_freq as f32
    }

    pub fn control_timestep(&self) -> f32 {
        1.0 / self.control_freq as f32
    }

    /// Validate the physics parameters.
    pub fn validate(&self) -> Result<()> {
        if self.sim_freq == 0 || self.control_freq == 0 {
            return Err(SimError::config("sim_freq", "frequencies must be positive"));
        }
        if self.sim_freq % self.control_freq != 0 {
            return Err(SimError::config(
                "control_freq",
                format!(
                    "sim_freq ({}) must be divisible by control_freq ({})",
                    self.sim_freq, self.control_freq
                ),
            ));
        }
        if !(self.spacing.is_finite() && self.spacing >= 0.0) {
            return Err(SimError::config("spacing", "must be finite and non-negative"));
        }
        if !(0.0..=1.0).contains(&self.ground_friction) {
            return Err(SimError::config("ground_friction", "must lie in [0, 1]"));
        }
        Ok(())
    }
}

/// Partial override merged on top of a task's default [`SimConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfigPatch {
    pub sim_freq: Option<u32>,
    pub control_freq: Option<u32>,
    pub spacing: Option<f32>,
    pub gravity: Option<Vec3>,
    pub ground_friction: Option<f32>,
}

impl SimConfigPatch {
    pub fn apply(&self, base: &SimConfig) -> SimConfig {
        SimConfig {
            sim_freq: self.sim_freq.unwrap_or(base.sim_freq),
            control_freq: self.control_freq.unwrap_or(base.control_freq),
            spacing: self.spacing.unwrap_or(base.spacing),
            gravity: self.gravity.unwrap_or(base.gravity),
            ground_friction: self.ground_friction.unwrap_or(base.ground_friction),
        }
    }
}

// ============================================================================
// Environment Configuration
// ============================================================================

/// Complete configuration of a simulation batch.
///
/// # Example
/// ```ignore
/// let config = EnvConfig::new(16)
///     .with_obs_mode(ObsMode::Rgbd)
///     .with_reward_mode(RewardMode::Dense)
///     .with_robot("point_robot")
///     .with_reconfiguration_freq(0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Number of parallel instances.
    pub num_envs: usize,
    pub obs_mode: ObsMode,
    pub reward_mode: RewardMode,
    /// Initial control mode; the agent's default when absent.
    pub control_mode: Option<String>,
    pub render_mode: Option<RenderMode>,
    /// Robots to load, one agent per uid. The task's default when empty.
    pub robot_uids: Vec<String>,
    /// Rebuild the scene every this many resets; 0 rebuilds only on request.
    pub reconfiguration_freq: u32,
    /// Use the batched device even for a single instance.
    pub force_batched: bool,
    /// Main seed installed at construction.
    pub main_seed: Option<u32>,
    pub enable_shadow: bool,
    /// Overrides on the task's default physics parameters.
    pub sim: SimConfigPatch,
    pub sensor_overrides: CameraOverrides,
    pub human_render_overrides: CameraOverrides,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            num_envs: 1,
            obs_mode: ObsMode::State,
            reward_mode: RewardMode::Dense,
            control_mode: None,
            render_mode: None,
            robot_uids: Vec::new(),
            reconfiguration_freq: 0,
            force_batched: false,
            main_seed: Some(crate::rng::DEFAULT_MAIN_SEED),
            enable_shadow: false,
            sim: SimConfigPatch::default(),
            sensor_overrides: CameraOverrides::default(),
            human_render_overrides: CameraOverrides::default(),
        }
    }
}

impl EnvConfig {
    pub fn new(num_envs: usize) -> Self {
        Self {
            num_envs,
            ..Self::default()
        }
    }

    pub fn with_obs_mode(mut self, mode: ObsMode) -> Self {
        self.obs_mode = mode;
        self
    }

    pub fn with_reward_mode(mut self, mode: RewardMode) -> Self {
        self.reward_mode = mode;
        self
    }

    pub fn with_control_mode(mut self, mode: impl Into<String>) -> Self {
        self.control_mode = Some(mode.into());
        self
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = Some(mode);
        self
    }

    /// Add one robot. Call repeatedly for multi-agent batches.
    pub fn with_robot(mut self, uid: impl Into<String>) -> Self {
        self.robot_uids.push(uid.into());
        self
    }

    pub fn with_reconfiguration_freq(mut self, freq: u32) -> Self {
        self.reconfiguration_freq = freq;
        self
    }

    pub fn with_force_batched(mut self, force: bool) -> Self {
        self.force_batched = force;
        self
    }

    pub fn with_main_seed(mut self, seed: Option<u32>) -> Self {
        self.main_seed = seed;
        self
    }

    pub fn with_shadow(mut self, enable: bool) -> Self {
        self.enable_shadow = enable;
        self
    }

    pub fn with_sim_freq(mut self, hz: u32) -> Self {
        self.sim.sim_freq = Some(hz);
        self
    }

    pub fn with_control_freq(mut self, hz: u32) -> Self {
        self.sim.control_freq = Some(hz);
        self
    }

    pub fn with_sim_patch(mut self, patch: SimConfigPatch) -> Self {
        self.sim = patch;
        self
    }

    pub fn with_sensor_overrides(mut self, overrides: CameraOverrides) -> Self {
        self.sensor_overrides = overrides;
        self
    }

    pub fn with_human_render_overrides(mut self, overrides: CameraOverrides) -> Self {
        self.human_render_overrides = overrides;
        self
    }

    /// Validate the parts of the configuration that do not depend on the task.
    pub fn validate(&self) -> Result<()> {
        if self.num_envs == 0 {
            return Err(SimError::config("num_envs", "must be at least 1"));
        }
        if self.control_mode.as_deref() == Some("*") {
            return Err(SimError::config(
                "control_mode",
                "'*' is a wildcard, not a control mode",
            ));
        }
        Ok(())
    }
}
