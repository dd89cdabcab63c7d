//! Task capability interface.
//!
//! A task decides what goes into the scene, how each episode starts and how
//! success is judged. Every hook receives its inputs explicitly: the scene,
//! the agents, the episode random stream, the device kind and, for
//! per-episode hooks, the indices of the instances being reset.

use ndarray::{Array1, ArrayD};
use simbatch_core::{ObsDict, ObsValue, Result};

use crate::agent::Agents;
use crate::config::{RewardMode, SimConfig};
use crate::device::DeviceKind;
use crate::reset::ResetOptions;
use crate::rng::EpisodeRng;
use crate::scene::{ObjectId, Scene};
use crate::sensor::CameraConfig;

// ============================================================================
// Hook contexts
// ============================================================================

/// Inputs of the scene-building hooks.
pub struct LoadContext<'a> {
    pub scene: &'a mut Scene,
    pub rng: &'a mut EpisodeRng,
    pub device: DeviceKind,
    pub options: &'a ResetOptions,
}

/// Inputs of the per-episode initialization hooks.
pub struct EpisodeContext<'a> {
    pub scene: &'a mut Scene,
    pub agents: &'a mut Agents,
    /// Instances being reset, ascending. May be empty.
    pub env_idx: &'a [usize],
    pub rng: &'a mut EpisodeRng,
    pub device: DeviceKind,
}

/// Inputs of the control/simulation step callbacks.
pub struct StepContext<'a> {
    pub scene: &'a mut Scene,
    pub agents: &'a Agents,
    pub elapsed_steps: &'a [i32],
    pub device: DeviceKind,
}

/// Read-only view used by evaluation and observation hooks.
pub struct EvalContext<'a> {
    pub scene: &'a Scene,
    pub agents: &'a Agents,
    pub elapsed_steps: &'a [i32],
    pub device: DeviceKind,
}

/// Inputs of reward computation. All arrays are batched.
pub struct RewardInput<'a> {
    pub eval: EvalContext<'a>,
    pub obs: &'a ObsValue,
    /// Normalized action of a single-agent step.
    pub action: Option<&'a ArrayD<f32>>,
    pub info: &'a ObsDict,
}

// ============================================================================
// Evaluation
// ============================================================================

/// Result of [`Task::evaluate`], one entry per instance.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub success: Option<Array1<bool>>,
    pub fail: Option<Array1<bool>>,
    /// Additional per-instance metrics, merged into info.
    pub extra: ObsDict,
}

impl Evaluation {
    pub fn with_success(mut self, success: Array1<bool>) -> Self {
        self.success = Some(success);
        self
    }

    pub fn with_fail(mut self, fail: Array1<bool>) -> Self {
        self.fail = Some(fail);
        self
    }

    pub fn with_metric(mut self, key: impl Into<String>, value: impl Into<ObsValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Info entries: `success`, `fail` (when present), then extras.
    pub fn into_info(self) -> ObsDict {
        let mut info = ObsDict::new();
        if let Some(s) = self.success {
            info.insert("success".into(), ObsValue::Bool(s.into_dyn()));
        }
        if let Some(f) = self.fail {
            info.insert("fail".into(), ObsValue::Bool(f.into_dyn()));
        }
        info.extend(self.extra);
        info
    }
}

/// Optional dense reward capability.
pub trait DenseReward {
    fn compute_dense_reward(&self, input: &RewardInput<'_>) -> Result<Array1<f32>>;

    fn compute_normalized_dense_reward(&self, input: &RewardInput<'_>) -> Result<Array1<f32>>;
}

// ============================================================================
// Task
// ============================================================================

/// Scene content and episode logic of an environment.
pub trait Task: Send {
    fn name(&self) -> &str;

    /// Robots loaded when the configuration names none.
    fn default_robot_uids(&self) -> Vec<String> {
        vec![crate::agent::PointRobot::UID.to_string()]
    }

    /// Robot uids this task works with; `None` accepts any.
    fn supported_robots(&self) -> Option<Vec<String>> {
        None
    }

    fn supported_reward_modes(&self) -> Vec<RewardMode> {
        RewardMode::ALL.to_vec()
    }

    fn default_sim_config(&self) -> SimConfig {
        SimConfig::default()
    }

    /// First build hook, before agents are loaded.
    fn load_scene(&mut self, _ctx: &mut LoadContext<'_>) -> Result<()> {
        Ok(())
    }

    fn load_actors(&mut self, ctx: &mut LoadContext<'_>) -> Result<()>;

    fn load_articulations(&mut self, _ctx: &mut LoadContext<'_>) -> Result<()> {
        Ok(())
    }

    fn register_sensors(&self) -> Vec<CameraConfig> {
        Vec::new()
    }

    fn register_human_render_cameras(&self) -> Vec<CameraConfig> {
        Vec::new()
    }

    /// Objects hidden from observation sensors but shown in renders.
    fn hidden_objects(&self) -> Vec<ObjectId> {
        Vec::new()
    }

    fn initialize_actors(&mut self, _ctx: &mut EpisodeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn initialize_articulations(&mut self, _ctx: &mut EpisodeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn initialize_agent(&mut self, ctx: &mut EpisodeContext<'_>) -> Result<()> {
        ctx.agents.reset(ctx.scene, ctx.env_idx)
    }

    fn initialize_task(&mut self, _ctx: &mut EpisodeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Evaluation>;

    /// Task-specific observation entries.
    fn obs_extra(&self, _ctx: &EvalContext<'_>, _info: &ObsDict) -> Result<ObsDict> {
        Ok(ObsDict::new())
    }

    fn dense_reward(&self) -> Option<&dyn DenseReward> {
        None
    }

    fn before_control_step(&mut self, _ctx: &mut StepContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_simulation_step(&mut self, _ctx: &mut StepContext<'_>) -> Result<()> {
        Ok(())
    }

    fn after_control_step(&mut self, _ctx: &mut StepContext<'_>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_evaluation_info_order() {
        let info = Evaluation::default()
            .with_metric("dist", arr1(&[0.5f32]).into_dyn())
            .with_fail(arr1(&[false]))
            .with_success(arr1(&[true]))
            .into_info();
        let keys: Vec<_> = info.keys().cloned().collect();
        assert_eq!(keys, vec!["success", "fail", "dist"]);
    }
}
