//! Integration tests for the batch orchestrator
//!
//! These tests drive `BaseEnv` end to end on the reference backend:
//!
//! - **Seeding**: main/episode seed derivation and reproducible initial states
//! - **Reset**: masked resets, reconfiguration cadence, lifecycle errors
//! - **Step**: substep counting, action batching, reward and termination
//! - **Observation**: idempotence, per-mode layout, hidden objects
//! - **State**: snapshot round trips on both devices
//! - **Render**: rgb_array, sensors and human mode

pub mod obs_tests;
pub mod step_tests;

use std::sync::{Arc, Mutex};

use ndarray::Array1;
use simbatch_core::{ObsDict, ObsValue, Result, SimError};

use crate::config::{EnvConfig, ObsMode, RewardMode};
use crate::env::BaseEnv;
use crate::math::Pose;
use crate::render::Viewer;
use crate::scene::{ActorBuilder, ActorId, BodyType, Scene};
use crate::task::{EpisodeContext, EvalContext, Evaluation, LoadContext, StepContext, Task};
use crate::tasks::ReachTarget;

// ============================================================================
// Fixtures
// ============================================================================

/// Reach task with a small base camera so sensor modes stay cheap.
pub(crate) fn reach_env(num_envs: usize, obs_mode: ObsMode) -> BaseEnv<ReachTarget> {
    reach_env_with(EnvConfig::new(num_envs).with_obs_mode(obs_mode))
}

pub(crate) fn reach_env_with(config: EnvConfig) -> BaseEnv<ReachTarget> {
    BaseEnv::new(ReachTarget::new().with_sensor_resolution(8, 8), config).unwrap()
}

/// Cube task without reward capability; the reward mode defaults to none.
pub(crate) fn cube_env(num_envs: usize) -> BaseEnv<CubeTask> {
    cube_env_with(CubeTask::default(), EnvConfig::new(num_envs).with_reward_mode(RewardMode::None))
}

pub(crate) fn cube_env_with(task: CubeTask, config: EnvConfig) -> BaseEnv<CubeTask> {
    BaseEnv::new(task, config).unwrap()
}

/// Row `env` of a batched state snapshot.
pub(crate) fn state_row(state: &ndarray::ArrayD<f32>, env: usize) -> Vec<f32> {
    state.index_axis(ndarray::Axis(0), env).iter().copied().collect()
}

// ============================================================================
// Test task
// ============================================================================

pub(crate) const CUBE_START_Z: f32 = 0.5;

/// A single falling cube that counts every hook call.
///
/// `fail` is raised once an instance has taken `fail_after` steps, so
/// termination can be observed without a success condition.
#[derive(Debug, Default)]
pub(crate) struct CubeTask {
    pub fail_load: bool,
    pub fail_after: Option<i32>,
    pub echo_fail: bool,
    pub cube: Option<ActorId>,
    pub loads: usize,
    pub control_steps: usize,
    pub sim_ticks: usize,
    pub initialized: Vec<Vec<usize>>,
}

impl CubeTask {
    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn failing_after(steps: i32) -> Self {
        Self {
            fail_after: Some(steps),
            ..Self::default()
        }
    }

    /// Copies `info["fail"]` into `extra/fail`.
    pub fn echoing_fail() -> Self {
        Self {
            echo_fail: true,
            ..Self::default()
        }
    }

    pub fn cube_height(&self, scene: &Scene, env: usize) -> f32 {
        self.cube.map_or(f32::NAN, |id| scene.actor(id).pose(env).p[2])
    }
}

impl Task for CubeTask {
    fn name(&self) -> &str {
        "Cube-v0"
    }

    fn load_actors(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        self.loads += 1;
        if self.fail_load {
            return Err(SimError::task("cube asset missing"));
        }
        self.cube = Some(
            ctx.scene.add_actor(
                ActorBuilder::new("cube", BodyType::Dynamic)
                    .with_half_size(0.05)
                    .with_initial_pose(Pose::from_position([0.0, 0.0, CUBE_START_Z])),
            ),
        );
        Ok(())
    }

    fn initialize_actors(&mut self, ctx: &mut EpisodeContext<'_>) -> Result<()> {
        self.initialized.push(ctx.env_idx.to_vec());
        let cube = self.cube.ok_or_else(|| SimError::state("cube not loaded"))?;
        for &env in ctx.env_idx {
            ctx.scene
                .actor_mut(cube)
                .set_pose(env, Pose::from_position([0.0, 0.0, CUBE_START_Z]));
        }
        Ok(())
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Evaluation> {
        let fail = match self.fail_after {
            Some(limit) => Array1::from_iter(ctx.elapsed_steps.iter().map(|&s| s >= limit)),
            None => Array1::from_elem(ctx.elapsed_steps.len(), false),
        };
        Ok(Evaluation::default().with_fail(fail))
    }

    fn obs_extra(&self, ctx: &EvalContext<'_>, info: &ObsDict) -> Result<ObsDict> {
        let mut extra = ObsDict::new();
        if self.echo_fail {
            let fail = info
                .get("fail")
                .and_then(ObsValue::as_bool)
                .ok_or_else(|| SimError::contract("get_obs", "info has no 'fail'"))?;
            if fail.shape() != [ctx.elapsed_steps.len()].as_slice() {
                return Err(SimError::shape(
                    "echoed fail",
                    &[ctx.elapsed_steps.len()],
                    fail.shape(),
                ));
            }
            extra.insert("fail".into(), ObsValue::Bool(fail.clone()));
        }
        Ok(extra)
    }

    fn before_control_step(&mut self, _ctx: &mut StepContext<'_>) -> Result<()> {
        self.control_steps += 1;
        Ok(())
    }

    fn after_simulation_step(&mut self, _ctx: &mut StepContext<'_>) -> Result<()> {
        self.sim_ticks += 1;
        Ok(())
    }
}

// ============================================================================
// Recording viewer
// ============================================================================

/// Viewer that logs every call into a shared list.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingViewer {
    pub events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingViewer {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: &'static str) {
        self.events.lock().unwrap().push(event);
    }
}

impl Viewer for RecordingViewer {
    fn bind(&mut self, _scene: &Scene) {
        self.push("bind");
    }

    fn unbind(&mut self) {
        self.push("unbind");
    }

    fn draw(&mut self, _scene: &Scene) -> Result<()> {
        self.push("draw");
        Ok(())
    }
}
