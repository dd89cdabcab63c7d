//! The batch orchestrator: owns the device, scene, agents, sensors and RNG
//! state of N parallel instances and drives them through
//! reconfigure → reset → step.

use indexmap::IndexMap;
use log::{debug, info, warn};
use ndarray::{s, Array1, Array4, ArrayD, ArrayViewD, Axis, Ix2, Ix4};
use simbatch_core::{ObsDict, ObsValue, ResetMask, Result, SimError, Space};

use crate::action::{apply_action, Action};
use crate::agent::{Agents, RobotRegistry};
use crate::backend::{EulerBackend, PhysicsBackend};
use crate::config::{EnvConfig, RenderMode, SimConfig};
use crate::device::{select_device, DeviceKind, SimDevice};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::obs::{self, capture_cameras, capture_visible, ObsSource, SensorCapture};
use crate::render::{tile_images, RenderOutput, Viewer};
use crate::reset::ResetOptions;
use crate::reward::{compute_reward, termination};
use crate::rng::DualRng;
use crate::scene::{Lighting, ObjectId, Scene};
use crate::sensor::{resolve_configs, Camera, COLOR};
use crate::task::{EpisodeContext, EvalContext, LoadContext, RewardInput, StepContext, Task};

/// Result of [`BaseEnv::step`].
///
/// On the batched device every array has a leading axis of length N; on the
/// single-instance device that axis is removed.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub obs: ObsValue,
    pub reward: ArrayD<f32>,
    /// Episode ended by success or failure.
    pub terminated: ArrayD<bool>,
    /// Episode ended by a time limit.
    pub truncated: ArrayD<bool>,
    pub info: ObsDict,
}

impl StepOutput {
    /// `terminated | truncated`.
    pub fn dones(&self) -> ArrayD<bool> {
        let mut dones = self.terminated.clone();
        dones.zip_mut_with(&self.truncated, |d, &t| *d = *d || t);
        dones
    }
}

fn not_loaded() -> SimError {
    SimError::state("no agents loaded; call reset first")
}

// ============================================================================
// Observation source
// ============================================================================

struct BatchSource<'a, T: Task> {
    task: &'a T,
    scene: &'a mut Scene,
    agents: &'a Agents,
    device: &'a mut dyn SimDevice,
    sensors: &'a IndexMap<String, Camera>,
    hidden: &'a [ObjectId],
    elapsed_steps: &'a [i32],
    info: &'a ObsDict,
}

impl<T: Task> ObsSource for BatchSource<'_, T> {
    fn state_dict(&mut self) -> Result<ObsDict> {
        let eval = EvalContext {
            scene: &*self.scene,
            agents: self.agents,
            elapsed_steps: self.elapsed_steps,
            device: self.device.kind(),
        };
        let mut obs = ObsDict::new();
        obs.insert("agent".into(), ObsValue::Dict(self.agents.proprioception(self.scene)));
        obs.insert("extra".into(), ObsValue::Dict(self.task.obs_extra(&eval, self.info)?));
        Ok(obs)
    }

    fn capture_sensors(&mut self) -> Result<SensorCapture> {
        capture_cameras(&mut *self.device, self.scene, self.sensors, self.hidden)
    }
}

// ============================================================================
// BaseEnv
// ============================================================================

/// A batch of N simulated instances of one task.
pub struct BaseEnv<T: Task> {
    task: T,
    config: EnvConfig,
    sim: SimConfig,
    robot_uids: Vec<String>,
    registry: RobotRegistry,
    device: Box<dyn SimDevice>,
    rng: DualRng,
    lifecycle: Lifecycle,
    scene: Scene,
    agents: Option<Agents>,
    sensors: IndexMap<String, Camera>,
    render_cameras: IndexMap<String, Camera>,
    hidden: Vec<ObjectId>,
    elapsed_steps: Vec<i32>,
    single_observation_space: Option<Space>,
    single_action_space: Option<Space>,
    viewer: Option<Box<dyn Viewer>>,
}

impl<T: Task> BaseEnv<T> {
    /// Create a batch on the reference backend with the built-in robots.
    pub fn new(task: T, config: EnvConfig) -> Result<Self> {
        Self::with_backend(
            task,
            config,
            Box::new(EulerBackend::new()),
            RobotRegistry::with_defaults(),
        )
    }

    /// Create a batch on `backend`, building robots from `registry`.
    ///
    /// Every configuration error is raised here; no scene is built until the
    /// first [`reset`](Self::reset).
    pub fn with_backend(
        task: T,
        config: EnvConfig,
        backend: Box<dyn PhysicsBackend>,
        registry: RobotRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let sim = config.sim.apply(&task.default_sim_config());
        sim.validate()?;

        if !task.supported_reward_modes().contains(&config.reward_mode) {
            return Err(SimError::config(
                "reward_mode",
                format!("task '{}' does not support {}", task.name(), config.reward_mode),
            ));
        }

        let robot_uids = if config.robot_uids.is_empty() {
            task.default_robot_uids()
        } else {
            config.robot_uids.clone()
        };
        if robot_uids.is_empty() {
            return Err(SimError::config("robot_uids", "at least one robot is required"));
        }
        if let Some(supported) = task.supported_robots() {
            if let Some(uid) = robot_uids.iter().find(|uid| !supported.contains(uid)) {
                return Err(SimError::config(
                    "robot_uids",
                    format!("task '{}' does not support robot '{}'", task.name(), uid),
                ));
            }
        }
        for uid in &robot_uids {
            let probe = registry.build(uid)?;
            if let Some(mode) = &config.control_mode {
                if !probe.supported_control_modes().contains(mode) {
                    return Err(SimError::config(
                        "control_mode",
                        format!("robot '{}' has no control mode '{}'", uid, mode),
                    ));
                }
            }
        }

        let num_envs = config.num_envs;
        let device = select_device(num_envs, config.force_batched, backend)?;
        info!(
            "Created '{}' batch: {} instance(s), obs={} reward={} sim={}Hz control={}Hz",
            task.name(),
            num_envs,
            config.obs_mode,
            config.reward_mode,
            sim.sim_freq,
            sim.control_freq
        );

        Ok(Self {
            rng: DualRng::new(config.main_seed),
            lifecycle: Lifecycle::new(config.reconfiguration_freq),
            scene: Scene::new(num_envs, sim.spacing),
            elapsed_steps: vec![0; num_envs],
            task,
            config,
            sim,
            robot_uids,
            registry,
            device,
            agents: None,
            sensors: IndexMap::new(),
            render_cameras: IndexMap::new(),
            hidden: Vec::new(),
            single_observation_space: None,
            single_action_space: None,
            viewer: None,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn num_envs(&self) -> usize {
        self.config.num_envs
    }

    pub fn device_kind(&self) -> DeviceKind {
        self.device.kind()
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Physics parameters after merging user overrides into the task default.
    pub fn sim_config(&self) -> &SimConfig {
        &self.sim
    }

    pub fn sim_timestep(&self) -> f32 {
        self.sim.sim_timestep()
    }

    pub fn control_timestep(&self) -> f32 {
        self.sim.control_timestep()
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn agents(&self) -> Option<&Agents> {
        self.agents.as_ref()
    }

    pub fn sensors(&self) -> &IndexMap<String, Camera> {
        &self.sensors
    }

    pub fn render_cameras(&self) -> &IndexMap<String, Camera> {
        &self.render_cameras
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Number of scene rebuilds so far.
    pub fn reconfigurations(&self) -> u64 {
        self.lifecycle.reconfigurations()
    }

    pub fn main_seed(&self) -> Option<u32> {
        self.rng.main_seed()
    }

    pub fn episode_seed(&self) -> Option<u32> {
        self.rng.episode_seed()
    }

    /// Current control mode, `None` before the first reset.
    pub fn control_mode(&self) -> Option<String> {
        self.agents.as_ref().map(Agents::control_mode)
    }

    /// Per-instance step counters, always of length N.
    pub fn elapsed_steps_batched(&self) -> &[i32] {
        &self.elapsed_steps
    }

    /// Step counters: a vector on the batched device, a scalar otherwise.
    pub fn elapsed_steps(&self) -> ArrayD<i32> {
        self.present_array(Array1::from(self.elapsed_steps.clone()))
    }

    pub fn single_observation_space(&self) -> Result<&Space> {
        self.single_observation_space
            .as_ref()
            .ok_or_else(|| SimError::state("observation space is known after the first reset"))
    }

    pub fn single_action_space(&self) -> Result<&Space> {
        self.single_action_space
            .as_ref()
            .ok_or_else(|| SimError::state("action space is known after the first reset"))
    }

    /// Observation space of the whole batch.
    pub fn observation_space(&self) -> Result<Space> {
        self.single_observation_space().map(|s| self.batch_space(s))
    }

    /// Action space of the whole batch.
    pub fn action_space(&self) -> Result<Space> {
        self.single_action_space().map(|s| self.batch_space(s))
    }

    fn batch_space(&self, single: &Space) -> Space {
        match self.device.kind() {
            DeviceKind::Batched => single.batch(self.num_envs()),
            DeviceKind::SingleInstance => single.clone(),
        }
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Start new episodes on the instances selected by `options.env_idx`
    /// (all instances by default).
    ///
    /// `seed` reseeds the main RNG and becomes the episode seed; without it
    /// the next episode seed is drawn from the main RNG.
    pub fn reset(&mut self, seed: Option<u32>, options: ResetOptions) -> Result<(ObsValue, ObsDict)> {
        self.lifecycle.check_can_reset()?;
        let n = self.num_envs();
        let mut mask = options.mask(n)?;

        self.rng.set_main(seed);
        let episode_seed = self.rng.set_episode(seed);

        let reconfigure = self.lifecycle.needs_reconfigure(options.reconfigure);
        if reconfigure {
            if !mask.all() {
                warn!(
                    "Reconfigure during a partial reset of {:?}; resetting all {} instances",
                    mask.indices(),
                    n
                );
                mask = ResetMask::full(n);
            }
            if let Err(e) = self.reconfigure(&options) {
                warn!("Reconfigure of '{}' failed, batch is unusable: {}", self.task.name(), e);
                self.lifecycle.mark_faulted();
                return Err(e);
            }
        }

        let env_idx = mask.indices();
        debug!(
            "Reset '{}': main_seed={:?} episode_seed={} env_idx={:?} reconfigured={}",
            self.task.name(),
            self.rng.main_seed(),
            episode_seed,
            env_idx,
            reconfigure
        );

        for &i in &env_idx {
            self.elapsed_steps[i] = 0;
        }
        if !reconfigure {
            self.scene.clear_velocities(&env_idx);
        }

        self.rng.reseed_episode();
        self.initialize_episode(&env_idx)?;

        self.device.apply_state(&self.scene)?;
        self.device.update_kinematics(&mut self.scene);
        self.device.fetch_state(&mut self.scene)?;

        self.lifecycle.finish_reset();

        let info = self.evaluate_info()?;
        let obs = self.observe(&info)?;
        if self.single_observation_space.is_none() {
            self.single_observation_space = Some(Space::from_observation(&obs, true));
            self.single_action_space = self.agents.as_ref().map(Agents::single_action_space);
        }
        Ok((self.present(obs)?, self.present_dict(info)?))
    }

    /// Destroy and rebuild every piece of scene content.
    fn reconfigure(&mut self, options: &ResetOptions) -> Result<()> {
        let n = self.num_envs();
        info!("Reconfiguring '{}' ({} instances)", self.task.name(), n);

        if let (Some(viewer), Some(_)) = (self.viewer.as_mut(), &self.agents) {
            viewer.unbind();
        }
        self.agents = None;
        self.sensors.clear();
        self.render_cameras.clear();
        self.hidden.clear();

        self.device.rebuild(n, &self.sim)?;
        self.scene = Scene::new(n, self.sim.spacing);

        let kind = self.device.kind();
        let mut rng = self.rng.fork_episode();

        let mut ctx = LoadContext {
            scene: &mut self.scene,
            rng: &mut rng,
            device: kind,
            options,
        };
        self.task.load_scene(&mut ctx)?;

        let mut agents = self.build_agents()?;
        agents.load(&mut self.scene)?;
        if let Some(mode) = &self.config.control_mode {
            for agent in agents.iter_mut() {
                if agent.control_mode() != mode.as_str() {
                    agent.set_control_mode(&mut self.scene, mode)?;
                }
            }
        }

        let mut ctx = LoadContext {
            scene: &mut self.scene,
            rng: &mut rng,
            device: kind,
            options,
        };
        self.task.load_actors(&mut ctx)?;
        self.task.load_articulations(&mut ctx)?;

        self.scene.set_lighting(Lighting::standard(self.config.enable_shadow));

        let sensor_configs = resolve_configs(
            self.task.register_sensors().into_iter().chain(agents.sensor_configs()),
            &self.config.sensor_overrides,
        )?;
        let render_configs = resolve_configs(
            self.task.register_human_render_cameras(),
            &self.config.human_render_overrides,
        )?;

        self.device.on_scene_loaded(&mut self.scene)?;

        self.sensors = sensor_configs
            .into_iter()
            .map(|(uid, cfg)| (uid, Camera::new(cfg)))
            .collect();
        self.render_cameras = render_configs
            .into_iter()
            .map(|(uid, cfg)| (uid, Camera::new(cfg)))
            .collect();
        self.hidden = self.task.hidden_objects();
        self.agents = Some(agents);

        if let Some(viewer) = self.viewer.as_mut() {
            viewer.bind(&self.scene);
        }

        self.lifecycle.mark_reconfigured();
        info!(
            "Reconfigured '{}': {} actors, {} articulations, {} sensors, {} render cameras",
            self.task.name(),
            self.scene.actors().len(),
            self.scene.articulations().len(),
            self.sensors.len(),
            self.render_cameras.len()
        );
        Ok(())
    }

    fn build_agents(&self) -> Result<Agents> {
        let mut built = self
            .robot_uids
            .iter()
            .map(|uid| self.registry.build(uid))
            .collect::<Result<Vec<_>>>()?;
        if built.len() == 1 {
            Ok(Agents::Single(built.remove(0)))
        } else {
            Ok(Agents::Multi(built))
        }
    }

    fn initialize_episode(&mut self, env_idx: &[usize]) -> Result<()> {
        let device = self.device.kind();
        let agents = self.agents.as_mut().ok_or_else(not_loaded)?;
        let mut ctx = EpisodeContext {
            scene: &mut self.scene,
            agents,
            env_idx,
            rng: self.rng.episode_rng(),
            device,
        };
        self.task.initialize_actors(&mut ctx)?;
        self.task.initialize_articulations(&mut ctx)?;
        self.task.initialize_agent(&mut ctx)?;
        self.task.initialize_task(&mut ctx)
    }

    // ========================================================================
    // Step
    // ========================================================================

    /// Apply `action` once, advance physics by `sim_freq / control_freq`
    /// ticks and report the outcome.
    pub fn step(&mut self, action: impl Into<Action>) -> Result<StepOutput> {
        self.lifecycle.check_ready("step")?;
        let action = action.into();
        let acted = !matches!(action, Action::None);
        let device = self.device.kind();
        let substeps = self.sim.substeps();

        let space = self
            .single_action_space
            .as_ref()
            .ok_or_else(|| SimError::state("step called before the action space was captured"))?;
        let agents = self.agents.as_mut().ok_or_else(not_loaded)?;
        let applied = apply_action(action, agents, &mut self.scene, space)?;
        if acted {
            self.device.apply_controls(&self.scene)?;
        }

        self.task.before_control_step(&mut StepContext {
            scene: &mut self.scene,
            agents: &*agents,
            elapsed_steps: &self.elapsed_steps,
            device,
        })?;
        for _ in 0..substeps {
            agents.before_simulation_step(&mut self.scene);
            self.device.advance_tick(&mut self.scene)?;
            self.task.after_simulation_step(&mut StepContext {
                scene: &mut self.scene,
                agents: &*agents,
                elapsed_steps: &self.elapsed_steps,
                device,
            })?;
        }
        self.device.fetch_state(&mut self.scene)?;
        self.task.after_control_step(&mut StepContext {
            scene: &mut self.scene,
            agents: &*agents,
            elapsed_steps: &self.elapsed_steps,
            device,
        })?;

        for steps in &mut self.elapsed_steps {
            *steps += 1;
        }

        let info = self.evaluate_info()?;
        let obs = self.observe(&info)?;
        let reward = {
            let agents = self.agents.as_ref().ok_or_else(not_loaded)?;
            let input = RewardInput {
                eval: EvalContext {
                    scene: &self.scene,
                    agents,
                    elapsed_steps: &self.elapsed_steps,
                    device,
                },
                obs: &obs,
                action: applied.as_ref(),
                info: &info,
            };
            compute_reward(self.config.reward_mode, &self.task, &input)?
        };
        let (terminated, truncated) = termination(&info, self.num_envs())?;

        Ok(StepOutput {
            obs: self.present(obs)?,
            reward: self.present_array(reward),
            terminated: self.present_array(terminated),
            truncated: self.present_array(truncated),
            info: self.present_dict(info)?,
        })
    }

    // ========================================================================
    // Observation and info
    // ========================================================================

    /// Observation of the current state. Without `info`, the task is
    /// evaluated first.
    pub fn get_obs(&mut self, info: Option<&ObsDict>) -> Result<ObsValue> {
        self.lifecycle.check_ready("get_obs")?;
        let obs = match info {
            Some(info) => {
                let info = self.batch_dict(info.clone());
                self.observe(&info)?
            }
            None => {
                let info = self.evaluate_info()?;
                self.observe(&info)?
            }
        };
        self.present(obs)
    }

    /// `{elapsed_steps}` plus the task's evaluation.
    pub fn get_info(&self) -> Result<ObsDict> {
        self.lifecycle.check_ready("get_info")?;
        self.present_dict(self.evaluate_info()?)
    }

    fn evaluate_info(&self) -> Result<ObsDict> {
        let agents = self.agents.as_ref().ok_or_else(not_loaded)?;
        let eval = EvalContext {
            scene: &self.scene,
            agents,
            elapsed_steps: &self.elapsed_steps,
            device: self.device.kind(),
        };
        let evaluation = self.task.evaluate(&eval)?;
        let mut info = ObsDict::new();
        info.insert(
            "elapsed_steps".into(),
            ObsValue::I32(Array1::from(self.elapsed_steps.clone()).into_dyn()),
        );
        info.extend(evaluation.into_info());
        Ok(info)
    }

    fn observe(&mut self, info: &ObsDict) -> Result<ObsValue> {
        let n = self.num_envs();
        let agents = self.agents.as_ref().ok_or_else(not_loaded)?;
        let mut source = BatchSource {
            task: &self.task,
            scene: &mut self.scene,
            agents,
            device: self.device.as_mut(),
            sensors: &self.sensors,
            hidden: &self.hidden,
            elapsed_steps: &self.elapsed_steps,
            info,
        };
        obs::dispatch(self.config.obs_mode, n, &mut source)
    }

    // ========================================================================
    // Simulation state
    // ========================================================================

    /// Snapshot of every instance: `(N, state_dim)` on the batched device,
    /// `(state_dim,)` otherwise.
    pub fn get_state(&self) -> Result<ArrayD<f32>> {
        self.lifecycle.check_configured("get_state")?;
        let state = self.scene.get_state().into_dyn();
        Ok(match self.device.kind() {
            DeviceKind::Batched => state,
            DeviceKind::SingleInstance => state.index_axis_move(Axis(0), 0),
        })
    }

    /// Restore a snapshot from [`get_state`](Self::get_state). A 1-D
    /// snapshot is treated as a batch of one.
    pub fn set_state(&mut self, state: ArrayViewD<'_, f32>) -> Result<()> {
        self.lifecycle.check_configured("set_state")?;
        let state = if state.ndim() == 1 {
            state.insert_axis(Axis(0))
        } else {
            state
        };
        let state = state
            .into_dimensionality::<Ix2>()
            .map_err(|_| SimError::contract("set_state", "snapshot must be 1-D or 2-D"))?;
        self.scene.set_state(state)?;
        self.device.apply_state(&self.scene)?;
        self.device.update_kinematics(&mut self.scene);
        self.device.fetch_state(&mut self.scene)
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Attach an interactive viewer for `human` render mode.
    pub fn attach_viewer(&mut self, mut viewer: Box<dyn Viewer>) {
        if self.agents.is_some() {
            viewer.bind(&self.scene);
        }
        self.viewer = Some(viewer);
    }

    /// Render according to the configured render mode.
    pub fn render(&mut self) -> Result<RenderOutput> {
        self.lifecycle.check_configured("render")?;
        match self.config.render_mode {
            None => Err(SimError::config("render_mode", "no render mode configured")),
            Some(RenderMode::Human) => {
                let viewer = self
                    .viewer
                    .as_mut()
                    .ok_or_else(|| SimError::contract("render", "human mode needs an attached viewer"))?;
                viewer.draw(&self.scene)?;
                Ok(RenderOutput::Displayed)
            }
            Some(RenderMode::RgbArray) => self.render_rgb_array(None),
            Some(RenderMode::Sensors) => self.render_sensors(),
        }
    }

    /// Tiled RGB images from the human render cameras, hidden objects shown.
    /// With `camera`, only that camera is used.
    pub fn render_rgb_array(&mut self, camera: Option<&str>) -> Result<RenderOutput> {
        self.lifecycle.check_configured("render")?;
        let cameras: IndexMap<String, Camera> = match camera {
            None => self.render_cameras.clone(),
            Some(uid) => {
                let cam = self.render_cameras.get(uid).ok_or_else(|| {
                    SimError::contract("render", format!("no render camera named '{}'", uid))
                })?;
                IndexMap::from([(uid.to_string(), cam.clone())])
            }
        };
        let capture = capture_visible(self.device.as_mut(), &self.scene, &cameras)?;
        self.tiled(&capture)
    }

    /// Tiled RGB images from the observation sensors, hidden objects hidden.
    pub fn render_sensors(&mut self) -> Result<RenderOutput> {
        self.lifecycle.check_configured("render")?;
        let capture = capture_cameras(self.device.as_mut(), &mut self.scene, &self.sensors, &self.hidden)?;
        self.tiled(&capture)
    }

    fn tiled(&self, capture: &SensorCapture) -> Result<RenderOutput> {
        let images = capture
            .data
            .iter()
            .map(|(uid, buffers)| -> Result<Array4<u8>> {
                let color = buffers
                    .get_path(COLOR)
                    .and_then(ObsValue::as_u8)
                    .ok_or_else(|| SimError::contract("render", format!("camera '{}' has no color", uid)))?;
                Ok(color
                    .slice(s![.., .., .., ..3])
                    .to_owned()
                    .into_dimensionality::<Ix4>()?)
            })
            .collect::<Result<Vec<Array4<u8>>>>()?;
        let tiled = tile_images(&images)?.into_dyn();
        Ok(RenderOutput::Image(match self.device.kind() {
            DeviceKind::Batched => tiled,
            DeviceKind::SingleInstance => tiled.index_axis_move(Axis(0), 0),
        }))
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release the scene, agents, sensors and backend instances. Every later
    /// call fails.
    pub fn close(&mut self) {
        if !self.lifecycle.close() {
            warn!("close called twice on '{}'", self.task.name());
            return;
        }
        if let Some(mut viewer) = self.viewer.take() {
            viewer.unbind();
        }
        self.agents = None;
        self.sensors.clear();
        self.render_cameras.clear();
        self.hidden.clear();
        self.device.release();
        info!("Closed '{}' batch", self.task.name());
    }

    // ========================================================================
    // Batch axis at the API boundary
    // ========================================================================

    fn present(&self, obs: ObsValue) -> Result<ObsValue> {
        match self.device.kind() {
            DeviceKind::Batched => Ok(obs),
            DeviceKind::SingleInstance => obs.unbatch(),
        }
    }

    fn present_dict(&self, dict: ObsDict) -> Result<ObsDict> {
        match self.device.kind() {
            DeviceKind::Batched => Ok(dict),
            DeviceKind::SingleInstance => dict
                .into_iter()
                .map(|(k, v)| v.unbatch().map(|v| (k, v)))
                .collect(),
        }
    }

    /// Inverse of `present_dict` for info handed back by the caller.
    fn batch_dict(&self, dict: ObsDict) -> ObsDict {
        match self.device.kind() {
            DeviceKind::Batched => dict,
            DeviceKind::SingleInstance => dict.into_iter().map(|(k, v)| (k, v.batch())).collect(),
        }
    }

    fn present_array<A>(&self, a: Array1<A>) -> ArrayD<A> {
        match self.device.kind() {
            DeviceKind::Batched => a.into_dyn(),
            DeviceKind::SingleInstance => a.into_dyn().index_axis_move(Axis(0), 0),
        }
    }
}
