//! Reach a randomly placed goal with the tool tip.
//!
//! The scene holds a static ground slab, a dynamic ball that is dropped at a
//! random spot every episode, and a kinematic goal marker that observation
//! cameras never see.

use ndarray::{Array1, Array2};
use simbatch_core::{ObsDict, ObsValue, Result, SimError};

use crate::agent::PointRobot;
use crate::math::{norm, sub, Pose};
use crate::scene::{ActorBuilder, ActorId, BodyType, ObjectId};
use crate::sensor::CameraConfig;
use crate::task::{DenseReward, EpisodeContext, EvalContext, Evaluation, LoadContext, RewardInput, Task};

/// Goal sampling box, relative to the instance origin.
const GOAL_LOW: [f32; 3] = [-0.8, -0.3, 0.1];
const GOAL_HIGH: [f32; 3] = [-0.4, 0.3, 0.5];

const BALL_HALF_SIZE: f32 = 0.03;

#[derive(Debug, Clone)]
pub struct ReachTarget {
    goal_threshold: f32,
    sensor_resolution: (usize, usize),
    ball: Option<ActorId>,
    goal: Option<ActorId>,
    goal_pos: Array2<f32>,
}

impl Default for ReachTarget {
    fn default() -> Self {
        Self {
            goal_threshold: 0.05,
            sensor_resolution: (32, 32),
            ball: None,
            goal: None,
            goal_pos: Array2::zeros((0, 3)),
        }
    }
}

impl ReachTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distance below which the episode counts as solved.
    pub fn with_goal_threshold(mut self, threshold: f32) -> Self {
        self.goal_threshold = threshold;
        self
    }

    /// `(width, height)` of the base camera.
    pub fn with_sensor_resolution(mut self, width: usize, height: usize) -> Self {
        self.sensor_resolution = (width, height);
        self
    }

    /// Goal positions, `(N, 3)`.
    pub fn goal_positions(&self) -> &Array2<f32> {
        &self.goal_pos
    }

    pub fn ball(&self) -> Option<ActorId> {
        self.ball
    }

    fn tcp_positions(&self, ctx: &EvalContext<'_>) -> Result<Array2<f32>> {
        let agent = ctx
            .agents
            .iter()
            .next()
            .ok_or_else(|| SimError::state("reach task needs an agent"))?;
        let id = agent
            .articulation()
            .ok_or_else(|| SimError::state("agent has no articulation"))?;
        let art = ctx.scene.articulation(id);
        Ok(Array2::from_shape_fn((ctx.scene.num_envs(), 3), |(env, k)| {
            art.tip_position(env)[k]
        }))
    }

    fn distances(&self, ctx: &EvalContext<'_>) -> Result<Array1<f32>> {
        let tcp = self.tcp_positions(ctx)?;
        Ok(Array1::from_shape_fn(tcp.nrows(), |env| {
            let t = [tcp[[env, 0]], tcp[[env, 1]], tcp[[env, 2]]];
            let g = [
                self.goal_pos[[env, 0]],
                self.goal_pos[[env, 1]],
                self.goal_pos[[env, 2]],
            ];
            norm(sub(g, t))
        }))
    }
}

impl Task for ReachTarget {
    fn name(&self) -> &str {
        "ReachTarget-v1"
    }

    fn supported_robots(&self) -> Option<Vec<String>> {
        Some(vec![PointRobot::UID.to_string()])
    }

    fn load_actors(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let n = ctx.scene.num_envs();
        ctx.scene.add_actor(
            ActorBuilder::new("ground", BodyType::Static)
                .with_half_size(1.0)
                .with_color([90, 90, 90])
                .with_initial_pose(Pose::from_position([0.0, 0.0, -1.0])),
        );
        self.ball = Some(
            ctx.scene.add_actor(
                ActorBuilder::new("ball", BodyType::Dynamic)
                    .with_half_size(BALL_HALF_SIZE)
                    .with_color([220, 40, 40])
                    .with_initial_pose(Pose::from_position([0.0, 0.0, BALL_HALF_SIZE])),
            ),
        );
        self.goal = Some(
            ctx.scene.add_actor(
                ActorBuilder::new("goal", BodyType::Kinematic)
                    .with_half_size(self.goal_threshold)
                    .with_color([40, 220, 40]),
            ),
        );
        self.goal_pos = Array2::zeros((n, 3));
        Ok(())
    }

    fn register_sensors(&self) -> Vec<CameraConfig> {
        let (w, h) = self.sensor_resolution;
        vec![CameraConfig::new("base_camera", w, h).with_look_at([0.3, 0.0, 0.6], [-0.3, 0.0, 0.2])]
    }

    fn register_human_render_cameras(&self) -> Vec<CameraConfig> {
        vec![CameraConfig::new("render_camera", 64, 64).with_look_at([0.6, 0.7, 0.6], [-0.3, 0.0, 0.2])]
    }

    fn hidden_objects(&self) -> Vec<ObjectId> {
        self.goal.map(ObjectId::Actor).into_iter().collect()
    }

    fn initialize_actors(&mut self, ctx: &mut EpisodeContext<'_>) -> Result<()> {
        let (ball, goal) = match (self.ball, self.goal) {
            (Some(b), Some(g)) => (b, g),
            _ => return Err(SimError::state("reach task actors are not loaded")),
        };
        for &env in ctx.env_idx {
            let x = ctx.rng.uniform(-0.1, 0.1);
            let y = ctx.rng.uniform(-0.1, 0.1);
            let ball_actor = ctx.scene.actor_mut(ball);
            ball_actor.set_pose(env, Pose::from_position([x, y, BALL_HALF_SIZE]));
            ball_actor.set_linear_velocity(env, [0.0; 3]);
            ball_actor.set_angular_velocity(env, [0.0; 3]);

            let p: [f32; 3] = std::array::from_fn(|k| ctx.rng.uniform(GOAL_LOW[k], GOAL_HIGH[k]));
            ctx.scene.actor_mut(goal).set_pose(env, Pose::from_position(p));
            for (k, v) in p.into_iter().enumerate() {
                self.goal_pos[[env, k]] = v;
            }
        }
        Ok(())
    }

    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Evaluation> {
        let dist = self.distances(ctx)?;
        let success = dist.mapv(|d| d < self.goal_threshold);
        Ok(Evaluation::default()
            .with_success(success)
            .with_metric("tcp_to_goal_dist", dist.into_dyn()))
    }

    fn obs_extra(&self, ctx: &EvalContext<'_>, _info: &ObsDict) -> Result<ObsDict> {
        let tcp = self.tcp_positions(ctx)?;
        let mut extra = ObsDict::new();
        extra.insert("goal_pos".into(), ObsValue::F32(self.goal_pos.clone().into_dyn()));
        extra.insert("tcp_to_goal_pos".into(), ObsValue::F32((&self.goal_pos - &tcp).into_dyn()));
        Ok(extra)
    }

    fn dense_reward(&self) -> Option<&dyn DenseReward> {
        Some(self)
    }
}

impl DenseReward for ReachTarget {
    fn compute_dense_reward(&self, input: &RewardInput<'_>) -> Result<Array1<f32>> {
        let dist = self.distances(&input.eval)?;
        Ok(dist.mapv(|d| {
            if d < self.goal_threshold {
                2.0
            } else {
                1.0 - (5.0 * d).tanh()
            }
        }))
    }

    fn compute_normalized_dense_reward(&self, input: &RewardInput<'_>) -> Result<Array1<f32>> {
        Ok(self.compute_dense_reward(input)? / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, Agents};
    use crate::device::DeviceKind;
    use crate::reset::ResetOptions;
    use crate::rng::EpisodeRng;
    use crate::scene::Scene;

    fn loaded(n: usize) -> (ReachTarget, Scene, Agents) {
        let mut task = ReachTarget::new();
        let mut scene = Scene::new(n, 2.0);
        let mut rng = EpisodeRng::from_seed(1);
        let options = ResetOptions::new();
        let mut ctx = LoadContext {
            scene: &mut scene,
            rng: &mut rng,
            device: DeviceKind::Batched,
            options: &options,
        };
        task.load_actors(&mut ctx).unwrap();
        let mut agents = Agents::Single(Box::new(PointRobot::default()) as Box<dyn Agent>);
        agents.load(&mut scene).unwrap();
        (task, scene, agents)
    }

    #[test]
    fn test_goal_sampled_inside_box_only_for_masked_envs() {
        let (mut task, mut scene, mut agents) = loaded(3);
        let mut rng = EpisodeRng::from_seed(9);
        let mut ctx = EpisodeContext {
            scene: &mut scene,
            agents: &mut agents,
            env_idx: &[2],
            rng: &mut rng,
            device: DeviceKind::Batched,
        };
        task.initialize_actors(&mut ctx).unwrap();
        for k in 0..3 {
            assert_eq!(task.goal_positions()[[0, k]], 0.0);
            let v = task.goal_positions()[[2, k]];
            assert!(v >= GOAL_LOW[k] && v <= GOAL_HIGH[k]);
        }
    }

    #[test]
    fn test_success_when_tip_on_goal() {
        let (mut task, scene, agents) = loaded(2);
        let tip = scene.articulation(agents.single().unwrap().articulation().unwrap()).tip_position(1);
        for (k, v) in tip.into_iter().enumerate() {
            task.goal_pos[[1, k]] = v;
        }
        let steps = [0, 0];
        let eval = EvalContext {
            scene: &scene,
            agents: &agents,
            elapsed_steps: &steps,
            device: DeviceKind::Batched,
        };
        let info = task.evaluate(&eval).unwrap().into_info();
        let success = info["success"].as_bool().unwrap();
        assert!(!success[[0]]);
        assert!(success[[1]]);
    }

    #[test]
    fn test_goal_is_hidden_from_sensors() {
        let (task, _, _) = loaded(1);
        assert_eq!(task.hidden_objects(), vec![ObjectId::Actor(ActorId(2))]);
    }
}
