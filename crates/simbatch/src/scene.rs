//! Logical scene content shared by every instance of a batch.
//!
//! The scene holds one entry per actor/articulation, each storing its state
//! for all N instances (struct-of-arrays). Tasks and agents read and write
//! this state; devices move it to and from the physics backend.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use simbatch_core::{Result, SimError};

use crate::math::{quat_rotate_vec, Pose, Vec3};

/// Index of an actor in its scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub usize);

/// Index of an articulation in its scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticulationId(pub usize);

/// Any renderable scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectId {
    Actor(ActorId),
    Articulation(ArticulationId),
}

/// How the physics backend treats a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves.
    Static,
    /// Moves only by its own velocity; unaffected by gravity or contact.
    Kinematic,
    /// Fully simulated.
    Dynamic,
}

// ============================================================================
// Actors
// ============================================================================

/// Description of an actor to add to the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorBuilder {
    pub name: String,
    pub body_type: BodyType,
    /// Half extent of the body's bounding cube.
    pub half_size: f32,
    pub color: [u8; 3],
    pub initial_pose: Pose,
}

impl ActorBuilder {
    pub fn new(name: impl Into<String>, body_type: BodyType) -> Self {
        Self {
            name: name.into(),
            body_type,
            half_size: 0.02,
            color: [200, 200, 200],
            initial_pose: Pose::identity(),
        }
    }

    pub fn with_half_size(mut self, half_size: f32) -> Self {
        self.half_size = half_size;
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_initial_pose(mut self, pose: Pose) -> Self {
        self.initial_pose = pose;
        self
    }
}

/// A rigid body, with per-instance state.
#[derive(Debug, Clone)]
pub struct Actor {
    pub name: String,
    pub body_type: BodyType,
    pub half_size: f32,
    pub color: [u8; 3],
    /// Whether cameras currently see this actor.
    pub visible: bool,
    pub(crate) pose: Vec<Pose>,
    pub(crate) linear_velocity: Vec<Vec3>,
    pub(crate) angular_velocity: Vec<Vec3>,
}

impl Actor {
    pub fn pose(&self, env: usize) -> Pose {
        self.pose[env]
    }

    pub fn poses(&self) -> &[Pose] {
        &self.pose
    }

    pub fn set_pose(&mut self, env: usize, pose: Pose) {
        self.pose[env] = pose;
    }

    pub fn linear_velocity(&self, env: usize) -> Vec3 {
        self.linear_velocity[env]
    }

    pub fn set_linear_velocity(&mut self, env: usize, v: Vec3) {
        self.linear_velocity[env] = v;
    }

    pub fn angular_velocity(&self, env: usize) -> Vec3 {
        self.angular_velocity[env]
    }

    pub fn set_angular_velocity(&mut self, env: usize, w: Vec3) {
        self.angular_velocity[env] = w;
    }

    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }
}

// ============================================================================
// Articulations
// ============================================================================

/// Description of an articulation (a root link plus a serial joint chain).
///
/// Joints are prismatic along the root's x, y and z axes in that order; any
/// joint past the third is revolute about the root z axis and does not move
/// the tip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticulationBuilder {
    pub name: String,
    pub limits: Vec<(f32, f32)>,
    pub stiffness: f32,
    pub damping: f32,
    pub fixed_root: bool,
    pub root_pose: Pose,
    pub color: [u8; 3],
    pub link_half_size: f32,
}

impl ArticulationBuilder {
    pub fn new(name: impl Into<String>, limits: Vec<(f32, f32)>) -> Self {
        Self {
            name: name.into(),
            limits,
            stiffness: 1000.0,
            damping: 100.0,
            fixed_root: true,
            root_pose: Pose::identity(),
            color: [90, 120, 220],
            link_half_size: 0.02,
        }
    }

    pub fn with_drive(mut self, stiffness: f32, damping: f32) -> Self {
        self.stiffness = stiffness;
        self.damping = damping;
        self
    }

    pub fn with_root_pose(mut self, pose: Pose) -> Self {
        self.root_pose = pose;
        self
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    pub fn with_fixed_root(mut self, fixed: bool) -> Self {
        self.fixed_root = fixed;
        self
    }
}

/// Articulated body, with per-instance joint state in `(N, dof)` arrays.
#[derive(Debug, Clone)]
pub struct Articulation {
    pub name: String,
    pub limits: Vec<(f32, f32)>,
    pub stiffness: f32,
    pub damping: f32,
    pub fixed_root: bool,
    pub color: [u8; 3],
    pub link_half_size: f32,
    pub visible: bool,
    pub(crate) root_pose: Vec<Pose>,
    pub(crate) root_linear_velocity: Vec<Vec3>,
    pub(crate) root_angular_velocity: Vec<Vec3>,
    pub(crate) qpos: Array2<f32>,
    pub(crate) qvel: Array2<f32>,
    pub(crate) drive_target: Array2<f32>,
    pub(crate) drive_velocity_target: Array2<f32>,
    /// Tip position in the instance frame, refreshed by kinematics updates.
    pub(crate) tip: Vec<Vec3>,
}

impl Articulation {
    pub fn dof(&self) -> usize {
        self.limits.len()
    }

    pub fn root_pose(&self, env: usize) -> Pose {
        self.root_pose[env]
    }

    pub fn set_root_pose(&mut self, env: usize, pose: Pose) {
        self.root_pose[env] = pose;
    }

    pub fn root_linear_velocity(&self, env: usize) -> Vec3 {
        self.root_linear_velocity[env]
    }

    pub fn qpos(&self) -> ArrayView2<'_, f32> {
        self.qpos.view()
    }

    pub fn qvel(&self) -> ArrayView2<'_, f32> {
        self.qvel.view()
    }

    pub fn drive_target(&self) -> ArrayView2<'_, f32> {
        self.drive_target.view()
    }

    /// Set joint positions of one instance, clamped to the joint limits.
    pub fn set_qpos(&mut self, env: usize, qpos: &[f32]) {
        for (j, (&q, &(lo, hi))) in qpos.iter().zip(&self.limits).enumerate() {
            self.qpos[[env, j]] = q.clamp(lo, hi);
        }
    }

    pub fn set_qvel(&mut self, env: usize, qvel: &[f32]) {
        for (j, &v) in qvel.iter().enumerate().take(self.dof()) {
            self.qvel[[env, j]] = v;
        }
    }

    /// Set position drive targets of one instance, clamped to the limits.
    pub fn set_drive_target(&mut self, env: usize, target: &[f32]) {
        for (j, (&t, &(lo, hi))) in target.iter().zip(&self.limits).enumerate() {
            self.drive_target[[env, j]] = t.clamp(lo, hi);
        }
    }

    pub fn set_drive_velocity_target(&mut self, env: usize, target: &[f32]) {
        for (j, &v) in target.iter().enumerate().take(self.dof()) {
            self.drive_velocity_target[[env, j]] = v;
        }
    }

    /// Tip position in the instance frame, as of the last kinematics update.
    pub fn tip_position(&self, env: usize) -> Vec3 {
        self.tip[env]
    }

    /// Recompute tip positions from the root poses and joint positions.
    pub fn update_kinematics(&mut self) {
        for env in 0..self.root_pose.len() {
            let mut local = [0.0f32; 3];
            for (axis, slot) in local.iter_mut().enumerate().take(self.dof().min(3)) {
                *slot = self.qpos[[env, axis]];
            }
            let root = self.root_pose[env];
            let world = quat_rotate_vec(root.q, local);
            self.tip[env] = [
                root.p[0] + world[0],
                root.p[1] + world[1],
                root.p[2] + world[2],
            ];
        }
    }
}

// ============================================================================
// Lighting
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: [f32; 3],
    pub shadow: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lighting {
    pub ambient: [f32; 3],
    pub directional: Vec<DirectionalLight>,
}

impl Lighting {
    /// Ambient fill plus one key light and one overhead light.
    pub fn standard(shadow: bool) -> Self {
        Self {
            ambient: [0.3, 0.3, 0.3],
            directional: vec![
                DirectionalLight {
                    direction: [1.0, 1.0, -1.0],
                    color: [1.0, 1.0, 1.0],
                    shadow,
                },
                DirectionalLight {
                    direction: [0.0, 0.0, -1.0],
                    color: [1.0, 1.0, 1.0],
                    shadow: false,
                },
            ],
        }
    }

    /// Brightness multiplier applied to lit surfaces.
    pub fn intensity(&self) -> f32 {
        let ambient = self.ambient.iter().sum::<f32>() / 3.0;
        let direct: f32 = self
            .directional
            .iter()
            .map(|l| l.color.iter().sum::<f32>() / 3.0 * (-l.direction[2]).max(0.0).min(1.0))
            .sum();
        (ambient + 0.5 * direct).min(1.0)
    }
}

// ============================================================================
// Scene
// ============================================================================

/// Width of one actor row in a state snapshot: p(3) q(4) v(3) w(3).
pub const ACTOR_STATE_DIM: usize = 13;

/// All content of a batch.
#[derive(Debug, Clone)]
pub struct Scene {
    num_envs: usize,
    spacing: f32,
    actors: Vec<Actor>,
    articulations: Vec<Articulation>,
    lighting: Lighting,
}

impl Scene {
    pub fn new(num_envs: usize, spacing: f32) -> Self {
        Self {
            num_envs,
            spacing,
            actors: Vec::new(),
            articulations: Vec::new(),
            lighting: Lighting::default(),
        }
    }

    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Offset of instance `env` on the layout grid.
    pub fn instance_offset(&self, env: usize) -> Vec3 {
        let side = (self.num_envs as f32).sqrt().ceil().max(1.0) as usize;
        [
            (env % side) as f32 * self.spacing,
            (env / side) as f32 * self.spacing,
            0.0,
        ]
    }

    pub fn add_actor(&mut self, builder: ActorBuilder) -> ActorId {
        let n = self.num_envs;
        self.actors.push(Actor {
            name: builder.name,
            body_type: builder.body_type,
            half_size: builder.half_size,
            color: builder.color,
            visible: true,
            pose: vec![builder.initial_pose; n],
            linear_velocity: vec![[0.0; 3]; n],
            angular_velocity: vec![[0.0; 3]; n],
        });
        ActorId(self.actors.len() - 1)
    }

    pub fn add_articulation(&mut self, builder: ArticulationBuilder) -> ArticulationId {
        let n = self.num_envs;
        let dof = builder.limits.len();
        let rest: Vec<f32> = builder
            .limits
            .iter()
            .map(|&(lo, hi)| 0.0f32.clamp(lo, hi))
            .collect();
        let qpos = Array2::from_shape_fn((n, dof), |(_, j)| rest[j]);
        let mut art = Articulation {
            name: builder.name,
            limits: builder.limits,
            stiffness: builder.stiffness,
            damping: builder.damping,
            fixed_root: builder.fixed_root,
            color: builder.color,
            link_half_size: builder.link_half_size,
            visible: true,
            root_pose: vec![builder.root_pose; n],
            root_linear_velocity: vec![[0.0; 3]; n],
            root_angular_velocity: vec![[0.0; 3]; n],
            drive_target: qpos.clone(),
            qpos,
            qvel: Array2::zeros((n, dof)),
            drive_velocity_target: Array2::zeros((n, dof)),
            tip: vec![[0.0; 3]; n],
        };
        art.update_kinematics();
        self.articulations.push(art);
        ArticulationId(self.articulations.len() - 1)
    }

    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    pub fn articulations(&self) -> &[Articulation] {
        &self.articulations
    }

    pub(crate) fn actors_mut(&mut self) -> &mut [Actor] {
        &mut self.actors
    }

    pub(crate) fn articulations_mut(&mut self) -> &mut [Articulation] {
        &mut self.articulations
    }

    pub fn actor(&self, id: ActorId) -> &Actor {
        &self.actors[id.0]
    }

    pub fn actor_mut(&mut self, id: ActorId) -> &mut Actor {
        &mut self.actors[id.0]
    }

    pub fn articulation(&self, id: ArticulationId) -> &Articulation {
        &self.articulations[id.0]
    }

    pub fn articulation_mut(&mut self, id: ArticulationId) -> &mut Articulation {
        &mut self.articulations[id.0]
    }

    pub fn find_actor(&self, name: &str) -> Option<ActorId> {
        self.actors.iter().position(|a| a.name == name).map(ActorId)
    }

    pub fn lighting(&self) -> &Lighting {
        &self.lighting
    }

    pub fn set_lighting(&mut self, lighting: Lighting) {
        self.lighting = lighting;
    }

    pub fn set_visible(&mut self, object: ObjectId, visible: bool) {
        match object {
            ObjectId::Actor(id) => self.actors[id.0].visible = visible,
            ObjectId::Articulation(id) => self.articulations[id.0].visible = visible,
        }
    }

    pub fn is_visible(&self, object: ObjectId) -> bool {
        match object {
            ObjectId::Actor(id) => self.actors[id.0].visible,
            ObjectId::Articulation(id) => self.articulations[id.0].visible,
        }
    }

    pub fn update_articulation_kinematics(&mut self) {
        for art in &mut self.articulations {
            art.update_kinematics();
        }
    }

    /// Zero every velocity of non-static bodies for the given instances.
    pub fn clear_velocities(&mut self, envs: &[usize]) {
        for actor in self.actors.iter_mut().filter(|a| !a.is_static()) {
            for &env in envs {
                actor.linear_velocity[env] = [0.0; 3];
                actor.angular_velocity[env] = [0.0; 3];
            }
        }
        for art in &mut self.articulations {
            for &env in envs {
                art.root_linear_velocity[env] = [0.0; 3];
                art.root_angular_velocity[env] = [0.0; 3];
                art.qvel.row_mut(env).fill(0.0);
            }
        }
    }

    // ========================================================================
    // State snapshots
    // ========================================================================

    /// Width of one instance's snapshot row.
    pub fn state_dim(&self) -> usize {
        self.actors.len() * ACTOR_STATE_DIM
            + self
                .articulations
                .iter()
                .map(|a| ACTOR_STATE_DIM + 2 * a.dof())
                .sum::<usize>()
    }

    /// Snapshot all instances into an `(N, state_dim)` array.
    pub fn get_state(&self) -> Array2<f32> {
        let mut out = Array2::zeros((self.num_envs, self.state_dim()));
        for (env, mut row) in out.rows_mut().into_iter().enumerate() {
            let mut values = Vec::with_capacity(row.len());
            for a in &self.actors {
                push_body(&mut values, a.pose[env], a.linear_velocity[env], a.angular_velocity[env]);
            }
            for a in &self.articulations {
                push_body(
                    &mut values,
                    a.root_pose[env],
                    a.root_linear_velocity[env],
                    a.root_angular_velocity[env],
                );
                values.extend(a.qpos.row(env).iter());
                values.extend(a.qvel.row(env).iter());
            }
            for (dst, src) in row.iter_mut().zip(values) {
                *dst = src;
            }
        }
        out
    }

    /// Restore a snapshot produced by [`Scene::get_state`].
    pub fn set_state(&mut self, state: ArrayView2<'_, f32>) -> Result<()> {
        let expected = [self.num_envs, self.state_dim()];
        if state.shape() != expected {
            return Err(SimError::shape("state snapshot", &expected, state.shape()));
        }
        for (env, row) in state.rows().into_iter().enumerate() {
            let mut cursor = row.iter().copied();
            let mut take = |n: usize| -> Vec<f32> { cursor.by_ref().take(n).collect() };
            for a in &mut self.actors {
                let (pose, v, w) = read_body(&take(ACTOR_STATE_DIM));
                a.pose[env] = pose;
                a.linear_velocity[env] = v;
                a.angular_velocity[env] = w;
            }
            for a in &mut self.articulations {
                let (pose, v, w) = read_body(&take(ACTOR_STATE_DIM));
                a.root_pose[env] = pose;
                a.root_linear_velocity[env] = v;
                a.root_angular_velocity[env] = w;
                let dof = a.dof();
                let qpos = take(dof);
                let qvel = take(dof);
                a.qpos.row_mut(env).iter_mut().zip(qpos).for_each(|(d, s)| *d = s);
                a.qvel.row_mut(env).iter_mut().zip(qvel).for_each(|(d, s)| *d = s);
            }
        }
        self.update_articulation_kinematics();
        Ok(())
    }
}

fn push_body(out: &mut Vec<f32>, pose: Pose, v: Vec3, w: Vec3) {
    out.extend_from_slice(&pose.p);
    out.extend_from_slice(&pose.q);
    out.extend_from_slice(&v);
    out.extend_from_slice(&w);
}

fn read_body(s: &[f32]) -> (Pose, Vec3, Vec3) {
    (
        Pose::new([s[0], s[1], s[2]], [s[3], s[4], s[5], s[6]]),
        [s[7], s[8], s[9]],
        [s[10], s[11], s[12]],
    )
}
