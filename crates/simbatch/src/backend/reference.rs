//! Reference backend: explicit-Euler rigid bodies and PD-driven joints, with
//! a point-splat camera renderer.
//!
//! Bodies fall under gravity and rest on the z = 0 ground plane. There is no
//! contact between bodies. Joints follow the drive model
//! `qdd = kp * (target - q) + kd * (vel_target - qd)` with implicit damping.
//!
//! In batched mode instances are integrated and rendered in parallel with
//! rayon; otherwise sequentially.

use rayon::prelude::*;
use simbatch_core::{Result, SimError};

use crate::config::SimConfig;
use crate::math::{add, quat_integrate, quat_rotate_vec, rigid_inverse, scale, transform_point, Pose, Vec3};
use crate::scene::{BodyType, Scene};
use crate::sensor::{Camera, CameraFrame};

use super::PhysicsBackend;

// ============================================================================
// Native buffers
// ============================================================================

#[derive(Debug, Clone)]
struct BodyBuffer {
    kind: BodyType,
    half_size: f32,
    pose: Pose,
    v: Vec3,
    w: Vec3,
}

#[derive(Debug, Clone)]
struct JointBuffer {
    fixed_root: bool,
    root: BodyBuffer,
    limits: Vec<(f32, f32)>,
    kp: f32,
    kd: f32,
    qpos: Vec<f32>,
    qvel: Vec<f32>,
    target: Vec<f32>,
    vel_target: Vec<f32>,
    tip: Vec3,
}

impl JointBuffer {
    fn update_tip(&mut self) {
        let mut local = [0.0f32; 3];
        for (slot, &q) in local.iter_mut().zip(&self.qpos) {
            *slot = q;
        }
        self.tip = add(self.root.pose.p, quat_rotate_vec(self.root.pose.q, local));
    }
}

#[derive(Debug, Clone, Default)]
struct Instance {
    bodies: Vec<BodyBuffer>,
    joints: Vec<JointBuffer>,
}

#[derive(Debug, Clone, Copy)]
struct Integrator {
    dt: f32,
    gravity: Vec3,
    /// Fraction of sliding velocity kept per tick while on the ground.
    ground_keep: f32,
}

impl Integrator {
    fn body(&self, b: &mut BodyBuffer) {
        match b.kind {
            BodyType::Static => {}
            BodyType::Kinematic => {
                b.pose.p = add(b.pose.p, scale(b.v, self.dt));
                b.pose.q = quat_integrate(b.pose.q, b.w, self.dt);
            }
            BodyType::Dynamic => {
                b.v = add(b.v, scale(self.gravity, self.dt));
                b.pose.p = add(b.pose.p, scale(b.v, self.dt));
                b.pose.q = quat_integrate(b.pose.q, b.w, self.dt);
                if b.pose.p[2] < b.half_size {
                    b.pose.p[2] = b.half_size;
                    b.v[2] = b.v[2].max(0.0);
                    b.v[0] *= self.ground_keep;
                    b.v[1] *= self.ground_keep;
                    b.w = scale(b.w, self.ground_keep);
                }
            }
        }
    }

    fn joints(&self, j: &mut JointBuffer) {
        if !j.fixed_root {
            j.root.pose.p = add(j.root.pose.p, scale(j.root.v, self.dt));
            j.root.pose.q = quat_integrate(j.root.pose.q, j.root.w, self.dt);
        }
        let dt = self.dt;
        for k in 0..j.qpos.len() {
            let (lo, hi) = j.limits[k];
            let spring = j.kp * (j.target[k] - j.qpos[k]);
            let qd = (j.qvel[k] + dt * (spring + j.kd * j.vel_target[k])) / (1.0 + dt * j.kd);
            let q = j.qpos[k] + qd * dt;
            if q < lo || q > hi {
                j.qpos[k] = q.clamp(lo, hi);
                j.qvel[k] = 0.0;
            } else {
                j.qpos[k] = q;
                j.qvel[k] = qd;
            }
        }
        j.update_tip();
    }

    fn instance(&self, inst: &mut Instance) {
        for b in &mut inst.bodies {
            self.body(b);
        }
        for j in &mut inst.joints {
            self.joints(j);
        }
    }
}

// ============================================================================
// Render state
// ============================================================================

#[derive(Debug, Clone)]
struct Splat {
    center: Vec3,
    half_size: f32,
    color: [u8; 3],
    segment: i32,
}

struct EnvImage {
    color: Vec<u8>,
    position: Vec<f32>,
    segmentation: Vec<i32>,
}

// ============================================================================
// Backend
// ============================================================================

/// Reference [`PhysicsBackend`].
#[derive(Debug)]
pub struct EulerBackend {
    batched: bool,
    batched_initialized: bool,
    max_instances: usize,
    integrator: Option<Integrator>,
    instances: Vec<Instance>,
    layout_loaded: bool,
    splats: Vec<Vec<Splat>>,
    brightness: f32,
    ticks: u64,
}

impl Default for EulerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EulerBackend {
    pub fn new() -> Self {
        Self {
            batched: false,
            batched_initialized: false,
            max_instances: 4096,
            integrator: None,
            instances: Vec::new(),
            layout_loaded: false,
            splats: Vec::new(),
            brightness: 1.0,
            ticks: 0,
        }
    }

    /// Cap the number of instances this backend will allocate.
    pub fn with_max_instances(mut self, max: usize) -> Self {
        self.max_instances = max;
        self
    }

    pub fn is_batched(&self) -> bool {
        self.batched
    }

    /// Total physics ticks since creation.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    fn check_layout(&self, scene: &Scene) -> Result<()> {
        let ready = self.layout_loaded
            && self.instances.len() == scene.num_envs()
            && self.instances.first().map_or(true, |i| {
                i.bodies.len() == scene.actors().len() && i.joints.len() == scene.articulations().len()
            });
        if ready {
            Ok(())
        } else {
            Err(SimError::state("backend layout does not match the scene"))
        }
    }

    fn render_env(&self, env: usize, camera: &Camera, view: &crate::math::Mat4) -> EnvImage {
        let cfg = camera.config();
        let (w, h) = (cfg.width, cfg.height);
        let f = camera.focal();
        let (cx, cy) = camera.principal_point();
        let mut img = EnvImage {
            color: vec![0; h * w * 4],
            position: vec![0.0; h * w * 3],
            segmentation: vec![0; h * w],
        };
        let mut zbuf = vec![f32::INFINITY; h * w];

        for splat in self.splats.get(env).into_iter().flatten() {
            let pc = transform_point(view, splat.center);
            let depth = -pc[2];
            if depth <= cfg.near || depth >= cfg.far {
                continue;
            }
            let u = f * pc[0] / depth + cx;
            let v = cy - f * pc[1] / depth;
            let r = (f * splat.half_size / depth).max(0.5);
            let x0 = (u - r).floor().max(0.0) as usize;
            let y0 = (v - r).floor().max(0.0) as usize;
            let x1 = ((u + r).ceil().max(0.0) as usize).min(w);
            let y1 = ((v + r).ceil().max(0.0) as usize).min(h);
            for py in y0..y1 {
                for px in x0..x1 {
                    let idx = py * w + px;
                    if depth >= zbuf[idx] {
                        continue;
                    }
                    zbuf[idx] = depth;
                    for c in 0..3 {
                        img.color[idx * 4 + c] = (splat.color[c] as f32 * self.brightness) as u8;
                    }
                    img.color[idx * 4 + 3] = 255;
                    img.position[idx * 3] = (px as f32 + 0.5 - cx) * depth / f;
                    img.position[idx * 3 + 1] = (cy - (py as f32 + 0.5)) * depth / f;
                    img.position[idx * 3 + 2] = -depth;
                    img.segmentation[idx] = splat.segment;
                }
            }
        }
        img
    }
}

fn body_from(kind: BodyType, half_size: f32, pose: Pose, v: Vec3, w: Vec3) -> BodyBuffer {
    BodyBuffer {
        kind,
        half_size,
        pose,
        v,
        w,
    }
}

impl PhysicsBackend for EulerBackend {
    fn name(&self) -> &str {
        "euler"
    }

    fn create_instances(&mut self, num_envs: usize, sim: &SimConfig) -> Result<()> {
        if num_envs > self.max_instances {
            return Err(SimError::Resource(format!(
                "requested {} instances, backend limit is {}",
                num_envs, self.max_instances
            )));
        }
        let dt = sim.sim_timestep();
        self.integrator = Some(Integrator {
            dt,
            gravity: sim.gravity,
            ground_keep: sim.ground_friction.powf(dt),
        });
        self.instances = vec![Instance::default(); num_envs];
        self.splats = vec![Vec::new(); num_envs];
        self.layout_loaded = false;
        self.batched_initialized = false;
        Ok(())
    }

    fn destroy_instances(&mut self) {
        self.instances.clear();
        self.splats.clear();
        self.layout_loaded = false;
        self.batched_initialized = false;
    }

    fn load_layout(&mut self, scene: &Scene) -> Result<()> {
        if self.integrator.is_none() || self.instances.len() != scene.num_envs() {
            return Err(SimError::state("load_layout before create_instances"));
        }
        for (env, inst) in self.instances.iter_mut().enumerate() {
            inst.bodies = scene
                .actors()
                .iter()
                .map(|a| {
                    body_from(
                        a.body_type,
                        a.half_size,
                        a.pose(env),
                        a.linear_velocity(env),
                        a.angular_velocity(env),
                    )
                })
                .collect();
            inst.joints = scene
                .articulations()
                .iter()
                .map(|a| {
                    let mut j = JointBuffer {
                        fixed_root: a.fixed_root,
                        root: body_from(
                            BodyType::Kinematic,
                            a.link_half_size,
                            a.root_pose(env),
                            a.root_linear_velocity[env],
                            a.root_angular_velocity[env],
                        ),
                        limits: a.limits.clone(),
                        kp: a.stiffness,
                        kd: a.damping,
                        qpos: a.qpos.row(env).to_vec(),
                        qvel: a.qvel.row(env).to_vec(),
                        target: a.drive_target.row(env).to_vec(),
                        vel_target: a.drive_velocity_target.row(env).to_vec(),
                        tip: [0.0; 3],
                    };
                    j.update_tip();
                    j
                })
                .collect();
        }
        self.layout_loaded = true;
        Ok(())
    }

    fn enable_batched(&mut self) -> Result<()> {
        if !self.instances.is_empty() {
            return Err(SimError::state(
                "batched mode must be enabled before instances exist",
            ));
        }
        self.batched = true;
        Ok(())
    }

    fn initialize_batched(&mut self) -> Result<()> {
        if !self.batched {
            return Err(SimError::state("backend is not in batched mode"));
        }
        if !self.layout_loaded {
            return Err(SimError::state("initialize_batched before load_layout"));
        }
        self.batched_initialized = true;
        Ok(())
    }

    fn push_state(&mut self, scene: &Scene) -> Result<()> {
        self.check_layout(scene)?;
        for (env, inst) in self.instances.iter_mut().enumerate() {
            for (b, a) in inst.bodies.iter_mut().zip(scene.actors()) {
                b.pose = a.pose(env);
                b.v = a.linear_velocity(env);
                b.w = a.angular_velocity(env);
            }
            for (j, a) in inst.joints.iter_mut().zip(scene.articulations()) {
                j.root.pose = a.root_pose(env);
                j.root.v = a.root_linear_velocity[env];
                j.root.w = a.root_angular_velocity[env];
                j.qpos.copy_from_slice(&a.qpos.row(env).to_vec());
                j.qvel.copy_from_slice(&a.qvel.row(env).to_vec());
                j.update_tip();
            }
        }
        Ok(())
    }

    fn push_controls(&mut self, scene: &Scene) -> Result<()> {
        self.check_layout(scene)?;
        for (env, inst) in self.instances.iter_mut().enumerate() {
            for (j, a) in inst.joints.iter_mut().zip(scene.articulations()) {
                j.target.copy_from_slice(&a.drive_target.row(env).to_vec());
                j.vel_target
                    .copy_from_slice(&a.drive_velocity_target.row(env).to_vec());
            }
        }
        Ok(())
    }

    fn pull_state(&self, scene: &mut Scene) -> Result<()> {
        self.check_layout(scene)?;
        for (env, inst) in self.instances.iter().enumerate() {
            for (b, a) in inst.bodies.iter().zip(scene.actors_mut().iter_mut()) {
                a.pose[env] = b.pose;
                a.linear_velocity[env] = b.v;
                a.angular_velocity[env] = b.w;
            }
            for (j, a) in inst.joints.iter().zip(scene.articulations_mut().iter_mut()) {
                a.root_pose[env] = j.root.pose;
                a.root_linear_velocity[env] = j.root.v;
                a.root_angular_velocity[env] = j.root.w;
                for (k, (&q, &qd)) in j.qpos.iter().zip(&j.qvel).enumerate() {
                    a.qpos[[env, k]] = q;
                    a.qvel[[env, k]] = qd;
                }
                a.tip[env] = j.tip;
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        let integrator = self
            .integrator
            .ok_or_else(|| SimError::state("tick before create_instances"))?;
        if self.batched && !self.batched_initialized {
            return Err(SimError::state("batched tick before initialize_batched"));
        }
        if self.batched {
            self.instances
                .par_iter_mut()
                .for_each(|inst| integrator.instance(inst));
        } else {
            self.instances
                .iter_mut()
                .for_each(|inst| integrator.instance(inst));
        }
        self.ticks += 1;
        Ok(())
    }

    fn update_articulation_kinematics(&mut self) {
        for inst in &mut self.instances {
            for j in &mut inst.joints {
                j.update_tip();
            }
        }
    }

    fn update_render(&mut self, scene: &Scene) -> Result<()> {
        let num_actors = scene.actors().len() as i32;
        self.brightness = scene.lighting().intensity().max(0.2);
        self.splats = (0..scene.num_envs())
            .map(|env| {
                let actors = scene
                    .actors()
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| a.visible)
                    .map(|(i, a)| Splat {
                        center: a.pose(env).p,
                        half_size: a.half_size,
                        color: a.color,
                        segment: i as i32 + 1,
                    });
                let links = scene
                    .articulations()
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| a.visible)
                    .flat_map(|(i, a)| {
                        let segment = num_actors + i as i32 + 1;
                        [a.root_pose(env).p, a.tip_position(env)].map(|center| Splat {
                            center,
                            half_size: a.link_half_size,
                            color: a.color,
                            segment,
                        })
                    });
                actors.chain(links).collect()
            })
            .collect();
        Ok(())
    }

    fn capture(&self, camera: &Camera) -> Result<CameraFrame> {
        let n = self.splats.len();
        let (h, w) = (camera.config().height, camera.config().width);
        let view = rigid_inverse(camera.cam2world_gl());
        let images: Vec<EnvImage> = if self.batched {
            (0..n)
                .into_par_iter()
                .map(|env| self.render_env(env, camera, &view))
                .collect()
        } else {
            (0..n).map(|env| self.render_env(env, camera, &view)).collect()
        };

        let mut frame = CameraFrame::blank(n, h, w);
        for (env, img) in images.into_iter().enumerate() {
            for (dst, src) in frame
                .color
                .index_axis_mut(ndarray::Axis(0), env)
                .iter_mut()
                .zip(img.color)
            {
                *dst = src;
            }
            for (dst, src) in frame
                .position
                .index_axis_mut(ndarray::Axis(0), env)
                .iter_mut()
                .zip(img.position)
            {
                *dst = src;
            }
            for (dst, src) in frame
                .segmentation
                .index_axis_mut(ndarray::Axis(0), env)
                .iter_mut()
                .zip(img.segmentation)
            {
                *dst = src;
            }
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ActorBuilder, ArticulationBuilder};
    use crate::sensor::CameraConfig;

    fn scene(n: usize) -> Scene {
        let mut scene = Scene::new(n, 1.0);
        scene.add_actor(
            ActorBuilder::new("ball", BodyType::Dynamic)
                .with_half_size(0.05)
                .with_initial_pose(Pose::from_position([0.0, 0.0, 1.0])),
        );
        scene.add_articulation(ArticulationBuilder::new("slider", vec![(-1.0, 1.0)]));
        scene
    }

    fn backend(scene: &Scene, batched: bool) -> EulerBackend {
        let mut b = EulerBackend::new();
        if batched {
            b.enable_batched().unwrap();
        }
        b.create_instances(scene.num_envs(), &SimConfig::default()).unwrap();
        b.load_layout(scene).unwrap();
        if batched {
            b.initialize_batched().unwrap();
        }
        b
    }

    #[test]
    fn test_dynamic_body_falls_and_rests_on_ground() {
        let mut s = scene(2);
        let mut b = backend(&s, false);
        for _ in 0..500 {
            b.tick().unwrap();
        }
        b.pull_state(&mut s).unwrap();
        let p = s.actors()[0].pose(1).p;
        assert!((p[2] - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_pd_drive_reaches_target() {
        let mut s = scene(1);
        s.articulations_mut()[0].set_drive_target(0, &[0.5]);
        let mut b = backend(&s, false);
        b.push_controls(&s).unwrap();
        for _ in 0..300 {
            b.tick().unwrap();
        }
        b.pull_state(&mut s).unwrap();
        assert!((s.articulations()[0].qpos()[[0, 0]] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_batched_and_sequential_ticks_agree() {
        let mut a = scene(8);
        let mut c = scene(8);
        let mut seq = backend(&a, false);
        let mut par = backend(&c, true);
        for _ in 0..20 {
            seq.tick().unwrap();
            par.tick().unwrap();
        }
        seq.pull_state(&mut a).unwrap();
        par.pull_state(&mut c).unwrap();
        assert_eq!(a.get_state(), c.get_state());
    }

    #[test]
    fn test_batched_tick_requires_initialization() {
        let s = scene(2);
        let mut b = EulerBackend::new();
        b.enable_batched().unwrap();
        b.create_instances(2, &SimConfig::default()).unwrap();
        b.load_layout(&s).unwrap();
        assert!(b.tick().is_err());
    }

    #[test]
    fn test_instance_limit_is_resource_error() {
        let mut b = EulerBackend::new().with_max_instances(2);
        let err = b.create_instances(3, &SimConfig::default()).unwrap_err();
        assert_eq!(err.class(), simbatch_core::ErrorClass::Resource);
    }

    #[test]
    fn test_capture_sees_visible_actor_only() {
        let mut s = scene(1);
        let mut b = backend(&s, false);
        let camera = Camera::new(
            CameraConfig::new("cam", 16, 16).with_look_at([0.0, -2.0, 1.0], [0.0, 0.0, 1.0]),
        );
        b.update_render(&s).unwrap();
        let frame = b.capture(&camera).unwrap();
        assert_eq!(frame.segmentation[[0, 8, 8, 0]], 1);
        assert!(frame.position[[0, 8, 8, 2]] < 0.0);

        s.set_visible(crate::scene::ObjectId::Actor(crate::scene::ActorId(0)), false);
        b.update_render(&s).unwrap();
        let frame = b.capture(&camera).unwrap();
        assert_eq!(frame.segmentation[[0, 8, 8, 0]], 0);
    }
}
