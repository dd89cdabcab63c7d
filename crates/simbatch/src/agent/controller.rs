//! PD joint controllers: map normalized actions to joint drive targets.

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;
use simbatch_core::{BoxSpace, Result, SimError};

use crate::scene::Articulation;

/// Supported joint control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Absolute joint position targets, in joint units.
    PdJointPos,
    /// Position targets relative to the current joint position, in [-1, 1].
    PdJointDeltaPos,
    /// Joint velocity targets, in [-1, 1].
    PdJointVel,
}

impl ControlMode {
    pub const ALL: [ControlMode; 3] = [
        ControlMode::PdJointPos,
        ControlMode::PdJointDeltaPos,
        ControlMode::PdJointVel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::PdJointPos => "pd_joint_pos",
            ControlMode::PdJointDeltaPos => "pd_joint_delta_pos",
            ControlMode::PdJointVel => "pd_joint_vel",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlMode {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| SimError::config("control_mode", format!("unsupported control mode '{}'", s)))
    }
}

/// Joint controller for one articulation across all instances.
#[derive(Debug, Clone)]
pub struct PdJointController {
    mode: ControlMode,
    limits: Vec<(f32, f32)>,
    /// Joint displacement per unit of delta action.
    pub delta_scale: f32,
    /// Joint speed per unit of velocity action.
    pub velocity_scale: f32,
}

impl PdJointController {
    pub fn new(mode: ControlMode, limits: Vec<(f32, f32)>) -> Self {
        Self {
            mode,
            limits,
            delta_scale: 0.1,
            velocity_scale: 1.0,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        self.mode = mode;
    }

    pub fn action_dim(&self) -> usize {
        self.limits.len()
    }

    /// Per-instance action space of the current mode.
    pub fn action_space(&self) -> BoxSpace {
        match self.mode {
            ControlMode::PdJointPos => BoxSpace::from_bounds(
                self.limits.iter().map(|l| l.0).collect(),
                self.limits.iter().map(|l| l.1).collect(),
            ),
            ControlMode::PdJointDeltaPos | ControlMode::PdJointVel => {
                let n = self.action_dim();
                BoxSpace::from_bounds(vec![-1.0; n], vec![1.0; n])
            }
        }
    }

    /// Convert one instance's action into drive targets.
    pub fn apply(&self, art: &mut Articulation, env: usize, action: ArrayView1<'_, f32>) {
        let space = self.action_space();
        let clipped: Vec<f32> = action
            .iter()
            .enumerate()
            .map(|(i, &a)| a.clamp(space.low_at(i), space.high_at(i)))
            .collect();
        let qpos = art.qpos().row(env).to_vec();
        match self.mode {
            ControlMode::PdJointPos => {
                art.set_drive_target(env, &clipped);
                art.set_drive_velocity_target(env, &vec![0.0; clipped.len()]);
            }
            ControlMode::PdJointDeltaPos => {
                let target: Vec<f32> = qpos
                    .iter()
                    .zip(&clipped)
                    .map(|(q, a)| q + a * self.delta_scale)
                    .collect();
                art.set_drive_target(env, &target);
                art.set_drive_velocity_target(env, &vec![0.0; clipped.len()]);
            }
            ControlMode::PdJointVel => {
                let vel: Vec<f32> = clipped.iter().map(|a| a * self.velocity_scale).collect();
                art.set_drive_target(env, &qpos);
                art.set_drive_velocity_target(env, &vel);
            }
        }
    }

    /// Hold the current joint positions for the given instances.
    pub fn reset(&self, art: &mut Articulation, envs: &[usize]) {
        let zeros = vec![0.0; self.action_dim()];
        for &env in envs {
            let qpos = art.qpos().row(env).to_vec();
            art.set_drive_target(env, &qpos);
            art.set_drive_velocity_target(env, &zeros);
        }
    }
}
