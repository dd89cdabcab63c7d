//! Action forms accepted by `step` and their normalization to batched
//! `(N, dim)` rows.

use indexmap::IndexMap;
use ndarray::{Array2, ArrayD, Axis};
use simbatch_core::{Result, SimError, Space};

use crate::agent::Agents;
use crate::scene::Scene;

/// One control input for the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// No control input; physics still advances.
    None,
    /// Single-agent action, either per-instance shaped or `(N, ...)`.
    Array(ArrayD<f32>),
    /// Check the action shape, switch the controller when different, then act.
    WithControlMode {
        control_mode: String,
        action: ArrayD<f32>,
    },
    /// One entry per agent key, multi-agent batches only.
    PerAgent(IndexMap<String, ArrayD<f32>>),
}

impl From<ArrayD<f32>> for Action {
    fn from(a: ArrayD<f32>) -> Self {
        Action::Array(a)
    }
}

impl From<Array2<f32>> for Action {
    fn from(a: Array2<f32>) -> Self {
        Action::Array(a.into_dyn())
    }
}

impl From<Option<ArrayD<f32>>> for Action {
    fn from(a: Option<ArrayD<f32>>) -> Self {
        a.map_or(Action::None, Action::Array)
    }
}

/// Give `action` a leading instance axis.
///
/// A per-instance shaped action is batched only when `num_envs == 1`; on a
/// larger batch it is rejected. An action already shaped `(N, ...)` is
/// returned unchanged.
pub fn batch_action(action: ArrayD<f32>, single_shape: &[usize], num_envs: usize) -> Result<ArrayD<f32>> {
    let mut batched_shape = vec![num_envs];
    batched_shape.extend_from_slice(single_shape);
    if action.shape() == batched_shape.as_slice() {
        return Ok(action);
    }
    if action.shape() == single_shape {
        if num_envs == 1 {
            return Ok(action.insert_axis(Axis(0)));
        }
        return Err(SimError::contract(
            "step",
            format!(
                "unbatched action {:?} on a batch of {} instances; expected {:?}",
                action.shape(),
                num_envs,
                batched_shape
            ),
        ));
    }
    Err(SimError::shape("action", &batched_shape, action.shape()))
}

fn rows(action: &ArrayD<f32>, num_envs: usize) -> Result<Array2<f32>> {
    let dim = action.len() / num_envs.max(1);
    Ok(action.to_shape((num_envs, dim))?.to_owned())
}

fn single_shape(space: &Space, call: &'static str) -> Result<Vec<usize>> {
    space
        .shape()
        .map(<[usize]>::to_vec)
        .ok_or_else(|| SimError::contract(call, "agent action space is not a box"))
}

/// Normalize `action` and hand it to the agent(s).
///
/// `single_space` is the per-instance action space captured after the first
/// reset. Returns the batched single-agent action for reward computation.
pub fn apply_action(
    action: Action,
    agents: &mut Agents,
    scene: &mut Scene,
    single_space: &Space,
) -> Result<Option<ArrayD<f32>>> {
    let n = scene.num_envs();
    match action {
        Action::None => Ok(None),
        Action::Array(a) => apply_single(a, agents, scene, single_space, n),
        Action::WithControlMode {
            control_mode,
            action,
        } => {
            let agent = agents.single_mut().ok_or_else(|| {
                SimError::contract("step", "control mode switch needs a single-agent batch")
            })?;
            let batched = batch_action(action, &single_shape(single_space, "step")?, n)?;
            let per_instance = rows(&batched, n)?;
            if agent.control_mode() != control_mode {
                agent.set_control_mode(scene, &control_mode)?;
            }
            agent.set_action(scene, per_instance.view())?;
            Ok(Some(batched))
        }
        Action::PerAgent(mut map) => {
            if !agents.is_multi() {
                return Err(SimError::contract(
                    "step",
                    "per-agent actions need a multi-agent batch",
                ));
            }
            let spaces = single_space
                .as_dict()
                .ok_or_else(|| SimError::contract("step", "multi-agent action space is not a dict"))?;
            for (i, agent) in agents.iter_mut().enumerate() {
                let key = Agents::key(&**agent, i);
                let entry = map
                    .shift_remove(&key)
                    .ok_or_else(|| SimError::contract("step", format!("missing action for '{}'", key)))?;
                let space = spaces
                    .get(&key)
                    .ok_or_else(|| SimError::contract("step", format!("no action space for '{}'", key)))?;
                let batched = batch_action(entry, &single_shape(space, "step")?, n)?;
                agent.set_action(scene, rows(&batched, n)?.view())?;
            }
            if let Some(extra) = map.keys().next() {
                return Err(SimError::contract(
                    "step",
                    format!("action for unknown agent '{}'", extra),
                ));
            }
            Ok(None)
        }
    }
}

fn apply_single(
    action: ArrayD<f32>,
    agents: &mut Agents,
    scene: &mut Scene,
    single_space: &Space,
    n: usize,
) -> Result<Option<ArrayD<f32>>> {
    let agent = agents
        .single_mut()
        .ok_or_else(|| SimError::contract("step", "array action on a multi-agent batch"))?;
    let batched = batch_action(action, &single_shape(single_space, "step")?, n)?;
    agent.set_action(scene, rows(&batched, n)?.view())?;
    Ok(Some(batched))
}
