//! Reward and termination dispatch.

use ndarray::{Array1, ArrayD, Ix1};
use simbatch_core::{ObsDict, ObsValue, Result, SimError};

use crate::config::RewardMode;
use crate::task::{RewardInput, Task};

/// Batched reward for `mode`, one entry per instance.
pub fn compute_reward<T: Task + ?Sized>(
    mode: RewardMode,
    task: &T,
    input: &RewardInput<'_>,
) -> Result<Array1<f32>> {
    let n = input.eval.scene.num_envs();
    let reward = match mode {
        RewardMode::None => Array1::zeros(n),
        RewardMode::Sparse => {
            let success = flag(input.info, "success", n)?.ok_or_else(|| {
                SimError::contract("step", "sparse reward needs `success` from evaluate()")
            })?;
            success.mapv(|s| if s { 1.0 } else { 0.0 })
        }
        RewardMode::Dense => dense(task, mode)?.compute_dense_reward(input)?,
        RewardMode::NormalizedDense => dense(task, mode)?.compute_normalized_dense_reward(input)?,
    };
    if reward.len() != n {
        return Err(SimError::shape("reward", &[n], reward.shape()));
    }
    Ok(reward)
}

fn dense<T: Task + ?Sized>(task: &T, mode: RewardMode) -> Result<&dyn crate::task::DenseReward> {
    task.dense_reward().ok_or_else(|| {
        SimError::contract(
            "step",
            format!("task '{}' has no dense reward; {} mode unavailable", task.name(), mode),
        )
    })
}

/// `(terminated, truncated)` from evaluation info.
///
/// Terminated is `success | fail` when both are present, whichever is
/// present otherwise, and all-false when neither is. Truncation is left to
/// time-limit wrappers and is always all-false here.
pub fn termination(info: &ObsDict, n: usize) -> Result<(Array1<bool>, Array1<bool>)> {
    let success = flag(info, "success", n)?;
    let fail = flag(info, "fail", n)?;
    let terminated = match (success, fail) {
        (Some(s), Some(f)) => Array1::from_shape_fn(n, |i| s[i] || f[i]),
        (Some(s), None) => s,
        (None, Some(f)) => f,
        (None, None) => Array1::from_elem(n, false),
    };
    Ok((terminated, Array1::from_elem(n, false)))
}

fn flag(info: &ObsDict, key: &str, n: usize) -> Result<Option<Array1<bool>>> {
    match info.get(key) {
        None => Ok(None),
        Some(ObsValue::Bool(a)) => to_vector(a, key, n).map(Some),
        Some(_) => Err(SimError::contract(
            "evaluate",
            format!("`{}` must be a boolean array", key),
        )),
    }
}

fn to_vector(a: &ArrayD<bool>, key: &str, n: usize) -> Result<Array1<bool>> {
    if a.shape() != [n] {
        return Err(SimError::shape(key, &[n], a.shape()));
    }
    Ok(a.clone().into_dimensionality::<Ix1>()?)
}
