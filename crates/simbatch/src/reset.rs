//! Reset options and the instance mask they resolve to.

use serde::{Deserialize, Serialize};
use simbatch_core::{ResetMask, Result};

/// Options accepted by `reset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetOptions {
    /// Force a full scene rebuild.
    pub reconfigure: bool,
    /// Reset only these instances. `None` resets all of them.
    pub env_idx: Option<Vec<usize>>,
}

impl ResetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconfigure(mut self, reconfigure: bool) -> Self {
        self.reconfigure = reconfigure;
        self
    }

    pub fn with_env_idx(mut self, env_idx: impl Into<Vec<usize>>) -> Self {
        self.env_idx = Some(env_idx.into());
        self
    }

    /// Mask of the instances this reset targets.
    pub fn mask(&self, num_envs: usize) -> Result<ResetMask> {
        match &self.env_idx {
            Some(idx) => ResetMask::from_indices(num_envs, idx),
            None => Ok(ResetMask::full(num_envs)),
        }
    }

    /// Whether only part of the batch is targeted.
    pub fn is_partial(&self, num_envs: usize) -> Result<bool> {
        Ok(!self.mask(num_envs)?.all())
    }
}
