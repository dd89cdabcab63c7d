//! Packed per-instance bitmask selecting which instances a reset touches.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Bitmask over the instances of a batch.
///
/// Each bit represents one instance (1 = reset, 0 = keep).
/// Uses u64 chunks so membership checks and iteration stay cheap for large
/// batches.
///
/// # Example
///
/// ```rust
/// use simbatch_core::ResetMask;
///
/// let mask = ResetMask::from_indices(4, &[1, 3]).unwrap();
/// assert_eq!(mask.iter_set().collect::<Vec<_>>(), vec![1, 3]);
/// assert!(!mask.is_set(0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetMask {
    /// Packed bitmask chunks (64 instances per u64)
    chunks: Vec<u64>,
    /// Total number of instances
    num_envs: usize,
}

impl ResetMask {
    /// Create an empty mask (no instance selected).
    pub fn new(num_envs: usize) -> Self {
        let num_chunks = (num_envs + 63) / 64;
        Self {
            chunks: vec![0u64; num_chunks],
            num_envs,
        }
    }

    /// Create a mask selecting every instance.
    pub fn full(num_envs: usize) -> Self {
        let mut mask = Self::new(num_envs);
        for (i, chunk) in mask.chunks.iter_mut().enumerate() {
            let bits = (num_envs - i * 64).min(64);
            *chunk = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        }
        mask
    }

    /// Create a mask from an explicit list of instance indices.
    ///
    /// Duplicates collapse. An empty list is a valid, empty mask.
    pub fn from_indices(num_envs: usize, indices: &[usize]) -> Result<Self> {
        let mut mask = Self::new(num_envs);
        for &idx in indices {
            if idx >= num_envs {
                return Err(SimError::contract(
                    "reset",
                    format!("env index {} out of range for {} instances", idx, num_envs),
                ));
            }
            mask.set(idx);
        }
        Ok(mask)
    }

    /// Check if any instance is selected.
    #[inline]
    pub fn any(&self) -> bool {
        self.chunks.iter().any(|&c| c != 0)
    }

    /// Check whether every instance is selected.
    pub fn all(&self) -> bool {
        self.count() == self.num_envs
    }

    /// Count how many instances are selected.
    pub fn count(&self) -> usize {
        self.chunks.iter().map(|c| c.count_ones() as usize).sum()
    }

    /// Get the number of instances this mask covers.
    #[inline]
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Select a specific instance.
    #[inline]
    pub fn set(&mut self, env_idx: usize) {
        debug_assert!(env_idx < self.num_envs);
        self.chunks[env_idx / 64] |= 1u64 << (env_idx % 64);
    }

    /// Deselect a specific instance.
    #[inline]
    pub fn clear(&mut self, env_idx: usize) {
        debug_assert!(env_idx < self.num_envs);
        self.chunks[env_idx / 64] &= !(1u64 << (env_idx % 64));
    }

    /// Check if a specific instance is selected.
    #[inline]
    pub fn is_set(&self, env_idx: usize) -> bool {
        env_idx < self.num_envs && (self.chunks[env_idx / 64] >> (env_idx % 64)) & 1 != 0
    }

    /// Iterate over selected instance indices in ascending order.
    ///
    /// Uses `trailing_zeros()` so iteration is O(k) in the number of set bits.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        let last = self.chunks.len().saturating_sub(1);
        self.chunks.iter().enumerate().flat_map(move |(chunk_idx, &chunk)| {
            let base = chunk_idx * 64;
            let max_bit = if chunk_idx == last {
                self.num_envs - base
            } else {
                64
            };
            BitIter::new(chunk, max_bit).map(move |bit| base + bit)
        })
    }

    /// Selected indices collected into a vector.
    pub fn indices(&self) -> Vec<usize> {
        self.iter_set().collect()
    }

    /// Expand into one bool per instance.
    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.num_envs).map(|i| self.is_set(i)).collect()
    }
}

/// Iterates set bits of one chunk, lowest first.
struct BitIter {
    remaining: u64,
    max_bit: usize,
}

impl BitIter {
    fn new(bits: u64, max_bit: usize) -> Self {
        Self {
            remaining: bits,
            max_bit,
        }
    }
}

impl Iterator for BitIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let bit = self.remaining.trailing_zeros() as usize;
        if bit >= self.max_bit {
            self.remaining = 0;
            None
        } else {
            self.remaining &= self.remaining - 1; // clear lowest set bit
            Some(bit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_mask_covers_partial_chunk() {
        let mask = ResetMask::full(70);
        assert_eq!(mask.count(), 70);
        assert!(mask.all());
        assert_eq!(mask.iter_set().last(), Some(69));
    }

    #[test]
    fn test_full_mask_exact_chunk() {
        let mask = ResetMask::full(64);
        assert_eq!(mask.count(), 64);
    }

    #[test]
    fn test_empty_indices_is_legal() {
        let mask = ResetMask::from_indices(4, &[]).unwrap();
        assert!(!mask.any());
        assert_eq!(mask.iter_set().count(), 0);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        assert!(ResetMask::from_indices(4, &[4]).is_err());
    }

    #[test]
    fn test_duplicates_collapse() {
        let mask = ResetMask::from_indices(8, &[3, 3, 1]).unwrap();
        assert_eq!(mask.indices(), vec![1, 3]);
    }

    #[test]
    fn test_set_and_clear() {
        let mut mask = ResetMask::new(130);
        mask.set(129);
        mask.set(0);
        assert!(mask.is_set(129));
        mask.clear(0);
        assert_eq!(mask.to_bools().iter().filter(|b| **b).count(), 1);
    }

    #[test]
    fn test_zero_envs() {
        let mask = ResetMask::full(0);
        assert_eq!(mask.iter_set().count(), 0);
        assert!(mask.all());
    }

    proptest! {
        #[test]
        fn test_iter_set_matches_indices(
            num_envs in 1usize..300,
            raw in prop::collection::vec(0usize..300, 0..40),
        ) {
            let indices: Vec<usize> = raw.into_iter().filter(|i| *i < num_envs).collect();
            let mask = ResetMask::from_indices(num_envs, &indices).unwrap();

            let mut expected = indices.clone();
            expected.sort_unstable();
            expected.dedup();

            prop_assert_eq!(mask.indices(), expected.clone());
            prop_assert_eq!(mask.count(), expected.len());
            for i in 0..num_envs {
                prop_assert_eq!(mask.is_set(i), expected.contains(&i));
            }
        }
    }
}
