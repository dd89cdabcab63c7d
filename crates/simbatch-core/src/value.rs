//! Nested, typed array trees used for observations, info and sensor buffers.
//!
//! Every leaf is a dynamically shaped [`ndarray`] array whose leading axis is
//! the instance axis while data lives inside the orchestrator. The
//! single-instance device strips that axis at the API boundary with
//! [`ObsValue::unbatch`].

use indexmap::IndexMap;
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Insertion-ordered dictionary of observation entries.
pub type ObsDict = IndexMap<String, ObsValue>;

/// Element type of a leaf array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    F32,
    U8,
    I32,
    Bool,
}

/// One node of an observation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObsValue {
    F32(ArrayD<f32>),
    U8(ArrayD<u8>),
    I32(ArrayD<i32>),
    Bool(ArrayD<bool>),
    Dict(ObsDict),
}

impl ObsValue {
    /// Empty dictionary node.
    pub fn empty() -> Self {
        Self::Dict(ObsDict::new())
    }

    /// Element type of a leaf, `None` for dictionaries.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Self::F32(_) => Some(DType::F32),
            Self::U8(_) => Some(DType::U8),
            Self::I32(_) => Some(DType::I32),
            Self::Bool(_) => Some(DType::Bool),
            Self::Dict(_) => None,
        }
    }

    /// Shape of a leaf, `None` for dictionaries.
    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            Self::F32(a) => Some(a.shape()),
            Self::U8(a) => Some(a.shape()),
            Self::I32(a) => Some(a.shape()),
            Self::Bool(a) => Some(a.shape()),
            Self::Dict(_) => None,
        }
    }

    pub fn is_dict(&self) -> bool {
        matches!(self, Self::Dict(_))
    }

    pub fn as_dict(&self) -> Option<&ObsDict> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Self::F32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&ArrayD<bool>> {
        match self {
            Self::Bool(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&ArrayD<i32>> {
        match self {
            Self::I32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&ArrayD<u8>> {
        match self {
            Self::U8(a) => Some(a),
            _ => None,
        }
    }

    /// Look up a nested entry by a `/`-separated path, e.g. `"agent/qpos"`.
    pub fn get_path(&self, path: &str) -> Option<&ObsValue> {
        let mut node = self;
        for key in path.split('/').filter(|k| !k.is_empty()) {
            node = node.as_dict()?.get(key)?;
        }
        Some(node)
    }

    /// Add a leading size-1 axis to every leaf.
    pub fn batch(self) -> Self {
        match self {
            Self::F32(a) => Self::F32(a.insert_axis(Axis(0))),
            Self::U8(a) => Self::U8(a.insert_axis(Axis(0))),
            Self::I32(a) => Self::I32(a.insert_axis(Axis(0))),
            Self::Bool(a) => Self::Bool(a.insert_axis(Axis(0))),
            Self::Dict(d) => Self::Dict(d.into_iter().map(|(k, v)| (k, v.batch())).collect()),
        }
    }

    /// Remove the leading axis from every leaf. Each leaf must have a leading
    /// axis of length exactly 1.
    pub fn unbatch(self) -> Result<Self> {
        fn strip<A>(a: ArrayD<A>) -> Result<ArrayD<A>> {
            match a.shape().first() {
                Some(1) => Ok(a.index_axis_move(Axis(0), 0)),
                _ => Err(SimError::shape("unbatch leaf", &[1], a.shape())),
            }
        }
        Ok(match self {
            Self::F32(a) => Self::F32(strip(a)?),
            Self::U8(a) => Self::U8(strip(a)?),
            Self::I32(a) => Self::I32(strip(a)?),
            Self::Bool(a) => Self::Bool(strip(a)?),
            Self::Dict(d) => Self::Dict(
                d.into_iter()
                    .map(|(k, v)| v.unbatch().map(|v| (k, v)))
                    .collect::<Result<ObsDict>>()?,
            ),
        })
    }

    /// Flatten every leaf to `(n, -1)` and concatenate them in insertion
    /// order into one `(n, D)` float buffer, where `n` is the leading axis.
    ///
    /// Non-float leaves are cast to `f32`. An empty tree yields `(n, 0)`.
    pub fn flatten_batched(&self, n: usize) -> Result<ArrayD<f32>> {
        let mut columns: Vec<Vec<f32>> = vec![Vec::new(); n];
        self.append_rows(n, &mut columns)?;
        let width = columns.first().map_or(0, Vec::len);
        let data: Vec<f32> = columns.into_iter().flatten().collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&[n, width]), data)?)
    }

    fn append_rows(&self, n: usize, rows: &mut [Vec<f32>]) -> Result<()> {
        fn push<A: Clone>(
            a: &ArrayD<A>,
            n: usize,
            rows: &mut [Vec<f32>],
            cast: impl Fn(A) -> f32,
        ) -> Result<()> {
            if a.shape().first() != Some(&n) {
                return Err(SimError::shape("flatten leaf", &[n], a.shape()));
            }
            for (row, sub) in rows.iter_mut().zip(a.outer_iter()) {
                row.extend(sub.iter().cloned().map(&cast));
            }
            Ok(())
        }
        match self {
            Self::F32(a) => push(a, n, rows, |x| x),
            Self::U8(a) => push(a, n, rows, f32::from),
            Self::I32(a) => push(a, n, rows, |x| x as f32),
            Self::Bool(a) => push(a, n, rows, |x| if x { 1.0 } else { 0.0 }),
            Self::Dict(d) => d.values().try_for_each(|v| v.append_rows(n, rows)),
        }
    }
}

impl From<ObsDict> for ObsValue {
    fn from(d: ObsDict) -> Self {
        Self::Dict(d)
    }
}

impl From<ArrayD<f32>> for ObsValue {
    fn from(a: ArrayD<f32>) -> Self {
        Self::F32(a)
    }
}

impl From<ArrayD<bool>> for ObsValue {
    fn from(a: ArrayD<bool>) -> Self {
        Self::Bool(a)
    }
}

impl From<ArrayD<i32>> for ObsValue {
    fn from(a: ArrayD<i32>) -> Self {
        Self::I32(a)
    }
}

impl From<ArrayD<u8>> for ObsValue {
    fn from(a: ArrayD<u8>) -> Self {
        Self::U8(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn sample() -> ObsValue {
        let mut agent = ObsDict::new();
        agent.insert("qpos".into(), arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn().into());
        let mut extra = ObsDict::new();
        extra.insert("flag".into(), arr1(&[true, false]).into_dyn().into());
        let mut root = ObsDict::new();
        root.insert("agent".into(), agent.into());
        root.insert("extra".into(), extra.into());
        root.into()
    }

    #[test]
    fn test_flatten_preserves_insertion_order() {
        let flat = sample().flatten_batched(2).unwrap();
        assert_eq!(flat.shape(), &[2, 3]);
        assert_eq!(flat.as_slice().unwrap(), &[1.0, 2.0, 1.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_flatten_empty_tree() {
        let flat = ObsValue::empty().flatten_batched(3).unwrap();
        assert_eq!(flat.shape(), &[3, 0]);
    }

    #[test]
    fn test_flatten_rejects_wrong_leading_axis() {
        assert!(sample().flatten_batched(3).is_err());
    }

    #[test]
    fn test_unbatch_strips_unit_axis() {
        let v = ObsValue::F32(arr2(&[[1.0f32, 2.0]]).into_dyn()).unbatch().unwrap();
        assert_eq!(v.shape(), Some(&[2usize][..]));
    }

    #[test]
    fn test_unbatch_rejects_full_batch() {
        assert!(sample().unbatch().is_err());
    }

    #[test]
    fn test_batch_then_unbatch_is_identity_on_scalars() {
        let v = ObsValue::F32(ndarray::arr0(3.5f32).into_dyn());
        let batched = v.clone().batch();
        assert_eq!(batched.shape(), Some(&[1usize][..]));
        assert_eq!(batched.unbatch().unwrap(), v);
    }

    #[test]
    fn test_get_path() {
        let v = sample();
        assert!(v.get_path("agent/qpos").is_some());
        assert!(v.get_path("agent/qvel").is_none());
    }
}
