//! Observation and action space descriptions.

use indexmap::IndexMap;
use ndarray::ArrayViewD;
use serde::{Deserialize, Serialize};

use crate::value::{DType, ObsValue};

/// Axis-aligned box of values.
///
/// `low`/`high` either hold one value broadcast over the whole shape or one
/// value per element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub low: Vec<f32>,
    pub high: Vec<f32>,
}

impl BoxSpace {
    /// Box with the same bounds on every element.
    pub fn uniform(shape: &[usize], low: f32, high: f32, dtype: DType) -> Self {
        Self {
            shape: shape.to_vec(),
            dtype,
            low: vec![low],
            high: vec![high],
        }
    }

    /// Float box with per-element bounds over a 1-D shape.
    pub fn from_bounds(low: Vec<f32>, high: Vec<f32>) -> Self {
        debug_assert_eq!(low.len(), high.len());
        Self {
            shape: vec![low.len()],
            dtype: DType::F32,
            low,
            high,
        }
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    fn bound(values: &[f32], i: usize) -> f32 {
        if values.len() == 1 {
            values[0]
        } else {
            values[i]
        }
    }

    /// Lower bound of element `i` in row-major order.
    pub fn low_at(&self, i: usize) -> f32 {
        Self::bound(&self.low, i)
    }

    /// Upper bound of element `i` in row-major order.
    pub fn high_at(&self, i: usize) -> f32 {
        Self::bound(&self.high, i)
    }

    /// Whether a float array has this shape and lies inside the bounds.
    pub fn contains(&self, value: &ArrayViewD<'_, f32>) -> bool {
        value.shape() == self.shape.as_slice()
            && value
                .iter()
                .enumerate()
                .all(|(i, &v)| v >= self.low_at(i) && v <= self.high_at(i))
    }

    fn batched(&self, n: usize) -> Self {
        let mut shape = Vec::with_capacity(self.shape.len() + 1);
        shape.push(n);
        shape.extend_from_slice(&self.shape);
        let repeat = |b: &[f32]| {
            if b.len() == 1 {
                b.to_vec()
            } else {
                b.repeat(n)
            }
        };
        Self {
            shape,
            dtype: self.dtype,
            low: repeat(&self.low),
            high: repeat(&self.high),
        }
    }
}

/// A space: either a box or a dictionary of sub-spaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Space {
    Box(BoxSpace),
    Dict(IndexMap<String, Space>),
}

impl Space {
    /// Derive a space from an observation.
    ///
    /// With `unbatched` the leading instance axis of every leaf is dropped.
    /// Float leaves are unbounded, integer leaves take their type's range.
    pub fn from_observation(obs: &ObsValue, unbatched: bool) -> Self {
        match obs {
            ObsValue::Dict(d) => Space::Dict(
                d.iter()
                    .map(|(k, v)| (k.clone(), Space::from_observation(v, unbatched)))
                    .collect(),
            ),
            leaf => {
                let full = leaf.shape().unwrap_or(&[]);
                let shape = if unbatched && !full.is_empty() {
                    &full[1..]
                } else {
                    full
                };
                let (low, high, dtype) = match leaf {
                    ObsValue::U8(_) => (0.0, 255.0, DType::U8),
                    ObsValue::I32(_) => (i32::MIN as f32, i32::MAX as f32, DType::I32),
                    ObsValue::Bool(_) => (0.0, 1.0, DType::Bool),
                    _ => (f32::NEG_INFINITY, f32::INFINITY, DType::F32),
                };
                Space::Box(BoxSpace::uniform(shape, low, high, dtype))
            }
        }
    }

    /// Stack `n` copies of a per-instance space along a new leading axis.
    pub fn batch(&self, n: usize) -> Self {
        match self {
            Space::Box(b) => Space::Box(b.batched(n)),
            Space::Dict(d) => Space::Dict(d.iter().map(|(k, v)| (k.clone(), v.batch(n))).collect()),
        }
    }

    pub fn as_box(&self) -> Option<&BoxSpace> {
        match self {
            Space::Box(b) => Some(b),
            Space::Dict(_) => None,
        }
    }

    pub fn as_dict(&self) -> Option<&IndexMap<String, Space>> {
        match self {
            Space::Dict(d) => Some(d),
            Space::Box(_) => None,
        }
    }

    /// Shape of a box space.
    pub fn shape(&self) -> Option<&[usize]> {
        self.as_box().map(|b| b.shape.as_slice())
    }
}
