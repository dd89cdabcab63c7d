//! Core value types for batched simulation environments.
//!
//! This crate provides the pieces shared between the orchestrator and its
//! collaborators (tasks, agents, backends):
//!
//! - [`ResetMask`]: packed bitmask selecting the instances a reset touches
//! - [`ObsValue`] / [`ObsDict`]: typed, nested array trees for observations
//!   and info
//! - [`Space`]: observation and action space descriptions
//! - [`SimError`]: the error taxonomy shared by every layer

pub mod error;
pub mod mask;
pub mod space;
pub mod value;

pub use error::{ErrorClass, Result, SimError};
pub use mask::ResetMask;
pub use space::{BoxSpace, Space};
pub use value::{DType, ObsDict, ObsValue};
