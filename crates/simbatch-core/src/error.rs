//! Error types for simbatch.

use thiserror::Error;

/// Result type for simbatch operations.
pub type Result<T> = std::result::Result<T, SimError>;

/// Broad class of a [`SimError`], used by callers to decide whether the
/// batch is still usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad construction-time or reconfigure-time parameters.
    Configuration,
    /// A caller or task broke an interface contract. The batch stays usable.
    Contract,
    /// Call issued in a lifecycle state that does not permit it.
    BackendState,
    /// The physics backend could not allocate what was asked of it.
    Resource,
    /// Error raised by a task hook, passed through untouched.
    Task,
}

/// Error types that can occur while driving a simulation batch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimError {
    /// Invalid configuration (unsupported mode, bad frequency ratio, etc.)
    #[error("invalid configuration for '{param}': {message}")]
    InvalidConfig { param: String, message: String },

    /// Interface contract violated by the caller or by a task.
    #[error("contract violation in {call}: {message}")]
    Contract { call: &'static str, message: String },

    /// Shape of a caller-supplied buffer did not match what was expected.
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Operation not permitted in the current lifecycle state.
    #[error("invalid lifecycle state: {0}")]
    InvalidState(String),

    /// Backend allocation failure.
    #[error("backend resource error: {0}")]
    Resource(String),

    /// Error raised inside a task hook.
    #[error(transparent)]
    Task(Box<dyn std::error::Error + Send + Sync>),
}

impl SimError {
    /// Shorthand for [`SimError::InvalidConfig`].
    pub fn config(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`SimError::Contract`].
    pub fn contract(call: &'static str, message: impl Into<String>) -> Self {
        Self::Contract {
            call,
            message: message.into(),
        }
    }

    /// Shorthand for [`SimError::ShapeMismatch`].
    pub fn shape(what: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Shorthand for [`SimError::InvalidState`].
    pub fn state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Wrap an arbitrary task error.
    pub fn task<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Task(err.into())
    }

    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidConfig { .. } => ErrorClass::Configuration,
            Self::Contract { .. } | Self::ShapeMismatch { .. } => ErrorClass::Contract,
            Self::InvalidState(_) => ErrorClass::BackendState,
            Self::Resource(_) => ErrorClass::Resource,
            Self::Task(_) => ErrorClass::Task,
        }
    }
}

impl From<ndarray::ShapeError> for SimError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::contract("reshape", err.to_string())
    }
}
