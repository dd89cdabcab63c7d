//! Robot uid → constructor registry.

use indexmap::IndexMap;
use simbatch_core::{Result, SimError};

use super::{Agent, ControlMode, PointRobot};

type AgentFactory = Box<dyn Fn() -> Box<dyn Agent> + Send + Sync>;

/// Maps robot uids to agent constructors.
pub struct RobotRegistry {
    factories: IndexMap<String, AgentFactory>,
}

impl Default for RobotRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl RobotRegistry {
    /// Registry with no robots.
    pub fn empty() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Registry with the built-in robots.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(PointRobot::UID, || {
            Box::new(PointRobot::new(ControlMode::PdJointDeltaPos)) as Box<dyn Agent>
        });
        registry
    }

    /// Register (or replace) a robot constructor.
    pub fn register<F>(&mut self, uid: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Agent> + Send + Sync + 'static,
    {
        self.factories.insert(uid.into(), Box::new(factory));
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.factories.contains_key(uid)
    }

    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct a fresh agent.
    pub fn build(&self, uid: &str) -> Result<Box<dyn Agent>> {
        self.factories.get(uid).map(|f| f()).ok_or_else(|| {
            SimError::config(
                "robot_uids",
                format!(
                    "unknown robot '{}', registered: [{}]",
                    uid,
                    self.uids().collect::<Vec<_>>().join(", ")
                ),
            )
        })
    }
}
