//! Scheduler core and public API
//!
//! This module provides the `Processor` that runs a registry of activities one
//! tick at a time, together with the instruction tree, value environments and
//! configuration it is built from.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// Submodules
pub mod builder;
pub mod env;
pub mod error;
mod frame;
pub mod ir;
pub mod processor;
pub mod registry;
pub mod snapshot;
pub mod value;

pub use builder::{NO_OUTPUTS, activity};
pub use env::{Scope, Slot};
pub use error::{Result, SchedulerError};
pub use ir::{ActivityDefinition, Arg, Instruction, Strength};
pub use processor::{Processor, TickOutcome};
pub use registry::ActivityRegistry;
pub use snapshot::{ProcessorSnapshot, ProcessorStatus};
pub use value::{Handle, LeverPos, Ratio, Value, ValueKind};

/// What `tick` does once the entry activity has terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminatedPolicy {
    /// Return `TickOutcome::Idle` without running anything
    #[default]
    Idle,
    /// Fail with `SchedulerError::ProgramTerminated`
    Error,
}

/// Configuration for a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Maximum number of instructions entered during one tick
    pub max_steps_per_tick: usize,

    /// Maximum nesting of activity invocations
    pub max_activation_depth: usize,

    /// Behaviour of ticks after the entry activity terminated
    pub on_terminated: TerminatedPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_steps_per_tick: 100_000,
            max_activation_depth: 128,
            on_terminated: TerminatedPolicy::Idle,
        }
    }
}

impl ProcessorConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
