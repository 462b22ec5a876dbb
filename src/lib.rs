//! Tickwork – a synchronous reactive activity scheduler
//!
//! This crate runs trees of named, possibly recursive activities one logical
//! instant at a time:
//! - Deterministic parallel composition with strong and weak branches
//! - Preemption of whole subtrees by abort guards
//! - Multi-tick suspension through `await`
//! - Value and location parameters across nested activations
//! - A turn-signal host application exercising all of the above

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Scheduler core: instruction tree, environments, registry and processor
pub mod runtime;

/// Turn-signal application and its host adapter
pub mod blinker;

// Re-export key types for convenience
pub use runtime::{ActivityRegistry, Processor, ProcessorConfig, SchedulerError, Value};

/// Current version of the tickwork crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
