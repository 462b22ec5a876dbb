//! Error types for the tickwork scheduler
//!
//! Every failure surfaces as a single `SchedulerError` from `Processor::tick`.
//! The engine recovers nothing locally; the host decides what happens next.

use thiserror::Error;

use super::value::ValueKind;

/// Top-level scheduler error
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Positional input/output or argument count does not match the formals
    #[error("Arity mismatch for {context}: expected {expected}, got {actual}")]
    ArityMismatch {
        /// What was being bound (tick inputs, outputs, or an invocation)
        context: String,
        /// Number of formals declared
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// Invocation names an activity that is not registered
    #[error("Unknown activity '{0}'")]
    UnknownActivity(String),

    /// Two definitions registered under the same name
    #[error("Activity '{0}' is already registered")]
    DuplicateActivity(String),

    /// Variable read (or written) before it was declared or bound
    #[error("Unbound variable '{name}' in activity '{activity}'")]
    UnboundVariable {
        /// Variable name
        name: String,
        /// Activity whose environment was searched
        activity: String,
    },

    /// A value did not have the kind the reader asked for
    #[error("Type mismatch for '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Variable or expression that was read
        name: String,
        /// Kind requested by the reader
        expected: ValueKind,
        /// Kind actually stored
        found: ValueKind,
    },

    /// A handle variable refers to an object of another concrete type
    #[error("Handle '{name}' does not refer to a {expected}")]
    HandleMismatch {
        /// Variable or expression that was read
        name: String,
        /// Rust type requested by the reader
        expected: &'static str,
    },

    /// A loop body terminated without suspending in the tick it was restarted
    #[error("Instantaneous loop in activity '{0}'")]
    InstantaneousLoop(String),

    /// A tick executed more instructions than the configured budget allows
    #[error("Step budget of {budget} exceeded in activity '{activity}'")]
    StepBudgetExceeded {
        /// Configured instructions-per-tick budget
        budget: usize,
        /// Activity executing when the budget ran out
        activity: String,
    },

    /// Nested invocations went deeper than the configured limit
    #[error("Activation depth limit {limit} exceeded invoking '{activity}'")]
    ActivationDepthExceeded {
        /// Configured maximum depth
        limit: usize,
        /// Activity whose invocation crossed the limit
        activity: String,
    },

    /// An await, abort, select or until condition failed to evaluate
    #[error("Failed to evaluate {construct} guard in activity '{activity}': {source}")]
    GuardEvaluation {
        /// Construct owning the guard (await, abort, select, until)
        construct: &'static str,
        /// Activity whose body contains the guard
        activity: String,
        /// Underlying evaluation failure
        #[source]
        source: Box<SchedulerError>,
    },

    /// A select without catch-all found no true guard
    #[error("No alternative matched in activity '{0}'")]
    NoMatchingAlternative(String),

    /// Tick called after the entry activity terminated
    #[error("Program terminated: entry activity '{0}' has finished")]
    ProgramTerminated(String),

    /// Tick called after a previous tick failed and before `reset`
    #[error("Processor is faulted; reset it before ticking again")]
    Faulted,

    /// Host effect reported a failure
    #[error("Effect failed: {0}")]
    Effect(String),
}

impl SchedulerError {
    /// Build an arity mismatch error.
    pub fn arity(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        SchedulerError::ArityMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }

    /// Wrap an evaluation failure with the guard's construct and activity.
    pub(crate) fn guard(construct: &'static str, activity: &str, source: SchedulerError) -> Self {
        SchedulerError::GuardEvaluation {
            construct,
            activity: activity.to_string(),
            source: Box::new(source),
        }
    }
}

/// Result type using SchedulerError
pub type Result<T> = std::result::Result<T, SchedulerError>;
