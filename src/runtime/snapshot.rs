//! Serializable view of the live activation tree
//!
//! Snapshots capture the shape of the program between ticks: which activities
//! are alive, where each thread is suspended, and which branches of every
//! parallel composition are still running. Two processors fed the same inputs
//! produce equal snapshots.

use serde::{Deserialize, Serialize};

use super::ir::Strength;

/// Lifecycle state of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorStatus {
    /// Entry activity not started or still suspended
    Running,
    /// Entry activity has terminated
    Terminated,
    /// A tick failed; the processor must be reset
    Faulted,
}

/// Complete processor snapshot at a tick boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSnapshot {
    /// Number of ticks executed since creation or the last reset
    pub tick: u64,
    /// Lifecycle state
    pub status: ProcessorStatus,
    /// Root activation
    pub root: ActivationSnapshot,
}

/// One live activation frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationSnapshot {
    /// Activity name
    pub activity: String,
    /// Variables owned by the frame (including value parameters)
    pub locals: Vec<String>,
    /// Variables aliasing an ancestor's storage
    pub locations: Vec<String>,
    /// Body continuation
    pub body: ThreadSnapshot,
}

/// Continuation within a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    /// Index of the next (or suspended) instruction
    pub pc: usize,
    /// Suspended instruction state
    pub active: Option<Box<NodeSnapshot>>,
}

/// Suspended instruction state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeSnapshot {
    /// Waiting on a guard
    Await,
    /// Loop with its current iteration
    Repeat {
        /// Current iteration
        body: ThreadSnapshot,
    },
    /// Chosen alternative
    Select {
        /// Selected arm
        body: ThreadSnapshot,
    },
    /// Parallel composition
    Cobegin {
        /// Branches in declaration order
        branches: Vec<BranchSnapshot>,
    },
    /// Preemption region
    Abort {
        /// Guarded body
        body: ThreadSnapshot,
    },
    /// Running sub-activity
    Run {
        /// Callee frame
        frame: ActivationSnapshot,
    },
}

/// Branch of a parallel composition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSnapshot {
    /// Strong or weak
    pub strength: Strength,
    /// `None` once the branch has terminated
    pub body: Option<ThreadSnapshot>,
}

impl ActivationSnapshot {
    /// Names of every live activation in depth-first order, starting with this one.
    pub fn activities(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect(&mut names);
        names
    }

    fn collect(&self, names: &mut Vec<String>) {
        names.push(self.activity.clone());
        self.body.collect(names);
    }

    /// Whether an activation of `activity` is alive anywhere in this subtree.
    pub fn contains(&self, activity: &str) -> bool {
        self.activities().iter().any(|name| name == activity)
    }
}

impl ThreadSnapshot {
    fn collect(&self, names: &mut Vec<String>) {
        let Some(node) = &self.active else {
            return;
        };
        match node.as_ref() {
            NodeSnapshot::Await => {}
            NodeSnapshot::Repeat { body }
            | NodeSnapshot::Select { body }
            | NodeSnapshot::Abort { body } => body.collect(names),
            NodeSnapshot::Cobegin { branches } => {
                for branch in branches {
                    if let Some(body) = &branch.body {
                        body.collect(names);
                    }
                }
            }
            NodeSnapshot::Run { frame } => frame.collect(names),
        }
    }
}
