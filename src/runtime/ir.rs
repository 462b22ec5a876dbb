//! Control-flow representation: the instruction tree of activity bodies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::env::Scope;
use super::error::Result;
use super::value::Value;

/// Immediate side effect run by `exec`.
pub type Effect = Arc<dyn Fn(&mut Scope<'_>) -> Result<()> + Send + Sync>;

/// Boolean condition used by await, abort, select and until.
pub type Guard = Arc<dyn Fn(&Scope<'_>) -> Result<bool> + Send + Sync>;

/// Argument expression evaluated in the caller's scope.
pub type Expr = Arc<dyn Fn(&Scope<'_>) -> Result<Value> + Send + Sync>;

/// Sequence of instructions executed in order.
pub type Block = Arc<[Instruction]>;

/// One instruction node of an activity body.
pub enum Instruction {
    /// Run an effect immediately; terminates in the same tick.
    Exec(Effect),
    /// Suspend at least one tick, then until the guard holds.
    Await(Guard),
    /// Restart `body` whenever it terminates, optionally until a condition holds.
    Repeat {
        /// Loop body
        body: Block,
        /// Checked after each iteration; true ends the loop.
        until: Option<Guard>,
    },
    /// Ordered guarded alternatives.
    Select {
        /// Arms tried in declaration order
        arms: Vec<Arm>,
        /// Catch-all body used when no guard holds
        otherwise: Option<Block>,
    },
    /// Parallel composition of strong and weak branches.
    Cobegin(Vec<BranchDef>),
    /// Preemption region: drop `body` when `when` holds on a later tick.
    Abort {
        /// Preemption guard
        when: Guard,
        /// Guarded body
        body: Block,
    },
    /// Invoke another activity by name.
    Run(Invocation),
}

impl Instruction {
    /// Short label used in logs and snapshots.
    pub fn kind(&self) -> &'static str {
        match self {
            Instruction::Exec(_) => "exec",
            Instruction::Await(_) => "await",
            Instruction::Repeat { .. } => "repeat",
            Instruction::Select { .. } => "select",
            Instruction::Cobegin(_) => "cobegin",
            Instruction::Abort { .. } => "abort",
            Instruction::Run(_) => "run",
        }
    }

    /// Visit every invocation in this instruction and its nested blocks.
    pub fn visit_invocations<'a>(&'a self, visit: &mut dyn FnMut(&'a Invocation)) {
        match self {
            Instruction::Exec(_) | Instruction::Await(_) => {}
            Instruction::Repeat { body, .. } | Instruction::Abort { body, .. } => {
                visit_block(body, visit)
            }
            Instruction::Select { arms, otherwise } => {
                for arm in arms {
                    visit_block(&arm.body, visit);
                }
                if let Some(body) = otherwise {
                    visit_block(body, visit);
                }
            }
            Instruction::Cobegin(branches) => {
                for branch in branches {
                    visit_block(&branch.body, visit);
                }
            }
            Instruction::Run(invocation) => visit(invocation),
        }
    }
}

/// Visit every invocation reachable from `block`.
pub fn visit_block<'a>(block: &'a [Instruction], visit: &mut dyn FnMut(&'a Invocation)) {
    for instruction in block {
        instruction.visit_invocations(visit);
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Repeat { body, until } => f
                .debug_struct("Repeat")
                .field("body", body)
                .field("until", &until.is_some())
                .finish(),
            Instruction::Select { arms, otherwise } => f
                .debug_struct("Select")
                .field("arms", &arms.len())
                .field("otherwise", otherwise)
                .finish(),
            Instruction::Cobegin(branches) => f.debug_tuple("Cobegin").field(branches).finish(),
            Instruction::Abort { body, .. } => f.debug_struct("Abort").field("body", body).finish(),
            Instruction::Run(invocation) => f.debug_tuple("Run").field(invocation).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// One arm of a select.
pub struct Arm {
    /// Guard that selects this arm
    pub guard: Guard,
    /// Body entered when the guard holds
    pub body: Block,
}

/// Termination discipline of a parallel branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    /// Composition waits for this branch
    Strong,
    /// Branch is discarded when all strong branches finish
    Weak,
}

/// Declared branch of a cobegin.
#[derive(Debug)]
pub struct BranchDef {
    /// Strong or weak
    pub strength: Strength,
    /// Branch body
    pub body: Block,
}

/// Actual argument of an invocation.
#[derive(Clone)]
pub enum Arg {
    /// Expression re-evaluated in the caller's scope whenever the callee resumes
    Value(Expr),
    /// Alias to a variable of the caller
    Location(String),
}

impl Arg {
    /// Pass the caller's variable `name` by value.
    pub fn var(name: impl Into<String>) -> Self {
        let name = name.into();
        Arg::Value(Arc::new(move |scope: &Scope<'_>| scope.get(&name)))
    }

    /// Pass a constant.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Arg::Value(Arc::new(move |_: &Scope<'_>| Ok(value.clone())))
    }

    /// Pass a computed value.
    pub fn expr<F>(f: F) -> Self
    where
        F: Fn(&Scope<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Arg::Value(Arc::new(f))
    }

    /// Pass the caller's variable `name` by location.
    pub fn loc(name: impl Into<String>) -> Self {
        Arg::Location(name.into())
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Value(_) => f.write_str("Value(..)"),
            Arg::Location(name) => f.debug_tuple("Location").field(name).finish(),
        }
    }
}

/// Sub-activity invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Name of the invoked activity, resolved when the node is reached
    pub activity: String,
    /// Actual arguments bound positionally to the formal parameters
    pub args: Vec<Arg>,
    /// Caller variables aliased positionally by the formal outputs
    pub outputs: Vec<String>,
}

/// Named activity definition.
#[derive(Debug)]
pub struct ActivityDefinition {
    /// Activity name
    pub name: Arc<str>,
    /// Formal parameter names
    pub params: Vec<String>,
    /// Formal output names
    pub outputs: Vec<String>,
    /// Body instructions
    pub body: Block,
}
