//! Activation frames and the per-node resumption state.
//!
//! The live program is a tree: a [`Frame`] owns the [`Thread`] running its
//! body, a thread owns the state of the instruction it is suspended in, and
//! nodes such as cobegin or run own further threads and frames. Dropping any
//! node drops its whole subtree, which is how preemption and weak-branch
//! discard cancel work.

use std::sync::Arc;
use tracing::trace;

use super::ProcessorConfig;
use super::env::{Env, Scope};
use super::error::{Result, SchedulerError};
use super::ir::{ActivityDefinition, Arg, Block, Expr, Guard, Instruction, Invocation, Strength};
use super::registry::ActivityRegistry;
use super::snapshot::{ActivationSnapshot, BranchSnapshot, NodeSnapshot, ThreadSnapshot};
use super::value::Value;

/// Whether a thread or node is still alive after this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Suspended,
    Terminated,
}

/// Per-tick execution context.
pub(crate) struct Machine<'a> {
    registry: &'a ActivityRegistry,
    config: &'a ProcessorConfig,
    steps: usize,
    depth: usize,
}

impl<'a> Machine<'a> {
    pub(crate) fn new(registry: &'a ActivityRegistry, config: &'a ProcessorConfig) -> Self {
        Self {
            registry,
            config,
            steps: 0,
            depth: 0,
        }
    }

    /// Instructions entered so far in this tick.
    pub(crate) fn steps(&self) -> usize {
        self.steps
    }

    fn charge(&mut self, env: &Env) -> Result<()> {
        self.steps += 1;
        if self.steps > self.config.max_steps_per_tick {
            return Err(SchedulerError::StepBudgetExceeded {
                budget: self.config.max_steps_per_tick,
                activity: env.activity().to_string(),
            });
        }
        Ok(())
    }

    /// Run `frame`'s body with the depth counter set to the frame's depth.
    fn run_frame(&mut self, frame: &mut Frame) -> Result<Status> {
        let saved = std::mem::replace(&mut self.depth, frame.depth);
        let status = frame.body.run(&mut frame.env, self);
        self.depth = saved;
        status
    }
}

fn check(guard: &Guard, construct: &'static str, env: &mut Env) -> Result<bool> {
    let scope = Scope::new(env);
    guard(&scope).map_err(|err| SchedulerError::guard(construct, scope.activity(), err))
}

fn evaluate(expr: &Expr, env: &mut Env) -> Result<Value> {
    expr(&Scope::new(env))
}

/// Live instantiation of an activity.
pub(crate) struct Frame {
    definition: Arc<ActivityDefinition>,
    pub(crate) env: Env,
    body: Thread,
    depth: usize,
}

impl Frame {
    /// Frame whose body has not started yet.
    pub(crate) fn new(definition: Arc<ActivityDefinition>, env: Env, depth: usize) -> Self {
        let body = Thread::new(Arc::clone(&definition.body));
        Self {
            definition,
            env,
            body,
            depth,
        }
    }

    pub(crate) fn definition(&self) -> &Arc<ActivityDefinition> {
        &self.definition
    }

    /// Resume (or start) the body for one tick.
    pub(crate) fn run(&mut self, machine: &mut Machine<'_>) -> Result<Status> {
        machine.run_frame(self)
    }

    pub(crate) fn snapshot(&self) -> ActivationSnapshot {
        let (locations, locals): (Vec<String>, Vec<String>) = self
            .env
            .names()
            .map(str::to_string)
            .partition(|name| self.env.is_location(name));
        ActivationSnapshot {
            activity: self.definition.name.to_string(),
            locals,
            locations,
            body: self.body.snapshot(),
        }
    }
}

/// Continuation within one block: the next instruction and the state of the
/// instruction currently suspended, if any.
pub(crate) struct Thread {
    block: Block,
    pc: usize,
    active: Option<Box<Node>>,
}

impl Thread {
    pub(crate) fn new(block: Block) -> Self {
        Self {
            block,
            pc: 0,
            active: None,
        }
    }

    /// Resume the suspended instruction, then keep entering the following
    /// ones until something suspends or the block ends.
    pub(crate) fn run(&mut self, env: &mut Env, machine: &mut Machine<'_>) -> Result<Status> {
        if let Some(node) = self.active.as_mut() {
            if node.resume(env, machine)? == Status::Suspended {
                return Ok(Status::Suspended);
            }
            self.active = None;
            self.pc += 1;
        }

        let block = Arc::clone(&self.block);
        while let Some(instruction) = block.get(self.pc) {
            machine.charge(env)?;
            if let Some(node) = Node::enter(instruction, env, machine)? {
                self.active = Some(Box::new(node));
                return Ok(Status::Suspended);
            }
            self.pc += 1;
        }
        Ok(Status::Terminated)
    }

    fn snapshot(&self) -> ThreadSnapshot {
        ThreadSnapshot {
            pc: self.pc,
            active: self.active.as_ref().map(|node| Box::new(node.snapshot())),
        }
    }
}

struct Branch {
    strength: Strength,
    /// `None` once the branch has terminated.
    thread: Option<Thread>,
}

/// Resumption state of a suspended instruction.
enum Node {
    Await {
        guard: Guard,
    },
    Repeat {
        block: Block,
        until: Option<Guard>,
        body: Thread,
    },
    Select {
        body: Thread,
    },
    Cobegin {
        branches: Vec<Branch>,
    },
    Abort {
        when: Guard,
        body: Thread,
    },
    Run {
        frame: Box<Frame>,
        refresh: Vec<(String, Expr)>,
    },
}

impl Node {
    /// Enter `instruction` for the first time. `None` means it terminated in
    /// this same tick.
    fn enter(
        instruction: &Instruction,
        env: &mut Env,
        machine: &mut Machine<'_>,
    ) -> Result<Option<Node>> {
        match instruction {
            Instruction::Exec(effect) => {
                effect(&mut Scope::new(env))?;
                Ok(None)
            }
            // Never passes on the tick it is reached.
            Instruction::Await(guard) => Ok(Some(Node::Await {
                guard: Arc::clone(guard),
            })),
            Instruction::Repeat { body, until } => {
                let mut thread = Thread::new(Arc::clone(body));
                let status = thread.run(env, machine)?;
                let status = iterate(body, until.as_ref(), &mut thread, status, env, machine)?;
                Ok(alive(status, || Node::Repeat {
                    block: Arc::clone(body),
                    until: until.clone(),
                    body: thread,
                }))
            }
            Instruction::Select { arms, otherwise } => {
                let mut chosen = None;
                for arm in arms {
                    if check(&arm.guard, "select", env)? {
                        chosen = Some(&arm.body);
                        break;
                    }
                }
                let body = chosen.or(otherwise.as_ref()).ok_or_else(|| {
                    SchedulerError::NoMatchingAlternative(env.activity().to_string())
                })?;
                let mut thread = Thread::new(Arc::clone(body));
                let status = thread.run(env, machine)?;
                Ok(alive(status, || Node::Select { body: thread }))
            }
            Instruction::Cobegin(definitions) => {
                let mut branches: Vec<Branch> = definitions
                    .iter()
                    .map(|def| Branch {
                        strength: def.strength,
                        thread: Some(Thread::new(Arc::clone(&def.body))),
                    })
                    .collect();
                let status = step_branches(&mut branches, env, machine)?;
                Ok(alive(status, || Node::Cobegin { branches }))
            }
            Instruction::Abort { when, body } => {
                // The guard is not consulted on the entry tick.
                let mut thread = Thread::new(Arc::clone(body));
                let status = thread.run(env, machine)?;
                Ok(alive(status, || Node::Abort {
                    when: Arc::clone(when),
                    body: thread,
                }))
            }
            Instruction::Run(invocation) => {
                let (mut frame, refresh) = instantiate(invocation, env, machine)?;
                let status = frame.run(machine)?;
                if status == Status::Terminated {
                    trace!(activity = %frame.definition.name, "activation finished");
                }
                Ok(alive(status, || Node::Run {
                    frame: Box::new(frame),
                    refresh,
                }))
            }
        }
    }

    /// Advance an already suspended node by one tick.
    fn resume(&mut self, env: &mut Env, machine: &mut Machine<'_>) -> Result<Status> {
        match self {
            Node::Await { guard } => Ok(if check(guard, "await", env)? {
                Status::Terminated
            } else {
                Status::Suspended
            }),
            Node::Repeat { block, until, body } => {
                let status = body.run(env, machine)?;
                iterate(block, until.as_ref(), body, status, env, machine)
            }
            Node::Select { body } => body.run(env, machine),
            Node::Cobegin { branches } => step_branches(branches, env, machine),
            Node::Abort { when, body } => {
                if check(when, "abort", env)? {
                    trace!(activity = env.activity(), "abort region preempted");
                    return Ok(Status::Terminated);
                }
                body.run(env, machine)
            }
            Node::Run { frame, refresh } => {
                for (formal, expr) in refresh.iter() {
                    let value = evaluate(expr, env)?;
                    frame.env.write(formal, value)?;
                }
                let status = frame.run(machine)?;
                if status == Status::Terminated {
                    trace!(activity = %frame.definition.name, "activation finished");
                }
                Ok(status)
            }
        }
    }

    fn snapshot(&self) -> NodeSnapshot {
        match self {
            Node::Await { .. } => NodeSnapshot::Await,
            Node::Repeat { body, .. } => NodeSnapshot::Repeat {
                body: body.snapshot(),
            },
            Node::Select { body } => NodeSnapshot::Select {
                body: body.snapshot(),
            },
            Node::Cobegin { branches } => NodeSnapshot::Cobegin {
                branches: branches
                    .iter()
                    .map(|branch| BranchSnapshot {
                        strength: branch.strength,
                        body: branch.thread.as_ref().map(Thread::snapshot),
                    })
                    .collect(),
            },
            Node::Abort { body, .. } => NodeSnapshot::Abort {
                body: body.snapshot(),
            },
            Node::Run { frame, .. } => NodeSnapshot::Run {
                frame: frame.snapshot(),
            },
        }
    }
}

fn alive(status: Status, node: impl FnOnce() -> Node) -> Option<Node> {
    match status {
        Status::Suspended => Some(node()),
        Status::Terminated => None,
    }
}

/// Finish a loop iteration: check `until`, restart the body, and reject a
/// restarted body that terminates again without suspending.
fn iterate(
    block: &Block,
    until: Option<&Guard>,
    body: &mut Thread,
    mut status: Status,
    env: &mut Env,
    machine: &mut Machine<'_>,
) -> Result<Status> {
    let mut restarted = false;
    while status == Status::Terminated {
        if let Some(until) = until {
            if check(until, "until", env)? {
                return Ok(Status::Terminated);
            }
        }
        if restarted {
            return Err(SchedulerError::InstantaneousLoop(env.activity().to_string()));
        }
        *body = Thread::new(Arc::clone(block));
        restarted = true;
        status = body.run(env, machine)?;
    }
    Ok(Status::Suspended)
}

/// Run every live branch once in declaration order, then decide termination.
fn step_branches(
    branches: &mut [Branch],
    env: &mut Env,
    machine: &mut Machine<'_>,
) -> Result<Status> {
    for branch in branches.iter_mut() {
        if let Some(thread) = branch.thread.as_mut() {
            if thread.run(env, machine)? == Status::Terminated {
                branch.thread = None;
            }
        }
    }

    let mut strong = branches
        .iter()
        .filter(|branch| branch.strength == Strength::Strong)
        .peekable();
    if strong.peek().is_none() || strong.any(|branch| branch.thread.is_some()) {
        return Ok(Status::Suspended);
    }

    let discarded = branches
        .iter_mut()
        .filter_map(|branch| branch.thread.take())
        .count();
    if discarded > 0 {
        trace!(activity = env.activity(), discarded, "weak branches discarded");
    }
    Ok(Status::Terminated)
}

/// Create the callee frame for `invocation`, binding arguments in the caller's
/// environment.
fn instantiate(
    invocation: &Invocation,
    env: &mut Env,
    machine: &mut Machine<'_>,
) -> Result<(Frame, Vec<(String, Expr)>)> {
    let definition = machine.registry.get(&invocation.activity)?;
    if machine.depth >= machine.config.max_activation_depth {
        return Err(SchedulerError::ActivationDepthExceeded {
            limit: machine.config.max_activation_depth,
            activity: definition.name.to_string(),
        });
    }
    if definition.params.len() != invocation.args.len() {
        return Err(SchedulerError::arity(
            format!("arguments of '{}'", definition.name),
            definition.params.len(),
            invocation.args.len(),
        ));
    }
    if definition.outputs.len() != invocation.outputs.len() {
        return Err(SchedulerError::arity(
            format!("outputs of '{}'", definition.name),
            definition.outputs.len(),
            invocation.outputs.len(),
        ));
    }

    let mut callee = Env::new(Arc::clone(&definition.name));
    let mut refresh = Vec::new();
    for (formal, arg) in definition.params.iter().zip(&invocation.args) {
        match arg {
            Arg::Value(expr) => {
                callee.declare(formal.clone(), evaluate(expr, env)?);
                refresh.push((formal.clone(), Arc::clone(expr)));
            }
            Arg::Location(name) => callee.bind_location(formal.clone(), env.slot(name)?.clone()),
        }
    }
    for (formal, name) in definition.outputs.iter().zip(&invocation.outputs) {
        callee.bind_location(formal.clone(), env.slot(name)?.clone());
    }

    trace!(
        activity = %definition.name,
        caller = env.activity(),
        depth = machine.depth + 1,
        "activation created"
    );
    Ok((Frame::new(definition, callee, machine.depth + 1), refresh))
}
