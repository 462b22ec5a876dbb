//! The tick-driven processor
//!
//! A `Processor` owns the root activation of an entry activity and advances the
//! whole activation tree by one logical instant per [`Processor::tick`].

use std::sync::Arc;
use tracing::{debug, warn};

use super::env::Env;
use super::error::{Result, SchedulerError};
use super::frame::{Frame, Machine, Status};
use super::ir::ActivityDefinition;
use super::registry::ActivityRegistry;
use super::snapshot::{ProcessorSnapshot, ProcessorStatus};
use super::value::Value;
use super::{ProcessorConfig, TerminatedPolicy};

/// Outcome of a successful tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The entry activity is suspended and will continue next tick
    Suspended,
    /// The entry activity terminated during this tick
    Terminated,
    /// The entry activity had already terminated; nothing ran
    Idle,
}

/// Synchronous processor for one entry activity.
pub struct Processor {
    registry: Arc<ActivityRegistry>,
    entry: Arc<ActivityDefinition>,
    config: ProcessorConfig,
    root: Frame,
    status: ProcessorStatus,
    ticks: u64,
}

impl Processor {
    /// Validate `registry` and create a processor whose root activation runs `entry`.
    pub fn new(
        registry: Arc<ActivityRegistry>,
        entry: &str,
        config: ProcessorConfig,
    ) -> Result<Self> {
        registry.validate(entry)?;
        let entry = registry.get(entry)?;
        let root = root_frame(&entry);
        debug!(entry = %entry.name, activities = registry.len(), "processor created");
        Ok(Self {
            registry,
            entry,
            config,
            root,
            status: ProcessorStatus::Running,
            ticks: 0,
        })
    }

    /// Advance every live branch by one logical step.
    ///
    /// `inputs` are bound positionally to the entry activity's parameters and
    /// the entry activity's outputs are copied into `outputs` once all
    /// branches have suspended or terminated. Output formals that the program
    /// has not bound yet start out with the value found in `outputs`.
    pub fn tick(&mut self, inputs: &[Value], outputs: &mut [Value]) -> Result<TickOutcome> {
        if inputs.len() != self.entry.params.len() {
            return Err(SchedulerError::arity(
                format!("inputs of '{}'", self.entry.name),
                self.entry.params.len(),
                inputs.len(),
            ));
        }
        if outputs.len() != self.entry.outputs.len() {
            return Err(SchedulerError::arity(
                format!("outputs of '{}'", self.entry.name),
                self.entry.outputs.len(),
                outputs.len(),
            ));
        }

        match self.status {
            ProcessorStatus::Faulted => return Err(SchedulerError::Faulted),
            ProcessorStatus::Terminated => {
                return match self.config.on_terminated {
                    TerminatedPolicy::Idle => {
                        self.copy_outputs(outputs)?;
                        Ok(TickOutcome::Idle)
                    }
                    TerminatedPolicy::Error => Err(SchedulerError::ProgramTerminated(
                        self.entry.name.to_string(),
                    )),
                };
            }
            ProcessorStatus::Running => {}
        }

        self.ticks += 1;
        match self.step(inputs, outputs) {
            Ok(outcome) => {
                if outcome == TickOutcome::Terminated {
                    self.status = ProcessorStatus::Terminated;
                    debug!(tick = self.ticks, entry = %self.entry.name, "entry activity terminated");
                }
                Ok(outcome)
            }
            Err(err) => {
                self.status = ProcessorStatus::Faulted;
                warn!(tick = self.ticks, error = %err, "tick failed");
                Err(err)
            }
        }
    }

    fn step(&mut self, inputs: &[Value], outputs: &mut [Value]) -> Result<TickOutcome> {
        let env = &mut self.root.env;
        for (formal, value) in self.entry.params.iter().zip(inputs) {
            env.assign(formal, value.clone());
        }
        for (formal, value) in self.entry.outputs.iter().zip(outputs.iter()) {
            if !env.contains(formal) {
                env.declare(formal.clone(), value.clone());
            }
        }

        let mut machine = Machine::new(&self.registry, &self.config);
        let status = self.root.run(&mut machine)?;
        debug!(tick = self.ticks, steps = machine.steps(), "tick complete");

        self.copy_outputs(outputs)?;
        Ok(match status {
            Status::Suspended => TickOutcome::Suspended,
            Status::Terminated => TickOutcome::Terminated,
        })
    }

    fn copy_outputs(&self, outputs: &mut [Value]) -> Result<()> {
        for (slot, formal) in outputs.iter_mut().zip(&self.entry.outputs) {
            *slot = self.root.env.read(formal)?;
        }
        Ok(())
    }

    /// Discard the whole activation tree and start over from the entry activity.
    pub fn reset(&mut self) {
        debug!(entry = %self.entry.name, ticks = self.ticks, "processor reset");
        self.root = root_frame(&self.entry);
        self.status = ProcessorStatus::Running;
        self.ticks = 0;
    }

    /// Lifecycle state.
    pub fn status(&self) -> ProcessorStatus {
        self.status
    }

    /// Ticks executed since creation or the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Entry activity name.
    pub fn entry(&self) -> &str {
        &self.root.definition().name
    }

    /// Shared registry.
    pub fn registry(&self) -> &Arc<ActivityRegistry> {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Read a variable of the root activation.
    pub fn read(&self, name: &str) -> Result<Value> {
        self.root.env.read(name)
    }

    /// Capture the shape of the live activation tree.
    pub fn snapshot(&self) -> ProcessorSnapshot {
        ProcessorSnapshot {
            tick: self.ticks,
            status: self.status,
            root: self.root.snapshot(),
        }
    }
}

fn root_frame(entry: &Arc<ActivityDefinition>) -> Frame {
    Frame::new(Arc::clone(entry), Env::new(Arc::clone(&entry.name)), 0)
}
