//! Builders that assemble activity bodies into the instruction tree.
//!
//! ```
//! use tickwork::runtime::builder::activity;
//!
//! let delay = activity("DelayTicks")
//!     .params(["ticks"])
//!     .body(|b| {
//!         b.exec(|s| {
//!             let ticks = s.int("ticks")?;
//!             s.set("counter", ticks);
//!             Ok(())
//!         });
//!         b.repeat_until(
//!             |b| {
//!                 b.exec(|s| {
//!                     let counter = s.int("counter")?;
//!                     s.set("counter", counter - 1);
//!                     Ok(())
//!                 });
//!                 b.await_tick();
//!             },
//!             |s| Ok(s.int("counter")? <= 0),
//!         );
//!     });
//! assert_eq!(&*delay.name, "DelayTicks");
//! ```

use std::sync::Arc;

use super::env::Scope;
use super::error::Result;
use super::ir::{
    ActivityDefinition, Arg, Arm, Block, BranchDef, Guard, Instruction, Invocation, Strength,
};

/// Empty output list for invocations without output locations.
pub const NO_OUTPUTS: [&str; 0] = [];

/// Start building an activity definition.
pub fn activity(name: impl Into<String>) -> ActivityBuilder {
    ActivityBuilder {
        name: name.into(),
        params: Vec::new(),
        outputs: Vec::new(),
    }
}

/// Builder for an [`ActivityDefinition`] header.
#[derive(Debug)]
pub struct ActivityBuilder {
    name: String,
    params: Vec<String>,
    outputs: Vec<String>,
}

impl ActivityBuilder {
    /// Declare the formal parameters.
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Declare the formal outputs.
    pub fn outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = names.into_iter().map(Into::into).collect();
        self
    }

    /// Build the body and finish the definition.
    pub fn body(self, build: impl FnOnce(&mut BlockBuilder)) -> ActivityDefinition {
        ActivityDefinition {
            name: Arc::from(self.name),
            params: self.params,
            outputs: self.outputs,
            body: block(build),
        }
    }
}

/// Build a standalone block.
pub fn block(build: impl FnOnce(&mut BlockBuilder)) -> Block {
    let mut builder = BlockBuilder::default();
    build(&mut builder);
    builder.finish()
}

fn guard<G>(g: G) -> Guard
where
    G: Fn(&Scope<'_>) -> Result<bool> + Send + Sync + 'static,
{
    Arc::new(g)
}

/// Accumulates the instructions of one block.
#[derive(Debug, Default)]
pub struct BlockBuilder {
    instructions: Vec<Instruction>,
}

impl BlockBuilder {
    /// Append a raw instruction.
    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    /// Run an effect immediately.
    pub fn exec<F>(&mut self, effect: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.push(Instruction::Exec(Arc::new(effect)))
    }

    /// Suspend, then continue on the first later tick where `condition` holds.
    pub fn await_until<G>(&mut self, condition: G) -> &mut Self
    where
        G: Fn(&Scope<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.push(Instruction::Await(guard(condition)))
    }

    /// Suspend for exactly one tick.
    pub fn await_tick(&mut self) -> &mut Self {
        self.await_until(|_| Ok(true))
    }

    /// Loop forever (until preempted).
    pub fn repeat(&mut self, body: impl FnOnce(&mut BlockBuilder)) -> &mut Self {
        self.push(Instruction::Repeat {
            body: block(body),
            until: None,
        })
    }

    /// Loop until `until` holds after an iteration.
    pub fn repeat_until<G>(&mut self, body: impl FnOnce(&mut BlockBuilder), until: G) -> &mut Self
    where
        G: Fn(&Scope<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.push(Instruction::Repeat {
            body: block(body),
            until: Some(guard(until)),
        })
    }

    /// Run `effect` once per tick, forever.
    pub fn always<F>(&mut self, effect: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.repeat(move |b| {
            b.exec(effect);
            b.await_tick();
        })
    }

    /// Ordered guarded alternatives.
    pub fn select(&mut self, build: impl FnOnce(&mut SelectBuilder)) -> &mut Self {
        let mut select = SelectBuilder::default();
        build(&mut select);
        self.push(Instruction::Select {
            arms: select.arms,
            otherwise: select.otherwise,
        })
    }

    /// Enter `then` when `condition` holds, otherwise do nothing.
    pub fn if_then<G>(&mut self, condition: G, then: impl FnOnce(&mut BlockBuilder)) -> &mut Self
    where
        G: Fn(&Scope<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.select(|s| {
            s.when(condition, then).otherwise(|_| {});
        })
    }

    /// Enter `then` when `condition` holds, `otherwise` when it does not.
    pub fn if_then_else<G>(
        &mut self,
        condition: G,
        then: impl FnOnce(&mut BlockBuilder),
        otherwise: impl FnOnce(&mut BlockBuilder),
    ) -> &mut Self
    where
        G: Fn(&Scope<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.select(|s| {
            s.when(condition, then).otherwise(otherwise);
        })
    }

    /// Parallel composition.
    pub fn cobegin(&mut self, build: impl FnOnce(&mut CobeginBuilder)) -> &mut Self {
        let mut cobegin = CobeginBuilder::default();
        build(&mut cobegin);
        self.push(Instruction::Cobegin(cobegin.branches))
    }

    /// Preempt `body` on the first later tick where `condition` holds.
    pub fn abort_when<G>(&mut self, condition: G, body: impl FnOnce(&mut BlockBuilder)) -> &mut Self
    where
        G: Fn(&Scope<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.push(Instruction::Abort {
            when: guard(condition),
            body: block(body),
        })
    }

    /// Invoke an activity with positional arguments and output locations.
    pub fn run<I, S>(&mut self, activity: impl Into<String>, args: Vec<Arg>, outputs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Instruction::Run(Invocation {
            activity: activity.into(),
            args,
            outputs: outputs.into_iter().map(Into::into).collect(),
        }))
    }

    fn finish(self) -> Block {
        Arc::from(self.instructions)
    }
}

/// Collects the arms of a select.
#[derive(Default)]
pub struct SelectBuilder {
    arms: Vec<Arm>,
    otherwise: Option<Block>,
}

impl SelectBuilder {
    /// Add an arm entered when `condition` holds.
    pub fn when<G>(&mut self, condition: G, body: impl FnOnce(&mut BlockBuilder)) -> &mut Self
    where
        G: Fn(&Scope<'_>) -> Result<bool> + Send + Sync + 'static,
    {
        self.arms.push(Arm {
            guard: guard(condition),
            body: block(body),
        });
        self
    }

    /// Catch-all arm.
    pub fn otherwise(&mut self, body: impl FnOnce(&mut BlockBuilder)) -> &mut Self {
        self.otherwise = Some(block(body));
        self
    }
}

/// Collects the branches of a cobegin.
#[derive(Debug, Default)]
pub struct CobeginBuilder {
    branches: Vec<BranchDef>,
}

impl CobeginBuilder {
    /// Add a strong branch.
    pub fn strong(&mut self, body: impl FnOnce(&mut BlockBuilder)) -> &mut Self {
        self.branch(Strength::Strong, body)
    }

    /// Add a weak branch.
    pub fn weak(&mut self, body: impl FnOnce(&mut BlockBuilder)) -> &mut Self {
        self.branch(Strength::Weak, body)
    }

    fn branch(&mut self, strength: Strength, body: impl FnOnce(&mut BlockBuilder)) -> &mut Self {
        self.branches.push(BranchDef {
            strength,
            body: block(body),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_instruction_tree() {
        let def = activity("Main")
            .params(["a"])
            .outputs(["b"])
            .body(|b| {
                b.exec(|_| Ok(()));
                b.cobegin(|c| {
                    c.strong(|b| {
                        b.run("Child", vec![Arg::var("a")], ["b"]);
                    })
                    .weak(|b| {
                        b.always(|_| Ok(()));
                    });
                });
                b.if_then(|_| Ok(true), |b| {
                    b.await_tick();
                });
            });

        assert_eq!(def.params, vec!["a".to_string()]);
        assert_eq!(def.outputs, vec!["b".to_string()]);
        let kinds: Vec<_> = def.body.iter().map(Instruction::kind).collect();
        assert_eq!(kinds, vec!["exec", "cobegin", "select"]);

        match &def.body[1] {
            Instruction::Cobegin(branches) => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].strength, Strength::Strong);
                assert_eq!(branches[1].strength, Strength::Weak);
            }
            other => panic!("expected cobegin, got {:?}", other),
        }
        match &def.body[2] {
            Instruction::Select { arms, otherwise } => {
                assert_eq!(arms.len(), 1);
                assert!(otherwise.as_ref().is_some_and(|body| body.is_empty()));
            }
            other => panic!("expected select, got {:?}", other),
        }
    }

    #[test]
    fn collects_invocations() {
        let def = activity("Main").body(|b| {
            b.run("A", Vec::new(), NO_OUTPUTS);
            b.repeat(|b| {
                b.abort_when(|_| Ok(false), |b| {
                    b.run("B", Vec::new(), NO_OUTPUTS);
                });
            });
        });
        let mut names = Vec::new();
        crate::runtime::ir::visit_block(&def.body, &mut |inv| names.push(inv.activity.clone()));
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
    }
}
