//! Activity registry
//!
//! Maps activity names to their definitions. A registry is filled once,
//! validated, and then frozen inside an `Arc` shared by every processor built
//! from it. Invocations resolve names late, so definitions may refer to each
//! other (or to themselves) in any order.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{Result, SchedulerError};
use super::ir::{ActivityDefinition, visit_block};

/// Name-indexed set of activity definitions.
#[derive(Debug, Default)]
pub struct ActivityRegistry {
    definitions: BTreeMap<String, Arc<ActivityDefinition>>,
}

impl ActivityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition; names must be unique.
    pub fn register(&mut self, definition: ActivityDefinition) -> Result<()> {
        let name = definition.name.to_string();
        if self.definitions.contains_key(&name) {
            return Err(SchedulerError::DuplicateActivity(name));
        }
        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    /// Register several definitions.
    pub fn register_all(
        &mut self,
        definitions: impl IntoIterator<Item = ActivityDefinition>,
    ) -> Result<()> {
        for definition in definitions {
            self.register(definition)?;
        }
        Ok(())
    }

    /// Look up a definition by name.
    pub fn get(&self, name: &str) -> Result<Arc<ActivityDefinition>> {
        self.definitions
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownActivity(name.to_string()))
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Check that `entry` exists and that every invocation in every body names
    /// a registered activity with matching argument and output counts.
    pub fn validate(&self, entry: &str) -> Result<()> {
        self.get(entry)?;
        for definition in self.definitions.values() {
            let mut failure = None;
            visit_block(&definition.body, &mut |invocation| {
                if failure.is_some() {
                    return;
                }
                failure = match self.get(&invocation.activity) {
                    Err(err) => Some(err),
                    Ok(callee) if callee.params.len() != invocation.args.len() => {
                        Some(SchedulerError::arity(
                            format!("arguments of '{}' in '{}'", callee.name, definition.name),
                            callee.params.len(),
                            invocation.args.len(),
                        ))
                    }
                    Ok(callee) if callee.outputs.len() != invocation.outputs.len() => {
                        Some(SchedulerError::arity(
                            format!("outputs of '{}' in '{}'", callee.name, definition.name),
                            callee.outputs.len(),
                            invocation.outputs.len(),
                        ))
                    }
                    Ok(_) => None,
                };
            });
            if let Some(err) = failure {
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::builder::{NO_OUTPUTS, activity};
    use crate::runtime::ir::Arg;

    #[test]
    fn rejects_duplicates() {
        let mut registry = ActivityRegistry::new();
        registry.register(activity("A").body(|_| {})).unwrap();
        match registry.register(activity("A").body(|_| {})) {
            Err(SchedulerError::DuplicateActivity(name)) => assert_eq!(name, "A"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn validates_cyclic_definitions() {
        let mut registry = ActivityRegistry::new();
        registry
            .register_all([
                activity("Ping").body(|b| {
                    b.await_tick();
                    b.run("Pong", Vec::new(), NO_OUTPUTS);
                }),
                activity("Pong").body(|b| {
                    b.await_tick();
                    b.run("Ping", Vec::new(), NO_OUTPUTS);
                }),
            ])
            .unwrap();
        registry.validate("Ping").unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Ping", "Pong"]);
    }

    #[test]
    fn validation_reports_unknown_and_arity() {
        let mut registry = ActivityRegistry::new();
        registry
            .register(activity("Main").body(|b| {
                b.run("Missing", Vec::new(), NO_OUTPUTS);
            }))
            .unwrap();
        assert!(matches!(
            registry.validate("Main"),
            Err(SchedulerError::UnknownActivity(name)) if name == "Missing"
        ));
        assert!(matches!(
            registry.validate("Nope"),
            Err(SchedulerError::UnknownActivity(_))
        ));

        let mut registry = ActivityRegistry::new();
        registry
            .register_all([
                activity("Main").body(|b| {
                    b.run("Child", vec![Arg::constant(1i64)], NO_OUTPUTS);
                }),
                activity("Child").params(["a", "b"]).body(|_| {}),
            ])
            .unwrap();
        assert!(matches!(
            registry.validate("Main"),
            Err(SchedulerError::ArityMismatch { expected: 2, actual: 1, .. })
        ));
    }
}
