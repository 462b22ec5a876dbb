//! Value environments: per-activation variable bindings.
//!
//! Every variable lives in a shared [`Slot`]. A location binding installs the
//! caller's slot under the callee's name, so writes through the alias land in
//! the caller's storage and the alias keeps the slot alive for as long as the
//! callee frame exists.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::{Result, SchedulerError};
use super::value::{LeverPos, Ratio, Value};

/// Shared storage cell for one variable.
#[derive(Debug, Clone)]
pub struct Slot(Arc<Mutex<Value>>);

impl Slot {
    /// Create a fresh slot holding `value`.
    pub fn new(value: Value) -> Self {
        Slot(Arc::new(Mutex::new(value)))
    }

    /// Current value.
    pub fn get(&self) -> Value {
        self.0.lock().clone()
    }

    /// Replace the stored value.
    pub fn set(&self, value: Value) {
        *self.0.lock() = value;
    }

    /// Whether both slots are the same storage cell.
    pub fn aliases(&self, other: &Slot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone)]
enum Binding {
    /// Storage owned by this environment
    Local(Slot),
    /// Alias to storage owned by an ancestor frame
    Location(Slot),
}

impl Binding {
    fn slot(&self) -> &Slot {
        match self {
            Binding::Local(slot) | Binding::Location(slot) => slot,
        }
    }
}

/// Variable bindings of one activation frame.
#[derive(Debug)]
pub struct Env {
    activity: Arc<str>,
    bindings: BTreeMap<String, Binding>,
}

impl Env {
    /// Create an empty environment for the named activity.
    pub fn new(activity: Arc<str>) -> Self {
        Self {
            activity,
            bindings: BTreeMap::new(),
        }
    }

    /// Name of the activity owning this environment.
    pub fn activity(&self) -> &str {
        &self.activity
    }

    /// Declare a local variable, shadowing any previous binding of `name`.
    pub fn declare(&mut self, name: impl Into<String>, value: Value) {
        self.bindings
            .insert(name.into(), Binding::Local(Slot::new(value)));
    }

    /// Read the current value of `name`.
    pub fn read(&self, name: &str) -> Result<Value> {
        Ok(self.slot(name)?.get())
    }

    /// Write an already bound variable (through the alias for locations).
    pub fn write(&mut self, name: &str, value: Value) -> Result<()> {
        self.slot(name)?.set(value);
        Ok(())
    }

    /// Write `name` if bound, otherwise declare it as a local.
    pub fn assign(&mut self, name: &str, value: Value) {
        match self.bindings.get(name) {
            Some(binding) => binding.slot().set(value),
            None => self.declare(name, value),
        }
    }

    /// Alias `name` to a slot owned by another environment.
    pub fn bind_location(&mut self, name: impl Into<String>, target: Slot) {
        self.bindings.insert(name.into(), Binding::Location(target));
    }

    /// Storage slot bound to `name`.
    pub fn slot(&self, name: &str) -> Result<&Slot> {
        self.bindings
            .get(name)
            .map(Binding::slot)
            .ok_or_else(|| SchedulerError::UnboundVariable {
                name: name.to_string(),
                activity: self.activity.to_string(),
            })
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Whether `name` is bound as a location alias.
    pub fn is_location(&self, name: &str) -> bool {
        matches!(self.bindings.get(name), Some(Binding::Location(_)))
    }

    /// Bound variable names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

/// View of an environment handed to effects, guards and argument expressions.
pub struct Scope<'a> {
    env: &'a mut Env,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(env: &'a mut Env) -> Self {
        Self { env }
    }

    /// Name of the activity whose variables are visible.
    pub fn activity(&self) -> &str {
        self.env.activity()
    }

    /// Read a variable.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.env.read(name)
    }

    /// Read an integer variable.
    pub fn int(&self, name: &str) -> Result<i64> {
        self.get(name)?.as_int(name)
    }

    /// Read a real variable (integers widen).
    pub fn real(&self, name: &str) -> Result<f64> {
        self.get(name)?.as_real(name)
    }

    /// Read a boolean variable.
    pub fn bool(&self, name: &str) -> Result<bool> {
        self.get(name)?.as_bool(name)
    }

    /// Read a lever position variable.
    pub fn lever(&self, name: &str) -> Result<LeverPos> {
        self.get(name)?.as_lever(name)
    }

    /// Read a ratio variable.
    pub fn ratio(&self, name: &str) -> Result<Ratio> {
        self.get(name)?.as_ratio(name)
    }

    /// Read a handle variable as a concrete `T`.
    pub fn handle<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.get(name)?.as_handle(name)
    }

    /// Write a variable, declaring a local on first assignment.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.env.assign(name, value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Env {
        Env::new(Arc::from(name))
    }

    #[test]
    fn read_before_declare_is_unbound() {
        let env = env("Main");
        match env.read("counter") {
            Err(SchedulerError::UnboundVariable { name, activity }) => {
                assert_eq!(name, "counter");
                assert_eq!(activity, "Main");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn write_requires_binding_but_assign_declares() {
        let mut env = env("Main");
        assert!(env.write("x", Value::Integer(1)).is_err());
        env.assign("x", Value::Integer(1));
        env.write("x", Value::Integer(2)).unwrap();
        assert_eq!(env.read("x").unwrap(), Value::Integer(2));
    }

    #[test]
    fn location_writes_reach_owner() {
        let mut caller = env("Caller");
        caller.declare("pos", Value::Lever(LeverPos::Center));
        let mut callee = env("Callee");
        callee.bind_location("out", caller.slot("pos").unwrap().clone());

        let mut scope = Scope::new(&mut callee);
        scope.set("out", LeverPos::Up);
        assert_eq!(scope.lever("out").unwrap(), LeverPos::Up);
        assert_eq!(caller.read("pos").unwrap(), Value::Lever(LeverPos::Up));
        assert!(callee.is_location("out"));
        assert!(!caller.is_location("pos"));
        assert!(callee.slot("out").unwrap().aliases(caller.slot("pos").unwrap()));
    }

    #[test]
    fn declare_shadows_location() {
        let mut caller = env("Caller");
        caller.declare("n", Value::Integer(1));
        let mut callee = env("Callee");
        callee.bind_location("n", caller.slot("n").unwrap().clone());
        callee.declare("n", Value::Integer(5));
        assert!(!callee.slot("n").unwrap().aliases(caller.slot("n").unwrap()));
        assert_eq!(caller.read("n").unwrap(), Value::Integer(1));
        assert_eq!(callee.read("n").unwrap(), Value::Integer(5));
    }
}
