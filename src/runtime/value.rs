//! Tagged values stored in activation environments.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::error::{Result, SchedulerError};

/// Three-position lever (also used for the lever-move sensor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeverPos {
    /// Deflected upwards
    Up,
    /// Neutral
    #[default]
    Center,
    /// Deflected downwards
    Down,
}

impl LeverPos {
    /// Position after one upward step: down moves to center, center moves to up.
    pub fn moved_up(self) -> Self {
        match self {
            LeverPos::Down => LeverPos::Center,
            LeverPos::Center | LeverPos::Up => LeverPos::Up,
        }
    }

    /// Position after one downward step: up moves to center, center moves to down.
    pub fn moved_down(self) -> Self {
        match self {
            LeverPos::Up => LeverPos::Center,
            LeverPos::Center | LeverPos::Down => LeverPos::Down,
        }
    }
}

/// On/off duty ratio in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratio {
    /// Seconds spent on
    pub on: f64,
    /// Seconds spent off
    pub off: f64,
}

impl Ratio {
    /// Create a ratio from its on and off durations.
    pub const fn new(on: f64, off: f64) -> Self {
        Self { on, off }
    }
}

/// Opaque capability handle (actuators, sensors) passed through parameters.
///
/// Handles compare by identity.
#[derive(Clone)]
pub struct Handle(Arc<dyn Any + Send + Sync>);

impl Handle {
    /// Wrap a shared object as a handle.
    pub fn new<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        Handle(object)
    }

    /// Recover the concrete object, if the handle holds a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:p})", Arc::as_ptr(&self.0))
    }
}

/// Discriminant of a [`Value`], used in type errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    /// Signed integer
    Integer,
    /// Floating point
    Real,
    /// Boolean
    Boolean,
    /// Lever position
    Lever,
    /// Duty ratio
    Ratio,
    /// Opaque handle
    Handle,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Integer => "integer",
            ValueKind::Real => "real",
            ValueKind::Boolean => "boolean",
            ValueKind::Lever => "lever position",
            ValueKind::Ratio => "ratio",
            ValueKind::Handle => "handle",
        };
        f.write_str(name)
    }
}

/// Value stored in an environment slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer
    Integer(i64),
    /// Floating point
    Real(f64),
    /// Boolean flag
    Boolean(bool),
    /// Lever position
    Lever(LeverPos),
    /// Duty ratio
    Ratio(Ratio),
    /// Opaque capability handle
    Handle(Handle),
}

impl Value {
    /// Kind of the stored value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Real(_) => ValueKind::Real,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Lever(_) => ValueKind::Lever,
            Value::Ratio(_) => ValueKind::Ratio,
            Value::Handle(_) => ValueKind::Handle,
        }
    }

    /// Read as integer; `name` labels the error.
    pub fn as_int(&self, name: &str) -> Result<i64> {
        match self {
            Value::Integer(num) => Ok(*num),
            other => Err(mismatch(name, ValueKind::Integer, other)),
        }
    }

    /// Read as real. Integers widen.
    pub fn as_real(&self, name: &str) -> Result<f64> {
        match self {
            Value::Real(num) => Ok(*num),
            Value::Integer(num) => Ok(*num as f64),
            other => Err(mismatch(name, ValueKind::Real, other)),
        }
    }

    /// Read as boolean.
    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            Value::Boolean(flag) => Ok(*flag),
            other => Err(mismatch(name, ValueKind::Boolean, other)),
        }
    }

    /// Read as lever position.
    pub fn as_lever(&self, name: &str) -> Result<LeverPos> {
        match self {
            Value::Lever(pos) => Ok(*pos),
            other => Err(mismatch(name, ValueKind::Lever, other)),
        }
    }

    /// Read as ratio.
    pub fn as_ratio(&self, name: &str) -> Result<Ratio> {
        match self {
            Value::Ratio(ratio) => Ok(*ratio),
            other => Err(mismatch(name, ValueKind::Ratio, other)),
        }
    }

    /// Read as a handle to a concrete `T`.
    pub fn as_handle<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        match self {
            Value::Handle(handle) => {
                handle
                    .downcast::<T>()
                    .ok_or_else(|| SchedulerError::HandleMismatch {
                        name: name.to_string(),
                        expected: std::any::type_name::<T>(),
                    })
            }
            other => Err(mismatch(name, ValueKind::Handle, other)),
        }
    }
}

fn mismatch(name: &str, expected: ValueKind, found: &Value) -> SchedulerError {
    SchedulerError::TypeMismatch {
        name: name.to_string(),
        expected,
        found: found.kind(),
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<LeverPos> for Value {
    fn from(value: LeverPos) -> Self {
        Value::Lever(value)
    }
}

impl From<Ratio> for Value {
    fn from(value: Ratio) -> Self {
        Value::Ratio(value)
    }
}

impl From<Handle> for Value {
    fn from(value: Handle) -> Self {
        Value::Handle(value)
    }
}

impl<T: Any + Send + Sync> From<Arc<T>> for Value {
    fn from(value: Arc<T>) -> Self {
        Value::Handle(Handle::new(value))
    }
}
