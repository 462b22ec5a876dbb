//! Actuator objects driven by `exec` effects.
//!
//! Each actuator is shared between the host (which renders it) and the
//! program (which reaches it through a handle parameter).

use parking_lot::Mutex;
use std::sync::Arc;

use crate::runtime::Value;

/// Indicator lamp.
#[derive(Debug, Default)]
pub struct Indicator {
    lit: Mutex<bool>,
}

impl Indicator {
    /// Switch the lamp on or off.
    pub fn set_illuminated(&self, on: bool) {
        *self.lit.lock() = on;
    }

    /// Whether the lamp is on.
    pub fn is_lit(&self) -> bool {
        *self.lit.lock()
    }
}

/// Lever visual; the angle follows the lever position.
#[derive(Debug, Default)]
pub struct LeverVisual {
    angle: Mutex<f64>,
}

impl LeverVisual {
    /// Set the deflection angle.
    pub fn set_deflection(&self, angle: f64) {
        *self.angle.lock() = angle;
    }

    /// Current deflection angle.
    pub fn deflection(&self) -> f64 {
        *self.angle.lock()
    }
}

/// Steering wheel visual; moves sideways as the wheel turns.
#[derive(Debug, Default)]
pub struct WheelVisual {
    offset: Mutex<f64>,
}

impl WheelVisual {
    /// Move the wheel by `delta`.
    pub fn shift(&self, delta: f64) {
        *self.offset.lock() += delta;
    }

    /// Accumulated offset.
    pub fn offset(&self) -> f64 {
        *self.offset.lock()
    }
}

/// The actuator set of one steering column.
#[derive(Debug, Clone, Default)]
pub struct Actuators {
    /// Left indicator lamp
    pub left: Arc<Indicator>,
    /// Right indicator lamp
    pub right: Arc<Indicator>,
    /// Lever visual
    pub lever: Arc<LeverVisual>,
    /// Wheel visual
    pub wheel: Arc<WheelVisual>,
}

impl Actuators {
    /// Handles in entry-parameter order: left, right, lever, wheel.
    pub fn handles(&self) -> [Value; 4] {
        [
            Value::from(Arc::clone(&self.left)),
            Value::from(Arc::clone(&self.right)),
            Value::from(Arc::clone(&self.lever)),
            Value::from(Arc::clone(&self.wheel)),
        ]
    }
}
