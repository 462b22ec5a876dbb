//! Turn-signal application built on the scheduler.
//!
//! A steering column with a three-position indicator lever, a hazard warning
//! button and a steering wheel. The lever returns to center once the wheel has
//! been turned back far enough, the indicator on the selected side flashes
//! while the lever is deflected, and the warning button toggles both
//! indicators flashing together.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::runtime::Ratio;

pub mod activities;
pub mod actuators;
pub mod host;

pub use actuators::{Actuators, Indicator, LeverVisual, WheelVisual};
pub use host::{BlinkerHost, FaultPolicy, FrameReport, HostEvent, ScriptStep, Sensors};

/// Configuration of the turn-signal application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkerConfig {
    /// Host frames (ticks) per second
    pub ticks_per_second: u32,

    /// On/off durations while the lever is deflected
    pub turning_ratio: Ratio,

    /// On/off durations in hazard warning mode
    pub warning_ratio: Ratio,

    /// Rotation delta reported per wheel step
    pub rotation_increment: i64,

    /// Accumulated opposite rotation that returns the lever to center
    pub rotation_threshold: i64,

    /// Wheel visual offset per unit of rotation
    pub wheel_offset_per_unit: f64,

    /// Lever visual angle when deflected
    pub lever_deflection: f64,
}

impl Default for BlinkerConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            turning_ratio: Ratio::new(0.4, 0.5),
            warning_ratio: Ratio::new(0.6, 0.7),
            rotation_increment: 1,
            rotation_threshold: 3,
            wheel_offset_per_unit: 5.0,
            lever_deflection: 0.1,
        }
    }
}

impl BlinkerConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Number of ticks covering `seconds`, rounded to the nearest tick.
    pub fn ticks_for(&self, seconds: f64) -> i64 {
        (f64::from(self.ticks_per_second) * seconds).round() as i64
    }
}
