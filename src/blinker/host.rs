//! Host adapter: samples sensors, drives one tick per frame, resets edges.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::runtime::{LeverPos, Processor, ProcessorConfig, ProcessorStatus, Result, Value};

use super::BlinkerConfig;
use super::activities::{self, MAIN};
use super::actuators::Actuators;

/// What the host does after a failed tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Leave the processor faulted; every later frame fails
    #[default]
    Halt,
    /// Reset the processor so the next frame starts the program over
    Restart,
}

/// Sensor values sampled for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sensors {
    /// Requested lever move (center means none)
    pub lever_move: LeverPos,
    /// Warning button pressed since the last frame
    pub warning_pushed: bool,
    /// Wheel rotation since the last frame
    pub rotation: i64,
}

impl Sensors {
    /// Return edge-triggered inputs to their neutral values.
    pub fn reset_edges(&mut self) {
        *self = Sensors::default();
    }
}

/// Input event delivered by the host between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostEvent {
    /// Push the lever up one step
    LeverUp,
    /// Push the lever down one step
    LeverDown,
    /// Press the hazard warning button
    Warning,
    /// Turn the wheel counter-clockwise by one increment
    RotateCounterClockwise,
    /// Turn the wheel clockwise by one increment
    RotateClockwise,
}

/// One step of a scripted session: events applied before the first of
/// `frames` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Events applied before the first frame
    #[serde(default)]
    pub events: Vec<HostEvent>,
    /// Number of frames to run
    #[serde(default = "default_frames")]
    pub frames: u32,
}

fn default_frames() -> u32 {
    1
}

/// Actuator state after a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Tick number since the program (re)started
    pub tick: u64,
    /// Left indicator lit
    pub left_lit: bool,
    /// Right indicator lit
    pub right_lit: bool,
    /// Lever position output by the program
    pub lever_pos: LeverPos,
    /// Lever visual angle
    pub lever_angle: f64,
    /// Wheel visual offset
    pub wheel_offset: f64,
}

/// Turn-signal host.
pub struct BlinkerHost {
    config: BlinkerConfig,
    processor: Processor,
    actuators: Actuators,
    sensors: Sensors,
    outputs: [Value; 1],
    policy: FaultPolicy,
}

impl BlinkerHost {
    /// Build the program and a processor with default settings.
    pub fn new(config: BlinkerConfig) -> Result<Self> {
        Self::with_processor_config(config, ProcessorConfig::default())
    }

    /// Build the program with explicit processor settings.
    pub fn with_processor_config(
        config: BlinkerConfig,
        processor_config: ProcessorConfig,
    ) -> Result<Self> {
        let registry = Arc::new(activities::registry(&config)?);
        let processor = Processor::new(registry, MAIN, processor_config)?;
        Ok(Self {
            config,
            processor,
            actuators: Actuators::default(),
            sensors: Sensors::default(),
            outputs: [Value::Lever(LeverPos::Center)],
            policy: FaultPolicy::default(),
        })
    }

    /// Choose what happens after a failed frame.
    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Record an input event for the next frame.
    pub fn apply(&mut self, event: HostEvent) {
        match event {
            HostEvent::LeverUp => self.sensors.lever_move = LeverPos::Up,
            HostEvent::LeverDown => self.sensors.lever_move = LeverPos::Down,
            HostEvent::Warning => self.sensors.warning_pushed = true,
            HostEvent::RotateCounterClockwise => {
                self.sensors.rotation = self.config.rotation_increment
            }
            HostEvent::RotateClockwise => self.sensors.rotation = -self.config.rotation_increment,
        }
    }

    /// Run one tick with the sampled sensors, then reset the edge inputs.
    pub fn update(&mut self) -> Result<FrameReport> {
        let [left, right, lever, wheel] = self.actuators.handles();
        let inputs = [
            Value::Lever(self.sensors.lever_move),
            Value::Boolean(self.sensors.warning_pushed),
            Value::Integer(self.sensors.rotation),
            left,
            right,
            lever,
            wheel,
        ];
        let result = self.processor.tick(&inputs, &mut self.outputs);
        self.sensors.reset_edges();

        match result {
            Ok(_) => self.report(),
            Err(err) => {
                if self.policy == FaultPolicy::Restart
                    && self.processor.status() == ProcessorStatus::Faulted
                {
                    warn!(error = %err, "restarting turn-signal program");
                    self.processor.reset();
                    self.outputs = [Value::Lever(LeverPos::Center)];
                }
                Err(err)
            }
        }
    }

    /// Run `frames` frames, applying `events` before the first one.
    pub fn run_step(&mut self, step: &ScriptStep) -> Result<Vec<FrameReport>> {
        for event in &step.events {
            self.apply(*event);
        }
        (0..step.frames).map(|_| self.update()).collect()
    }

    /// Actuator state after the most recent frame.
    pub fn report(&self) -> Result<FrameReport> {
        Ok(FrameReport {
            tick: self.processor.ticks(),
            left_lit: self.actuators.left.is_lit(),
            right_lit: self.actuators.right.is_lit(),
            lever_pos: self.lever_pos()?,
            lever_angle: self.actuators.lever.deflection(),
            wheel_offset: self.actuators.wheel.offset(),
        })
    }

    /// Lever position output by the program.
    pub fn lever_pos(&self) -> Result<LeverPos> {
        self.outputs[0].as_lever(activities::MAIN_OUTPUTS[0])
    }

    /// Pending sensor values.
    pub fn sensors(&self) -> &Sensors {
        &self.sensors
    }

    /// Actuators driven by the program.
    pub fn actuators(&self) -> &Actuators {
        &self.actuators
    }

    /// Underlying processor.
    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Application configuration.
    pub fn config(&self) -> &BlinkerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{SchedulerError, ValueKind};

    #[test]
    fn rotation_events_use_configured_increment() {
        let config = BlinkerConfig {
            rotation_increment: 2,
            ..BlinkerConfig::default()
        };
        let mut host = BlinkerHost::new(config).unwrap();
        assert_eq!(host.config().rotation_increment, 2);

        host.apply(HostEvent::RotateClockwise);
        assert_eq!(host.sensors().rotation, -2);
        let report = host.update().unwrap();
        assert_eq!(report.wheel_offset, 10.0);
    }

    #[test]
    fn mistyped_lever_output_is_reported() {
        let mut host = BlinkerHost::new(BlinkerConfig::default()).unwrap();
        host.outputs = [Value::Integer(1)];
        match host.lever_pos() {
            Err(SchedulerError::TypeMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, ValueKind::Lever);
                assert_eq!(found, ValueKind::Integer);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(host.report().is_err());
    }
}
