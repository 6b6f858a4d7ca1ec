//! Hardware collaborator interfaces (spec.md §6). These are given, not
//! implemented, by the specification — the real bindings live outside this
//! crate's scope. The simulated implementations below are test fixtures
//! only, grounded in `original_source/hardware/virtual/*.py`: they let a
//! test script encoder counters and sonar readings directly rather than
//! modelling robot physics (out of scope per spec.md's non-goals).

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorPort {
    A,
    B,
    C,
    D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SonarPort {
    One,
    Two,
    Three,
    Four,
}

/// Binding to the robot's two wheel-encoder motors. A `None` return from
/// `get_motor_encoder` is a transient read failure (spec.md §4.5, §7) — the
/// caller skips the current tick, it never raises.
pub trait MotorDriver {
    fn set_motor_limits(&mut self, port: MotorPort, power: f64, dps: f64);
    fn reset_motor_encoder(&mut self, port: MotorPort);
    fn set_motor_position(&mut self, port: MotorPort, absolute_ticks: i64);
    fn get_motor_encoder(&mut self, port: MotorPort) -> Option<i64>;
}

/// Binding to the ultrasonic range sensor.
pub trait SonarDriver {
    fn set_sensor_type(&mut self, port: SonarPort);
    fn read(&mut self, port: SonarPort) -> Option<f64>;
}

/// In-memory motor driver for tests: encoder values are whatever the test
/// last set via [`SimMotorDriver::set_encoder`], `set_motor_position` just
/// records the last commanded absolute position per port.
#[derive(Debug, Default)]
pub struct SimMotorDriver {
    encoders: HashMap<MotorPort, i64>,
    commanded: HashMap<MotorPort, i64>,
    fail_next_read: bool,
}

impl SimMotorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_encoder(&mut self, port: MotorPort, ticks: i64) {
        self.encoders.insert(port, ticks);
    }

    pub fn commanded_position(&self, port: MotorPort) -> Option<i64> {
        self.commanded.get(&port).copied()
    }

    /// Next `get_motor_encoder` call (for any port) returns `None`, then
    /// clears — used to exercise the transient-sensor-error skip path.
    pub fn fail_next_read(&mut self) {
        self.fail_next_read = true;
    }
}

impl MotorDriver for SimMotorDriver {
    fn set_motor_limits(&mut self, _port: MotorPort, _power: f64, _dps: f64) {}

    fn reset_motor_encoder(&mut self, port: MotorPort) {
        self.encoders.insert(port, 0);
    }

    fn set_motor_position(&mut self, port: MotorPort, absolute_ticks: i64) {
        self.commanded.insert(port, absolute_ticks);
    }

    fn get_motor_encoder(&mut self, port: MotorPort) -> Option<i64> {
        if self.fail_next_read {
            self.fail_next_read = false;
            return None;
        }
        Some(*self.encoders.get(&port).unwrap_or(&0))
    }
}

/// In-memory sonar driver for tests: always returns a fixed reading, unless
/// told to fail the next read.
#[derive(Debug, Default)]
pub struct SimSonarDriver {
    reading_m: f64,
    fail_next_read: bool,
}

impl SimSonarDriver {
    pub fn new(reading_m: f64) -> Self {
        Self { reading_m, fail_next_read: false }
    }

    pub fn set_reading(&mut self, reading_m: f64) {
        self.reading_m = reading_m;
    }

    pub fn fail_next_read(&mut self) {
        self.fail_next_read = true;
    }
}

impl SonarDriver for SimSonarDriver {
    fn set_sensor_type(&mut self, _port: SonarPort) {}

    fn read(&mut self, _port: SonarPort) -> Option<f64> {
        if self.fail_next_read {
            self.fail_next_read = false;
            return None;
        }
        Some(self.reading_m)
    }
}
