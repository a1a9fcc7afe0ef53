//! Sensor transport seam and the typed readers built on it.
//!
//! The transport is the hardware-specific half. It times pin edges and returns
//! a raw duration, or `None` when a bounded wait expires.
//! The readers turn those raw durations into typed readings.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SensorError;

pub mod brightness;
pub mod gpio;
pub mod range;
pub mod simulated;

pub use brightness::{BrightnessReader, BrightnessReading};
pub use range::{RangeReader, Reading};

/// The two doorway range sensors. Their trigger order encodes direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorId {
    /// Doorway-side sensor (us2).
    Outer,
    /// Room-side sensor (us1).
    Inner,
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorId::Outer => f.write_str("outer"),
            SensorId::Inner => f.write_str("inner"),
        }
    }
}

/// Raw timing access to the sensors. Every call is blocking but bounded by
/// the implementation's own timeout; `Ok(None)` means that timeout expired.
pub trait SensorTransport: Send + Sync + 'static {
    /// Fire the trigger pulse of a range sensor and return how long its echo
    /// line stayed high.
    fn trigger_and_time_echo(&self, sensor: SensorId) -> Result<Option<Duration>, SensorError>;

    /// Discharge the RC brightness node, then time how long it takes to read high.
    fn discharge_and_time_high(&self, node: u8) -> Result<Option<Duration>, SensorError>;
}

impl<T: SensorTransport> SensorTransport for std::sync::Arc<T> {
    fn trigger_and_time_echo(&self, sensor: SensorId) -> Result<Option<Duration>, SensorError> {
        (**self).trigger_and_time_echo(sensor)
    }

    fn discharge_and_time_high(&self, node: u8) -> Result<Option<Duration>, SensorError> {
        (**self).discharge_and_time_high(node)
    }
}
