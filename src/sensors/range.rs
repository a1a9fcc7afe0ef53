use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use super::{SensorId, SensorTransport};
use crate::config::SensorConfig;
use crate::error::SensorError;

/// Speed of sound in cm/s; the echo covers the distance twice.
pub const SPEED_OF_SOUND_CM_S: f64 = 34_300.0;

/// Typed outcome of one ranging attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Distance to the nearest reflector in centimetres.
    Distance(f64),
    /// Timed out or implausible. Folded into "not triggered".
    NoEcho,
}

impl Reading {
    pub fn distance(&self) -> Option<f64> {
        match self {
            Reading::Distance(cm) => Some(*cm),
            Reading::NoEcho => None,
        }
    }

    /// A trigger is a reading strictly closer than the threshold.
    pub fn is_within(&self, threshold_cm: f64) -> bool {
        matches!(self, Reading::Distance(cm) if *cm < threshold_cm)
    }
}

/// Converts the echo high-time of a range sensor into a typed reading.
pub struct RangeReader<T> {
    transport: Arc<T>,
    inner_threshold_cm: f64,
    outer_threshold_cm: f64,
    min_cm: f64,
    max_cm: f64,
}

impl<T: SensorTransport> RangeReader<T> {
    pub fn new(transport: Arc<T>, config: &SensorConfig) -> Self {
        Self {
            transport,
            inner_threshold_cm: config.inner_threshold_cm,
            outer_threshold_cm: config.outer_threshold_cm,
            min_cm: config.min_distance_cm,
            max_cm: config.max_distance_cm,
        }
    }

    /// Blocks for at most the transport's echo timeout.
    pub fn read(&self, sensor: SensorId) -> Result<Reading, SensorError> {
        let reading = match self.transport.trigger_and_time_echo(sensor)? {
            Some(high) => self.classify_echo(high),
            None => Reading::NoEcho,
        };
        trace!(%sensor, ?reading, "range read");
        Ok(reading)
    }

    pub fn threshold(&self, sensor: SensorId) -> f64 {
        match sensor {
            SensorId::Inner => self.inner_threshold_cm,
            SensorId::Outer => self.outer_threshold_cm,
        }
    }

    /// Read a sensor and compare it against its own threshold.
    pub fn read_triggered(&self, sensor: SensorId) -> Result<(bool, Reading), SensorError> {
        let reading = self.read(sensor)?;
        Ok((reading.is_within(self.threshold(sensor)), reading))
    }

    fn classify_echo(&self, high: Duration) -> Reading {
        let cm = echo_to_distance_cm(high);
        if cm < self.min_cm || cm > self.max_cm {
            Reading::NoEcho
        } else {
            Reading::Distance(cm)
        }
    }
}

pub fn echo_to_distance_cm(high: Duration) -> f64 {
    high.as_secs_f64() * SPEED_OF_SOUND_CM_S / 2.0
}
