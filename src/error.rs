use thiserror::Error;

use crate::sensors::SensorId;

/// Faults raised by the sensor transport. A timeout is not a fault: it is
/// reported as "no reading" by the readers.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("transport fault on {sensor} sensor: {reason}")]
    Transport { sensor: SensorId, reason: String },

    #[error("transport fault on brightness node {node}: {reason}")]
    Node { node: u8, reason: String },

    #[error("blocking sensor read did not complete: {0}")]
    ReadTask(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("`{field}` must be a positive, finite number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },

    #[error("`{field}` must be a positive distance (got {value})")]
    InvalidDistance { field: &'static str, value: f64 },

    #[error("plausible range is empty: min {min} >= max {max}")]
    EmptyRange { min: f64, max: f64 },

    #[error("median filter needs at least one sample")]
    NoMedianSamples,

    #[error("no light channels configured")]
    NoChannels,

    #[error("room channel `{0}` is not one of the configured light channels")]
    UnknownRoomChannel(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("insufficient data: {0} set has no valid samples")]
    InsufficientData(&'static str),
}
