use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawConfig {
    pub occupancy: RawOccupancy,
    pub sensors: RawSensors,
    pub buttons: RawButtons,
    pub lights: RawLights,
}

impl RawConfig {
    /// Parse the config file at the specified path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read config file at {:?}", path))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("Failed to parse config file")
    }

    pub fn example() -> Self {
        Self::default()
    }
}

/// Timing of the occupancy engine, in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawOccupancy {
    /// Age after which a sensor snapshot leaves the event window.
    pub window_duration: f64,
    /// Maximum gap between the two triggers of a sequence match.
    pub max_sequence_interval: f64,
    /// Grace period between an exit match and the light going off.
    pub exit_delay: f64,
    pub poll_period: f64,
    /// Pause after a transport fault before polling again.
    pub fault_backoff: f64,
    /// Bound on joining the poll loop at shutdown.
    pub shutdown_timeout: f64,
}

impl Default for RawOccupancy {
    fn default() -> Self {
        Self {
            window_duration: 1.5,
            max_sequence_interval: 1.0,
            exit_delay: 10.0,
            poll_period: 0.1,
            fault_backoff: 1.0,
            shutdown_timeout: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawSensors {
    /// Trigger distance of the room-side sensor (us1), cm.
    pub us1_threshold: f64,
    /// Trigger distance of the doorway-side sensor (us2), cm.
    pub us2_threshold: f64,
    /// Readings outside [min_distance, max_distance] cm count as no echo.
    pub min_distance: f64,
    pub max_distance: f64,
    /// Bound on each echo edge wait, seconds.
    pub echo_timeout: f64,
    /// Median charge time above which the room is dark, seconds.
    pub brightness_threshold: f64,
    pub median_samples: usize,
    /// Delay between brightness samples, seconds.
    pub sample_delay: f64,
    pub discharge_time: f64,
    pub charge_timeout: f64,
    /// GPIO of the RC brightness node.
    pub brightness_node: u8,
}

impl Default for RawSensors {
    fn default() -> Self {
        Self {
            us1_threshold: 100.0,
            us2_threshold: 100.0,
            min_distance: 2.0,
            max_distance: 400.0,
            echo_timeout: 0.1,
            brightness_threshold: 0.12,
            median_samples: 7,
            sample_delay: 0.05,
            discharge_time: 0.01,
            charge_timeout: 2.0,
            brightness_node: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawButtons {
    /// Max interval between two presses of a double press, seconds.
    pub double_click_window: f64,
    /// Sustained press that counts as a hold, seconds.
    pub hold_duration: f64,
    /// Level changes closer together than this are contact bounce, seconds.
    pub bounce: f64,
}

impl Default for RawButtons {
    fn default() -> Self {
        Self {
            double_click_window: 0.4,
            hold_duration: 1.0,
            bounce: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawLights {
    pub channels: Vec<String>,
    /// Channel driven by the occupancy engine.
    pub room_channel: String,
}

impl Default for RawLights {
    fn default() -> Self {
        Self {
            channels: ["hall", "bedroom", "kitchen", "bathroom"]
                .into_iter()
                .map(String::from)
                .collect(),
            room_channel: "bedroom".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub occupancy: OccupancyConfig,
    pub sensors: SensorConfig,
    pub buttons: ButtonConfig,
    pub lights: LightConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyConfig {
    pub window_duration: Duration,
    pub max_sequence_interval: Duration,
    pub exit_delay: Duration,
    pub poll_period: Duration,
    pub fault_backoff: Duration,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    pub inner_threshold_cm: f64,
    pub outer_threshold_cm: f64,
    pub min_distance_cm: f64,
    pub max_distance_cm: f64,
    pub echo_timeout: Duration,
    pub brightness_threshold: Duration,
    pub median_samples: usize,
    pub sample_delay: Duration,
    pub discharge_time: Duration,
    pub charge_timeout: Duration,
    pub brightness_node: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ButtonConfig {
    pub double_click_window: Duration,
    pub hold_duration: Duration,
    pub bounce: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightConfig {
    pub channels: Vec<String>,
    pub room_channel: String,
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(Duration::from_secs_f64(value))
    } else {
        Err(ConfigError::InvalidDuration { field, value })
    }
}

/// Like `seconds`, but zero is allowed.
fn seconds_or_zero(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if value == 0.0 {
        Ok(Duration::ZERO)
    } else {
        seconds(field, value)
    }
}

fn distance(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidDistance { field, value })
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let o = raw.occupancy;
        let occupancy = OccupancyConfig {
            window_duration: seconds("occupancy.window_duration", o.window_duration)?,
            max_sequence_interval: seconds("occupancy.max_sequence_interval", o.max_sequence_interval)?,
            exit_delay: seconds("occupancy.exit_delay", o.exit_delay)?,
            poll_period: seconds("occupancy.poll_period", o.poll_period)?,
            fault_backoff: seconds("occupancy.fault_backoff", o.fault_backoff)?,
            shutdown_timeout: seconds("occupancy.shutdown_timeout", o.shutdown_timeout)?,
        };

        let s = raw.sensors;
        let min_distance_cm = distance("sensors.min_distance", s.min_distance)?;
        let max_distance_cm = distance("sensors.max_distance", s.max_distance)?;
        if min_distance_cm >= max_distance_cm {
            return Err(ConfigError::EmptyRange { min: min_distance_cm, max: max_distance_cm });
        }
        if s.median_samples == 0 {
            return Err(ConfigError::NoMedianSamples);
        }
        let sensors = SensorConfig {
            inner_threshold_cm: distance("sensors.us1_threshold", s.us1_threshold)?,
            outer_threshold_cm: distance("sensors.us2_threshold", s.us2_threshold)?,
            min_distance_cm,
            max_distance_cm,
            echo_timeout: seconds("sensors.echo_timeout", s.echo_timeout)?,
            brightness_threshold: seconds("sensors.brightness_threshold", s.brightness_threshold)?,
            median_samples: s.median_samples,
            sample_delay: seconds_or_zero("sensors.sample_delay", s.sample_delay)?,
            discharge_time: seconds("sensors.discharge_time", s.discharge_time)?,
            charge_timeout: seconds("sensors.charge_timeout", s.charge_timeout)?,
            brightness_node: s.brightness_node,
        };

        let b = raw.buttons;
        let buttons = ButtonConfig {
            double_click_window: seconds("buttons.double_click_window", b.double_click_window)?,
            hold_duration: seconds("buttons.hold_duration", b.hold_duration)?,
            bounce: seconds_or_zero("buttons.bounce", b.bounce)?,
        };

        let l = raw.lights;
        if l.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        if !l.channels.contains(&l.room_channel) {
            return Err(ConfigError::UnknownRoomChannel(l.room_channel));
        }
        let lights = LightConfig {
            channels: l.channels,
            room_channel: l.room_channel,
        };

        Ok(Config { occupancy, sensors, buttons, lights })
    }
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = RawConfig::load(path)?;
        Ok(Config::try_from(raw)?)
    }

    /// The built-in defaults, validated.
    pub fn defaults() -> Result<Self, ConfigError> {
        Config::try_from(RawConfig::default())
    }
}
