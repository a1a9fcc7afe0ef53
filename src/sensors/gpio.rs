//! Pin-level transport: echo ranging by edge timing and RC charge timing.
//!
//! Both procedures busy-wait on a pin level, each wait bounded by its own
//! timeout, so a disconnected sensor costs at most one timeout per call.

use std::io;
use std::time::{Duration, Instant};

use super::{SensorId, SensorTransport};
use crate::config::SensorConfig;
use crate::error::SensorError;

/// Width of the ranging trigger pulse.
pub const TRIGGER_PULSE: Duration = Duration::from_micros(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

/// The few digital pin operations the transport needs from a GPIO driver.
pub trait DigitalPins: Send + Sync + 'static {
    fn set_mode(&self, pin: u8, mode: PinMode) -> io::Result<()>;
    fn write(&self, pin: u8, high: bool) -> io::Result<()>;
    fn read(&self, pin: u8) -> io::Result<bool>;
}

/// BCM pin numbers of the sensor wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    pub inner_trigger: u8,
    pub inner_echo: u8,
    pub outer_trigger: u8,
    pub outer_echo: u8,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            inner_trigger: 23,
            inner_echo: 24,
            outer_trigger: 25,
            outer_echo: 12,
        }
    }
}

impl PinMap {
    fn ranging(&self, sensor: SensorId) -> (u8, u8) {
        match sensor {
            SensorId::Inner => (self.inner_trigger, self.inner_echo),
            SensorId::Outer => (self.outer_trigger, self.outer_echo),
        }
    }
}

pub struct GpioTransport<P> {
    gpio: P,
    pins: PinMap,
    echo_timeout: Duration,
    discharge_time: Duration,
    charge_timeout: Duration,
}

impl<P: DigitalPins> GpioTransport<P> {
    /// Drives both trigger lines low before first use.
    pub fn new(gpio: P, pins: PinMap, config: &SensorConfig) -> io::Result<Self> {
        for (trigger, echo) in [pins.ranging(SensorId::Inner), pins.ranging(SensorId::Outer)] {
            gpio.set_mode(trigger, PinMode::Output)?;
            gpio.set_mode(echo, PinMode::Input)?;
            gpio.write(trigger, false)?;
        }
        Ok(Self {
            gpio,
            pins,
            echo_timeout: config.echo_timeout,
            discharge_time: config.discharge_time,
            charge_timeout: config.charge_timeout,
        })
    }

    fn time_echo(&self, sensor: SensorId) -> io::Result<Option<Duration>> {
        let (trigger, echo) = self.pins.ranging(sensor);
        self.gpio.write(trigger, true)?;
        std::thread::sleep(TRIGGER_PULSE);
        self.gpio.write(trigger, false)?;

        let Some(rise) = self.wait_for_level(echo, true, self.echo_timeout)? else {
            return Ok(None);
        };
        let Some(fall) = self.wait_for_level(echo, false, self.echo_timeout)? else {
            return Ok(None);
        };
        Ok(Some(fall.duration_since(rise)))
    }

    fn time_charge(&self, node: u8) -> io::Result<Option<Duration>> {
        self.gpio.set_mode(node, PinMode::Output)?;
        self.gpio.write(node, false)?;
        std::thread::sleep(self.discharge_time);

        self.gpio.set_mode(node, PinMode::Input)?;
        let start = Instant::now();
        Ok(self
            .wait_for_level(node, true, self.charge_timeout)?
            .map(|high| high.duration_since(start)))
    }

    /// Instant at which `pin` first read `level`, or `None` past the timeout.
    fn wait_for_level(&self, pin: u8, level: bool, timeout: Duration) -> io::Result<Option<Instant>> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.gpio.read(pin)? == level {
                return Ok(Some(Instant::now()));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::hint::spin_loop();
        }
    }
}

impl<P: DigitalPins> SensorTransport for GpioTransport<P> {
    fn trigger_and_time_echo(&self, sensor: SensorId) -> Result<Option<Duration>, SensorError> {
        self.time_echo(sensor).map_err(|e| SensorError::Transport {
            sensor,
            reason: e.to_string(),
        })
    }

    fn discharge_and_time_high(&self, node: u8) -> Result<Option<Duration>, SensorError> {
        self.time_charge(node).map_err(|e| SensorError::Node {
            node,
            reason: e.to_string(),
        })
    }
}
