#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use roomlight::config::{Config, RawConfig};
use roomlight::error::SensorError;
use roomlight::lights::{LightActuator, LightBank, LightSource};
use roomlight::sensors::range::SPEED_OF_SOUND_CM_S;
use roomlight::sensors::{SensorId, SensorTransport};

/// Every command a state machine sent to the lights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LightCommand {
    Set(String, bool),
    Toggle(String),
    AllOn,
    AllOff,
}

/// A `LightBank` that also records the commands it received.
pub struct RecordingLights {
    bank: LightBank,
    log: Mutex<Vec<LightCommand>>,
}

impl RecordingLights {
    pub fn new(channels: &[&str]) -> Self {
        Self {
            bank: LightBank::new(channels.iter().copied()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn house() -> Self {
        Self::new(&["hall", "bedroom", "kitchen", "bathroom"])
    }

    pub fn commands(&self) -> Vec<LightCommand> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, command: &LightCommand) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    fn record(&self, command: LightCommand) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).push(command);
    }
}

impl LightActuator for RecordingLights {
    fn set_light(&self, channel: &str, on: bool, source: LightSource) -> bool {
        self.record(LightCommand::Set(channel.to_string(), on));
        self.bank.set_light(channel, on, source)
    }

    fn get_light_state(&self, channel: &str) -> Option<bool> {
        self.bank.get_light_state(channel)
    }

    fn toggle_light(&self, channel: &str, source: LightSource) -> Option<bool> {
        self.record(LightCommand::Toggle(channel.to_string()));
        self.bank.toggle_light(channel, source)
    }

    fn channels(&self) -> Vec<String> {
        self.bank.channels()
    }

    fn all_on(&self, source: LightSource) {
        self.record(LightCommand::AllOn);
        self.bank.all_on(source)
    }

    fn all_off(&self, source: LightSource) {
        self.record(LightCommand::AllOff);
        self.bank.all_off(source)
    }
}

pub fn echo_for_cm(cm: f64) -> Duration {
    Duration::from_secs_f64(cm * 2.0 / SPEED_OF_SOUND_CM_S)
}

/// Replays queued distances per sensor; an empty queue reads as far away.
pub struct ScriptedTransport {
    outer: Mutex<VecDeque<f64>>,
    inner: Mutex<VecDeque<f64>>,
    charge: Option<Duration>,
    faults: AtomicUsize,
    pub range_reads: AtomicUsize,
}

pub const FAR_CM: f64 = 300.0;
pub const NEAR_CM: f64 = 40.0;

impl ScriptedTransport {
    pub fn new(charge: Option<Duration>) -> Self {
        Self {
            outer: Mutex::new(VecDeque::new()),
            inner: Mutex::new(VecDeque::new()),
            charge,
            faults: AtomicUsize::new(0),
            range_reads: AtomicUsize::new(0),
        }
    }

    /// Queue one tick worth of distances.
    pub fn push_tick(&self, outer_cm: f64, inner_cm: f64) {
        self.outer.lock().unwrap_or_else(PoisonError::into_inner).push_back(outer_cm);
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).push_back(inner_cm);
    }

    pub fn fail_next(&self, n: usize) {
        self.faults.store(n, Ordering::SeqCst);
    }
}

impl SensorTransport for ScriptedTransport {
    fn trigger_and_time_echo(&self, sensor: SensorId) -> Result<Option<Duration>, SensorError> {
        if self
            .faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SensorError::Transport {
                sensor,
                reason: "bus error".into(),
            });
        }
        self.range_reads.fetch_add(1, Ordering::SeqCst);
        let queue = match sensor {
            SensorId::Outer => &self.outer,
            SensorId::Inner => &self.inner,
        };
        let cm = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(FAR_CM);
        Ok(Some(echo_for_cm(cm)))
    }

    fn discharge_and_time_high(&self, _node: u8) -> Result<Option<Duration>, SensorError> {
        Ok(self.charge)
    }
}

/// Defaults with the slow parts shortened for tests.
pub fn fast_config(exit_delay: f64) -> Config {
    let mut raw = RawConfig::default();
    raw.occupancy.exit_delay = exit_delay;
    raw.occupancy.poll_period = 0.02;
    raw.occupancy.fault_backoff = 0.05;
    raw.occupancy.shutdown_timeout = 0.5;
    raw.sensors.median_samples = 3;
    raw.sensors.sample_delay = 0.0;
    Config::try_from(raw).expect("test config is valid")
}
