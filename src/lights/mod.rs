//! The lighting actuator seam consumed by both state machines.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod bank;

pub use bank::LightBank;

/// Who asked for a light change. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightSource {
    Automation,
    Button,
    Web,
    Chat,
    System,
}

impl fmt::Display for LightSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            LightSource::Automation => "automation",
            LightSource::Button => "button",
            LightSource::Web => "web",
            LightSource::Chat => "chat",
            LightSource::System => "system",
        };
        f.write_str(tag)
    }
}

/// A bank of on/off light channels addressed by id.
///
/// Unknown channels are reported through the return value, never as a fault.
pub trait LightActuator: Send + Sync + 'static {
    /// Idempotent. Returns whether the channel exists.
    fn set_light(&self, channel: &str, on: bool, source: LightSource) -> bool;

    /// `None` for an unknown channel.
    fn get_light_state(&self, channel: &str) -> Option<bool>;

    /// Returns the new state, `None` for an unknown channel.
    fn toggle_light(&self, channel: &str, source: LightSource) -> Option<bool>;

    fn channels(&self) -> Vec<String>;

    fn all_on(&self, source: LightSource) {
        for channel in self.channels() {
            self.set_light(&channel, true, source);
        }
    }

    fn all_off(&self, source: LightSource) {
        for channel in self.channels() {
            self.set_light(&channel, false, source);
        }
    }
}

impl<L: LightActuator> LightActuator for std::sync::Arc<L> {
    fn set_light(&self, channel: &str, on: bool, source: LightSource) -> bool {
        (**self).set_light(channel, on, source)
    }

    fn get_light_state(&self, channel: &str) -> Option<bool> {
        (**self).get_light_state(channel)
    }

    fn toggle_light(&self, channel: &str, source: LightSource) -> Option<bool> {
        (**self).toggle_light(channel, source)
    }

    fn channels(&self) -> Vec<String> {
        (**self).channels()
    }

    fn all_on(&self, source: LightSource) {
        (**self).all_on(source)
    }

    fn all_off(&self, source: LightSource) {
        (**self).all_off(source)
    }
}
