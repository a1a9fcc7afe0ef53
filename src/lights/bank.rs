use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::{LightActuator, LightSource};

/// In-memory light channels, all off at start.
#[derive(Debug)]
pub struct LightBank {
    states: Mutex<BTreeMap<String, bool>>,
}

impl LightBank {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let states = channels.into_iter().map(|c| (c.into(), false)).collect();
        Self {
            states: Mutex::new(states),
        }
    }

    /// Channel id -> on/off for every channel.
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        self.states().clone()
    }

    fn states(&self) -> MutexGuard<'_, BTreeMap<String, bool>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LightActuator for LightBank {
    fn set_light(&self, channel: &str, on: bool, source: LightSource) -> bool {
        let mut states = self.states();
        let Some(state) = states.get_mut(channel) else {
            debug!(%channel, %source, "set_light on unknown channel");
            return false;
        };
        if *state != on {
            info!(%channel, on, %source, "light changed");
        }
        *state = on;
        true
    }

    fn get_light_state(&self, channel: &str) -> Option<bool> {
        self.states().get(channel).copied()
    }

    fn toggle_light(&self, channel: &str, source: LightSource) -> Option<bool> {
        let mut states = self.states();
        let state = states.get_mut(channel)?;
        *state = !*state;
        info!(%channel, on = *state, %source, "light toggled");
        Some(*state)
    }

    fn channels(&self) -> Vec<String> {
        self.states().keys().cloned().collect()
    }

    fn all_on(&self, source: LightSource) {
        self.states().values_mut().for_each(|s| *s = true);
        info!(%source, "all lights on");
    }

    fn all_off(&self, source: LightSource) {
        self.states().values_mut().for_each(|s| *s = false);
        info!(%source, "all lights off");
    }
}
