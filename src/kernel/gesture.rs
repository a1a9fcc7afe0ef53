//! Button gesture classification.
//!
//! A press arms a per-channel single-press timer. A second press on the same
//! channel inside the double-click window cancels it and fires a double press
//! instead. A hold cancels every channel's timer and fires immediately.
//! Double press and hold act on the whole house regardless of which channel
//! they came from.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::cancel::DelayedAction;
use crate::config::ButtonConfig;
use crate::lights::{LightActuator, LightSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gesture {
    /// Toggle the originating channel.
    SinglePress,
    /// All channels on.
    DoublePress,
    /// All channels off.
    Hold,
}

struct Shared<L> {
    lights: Arc<L>,
    /// At most one pending single-press timer per channel. Light commands are
    /// issued while holding this lock so a hold and a firing single press
    /// cannot interleave.
    pending: Mutex<HashMap<String, DelayedAction>>,
    double_click_window: Duration,
    runtime: Handle,
}

impl<L> Shared<L> {
    fn pending(&self) -> MutexGuard<'_, HashMap<String, DelayedAction>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheap to clone; clones share the same timers.
pub struct GestureClassifier<L> {
    shared: Arc<Shared<L>>,
}

impl<L> Clone for GestureClassifier<L> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<L: LightActuator> GestureClassifier<L> {
    /// Must be called from within a tokio runtime.
    pub fn new(lights: Arc<L>, config: &ButtonConfig) -> Self {
        Self::with_runtime(lights, config, Handle::current())
    }

    /// Timers are spawned on `runtime`, so edges may arrive from any thread.
    pub fn with_runtime(lights: Arc<L>, config: &ButtonConfig, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                lights,
                pending: Mutex::new(HashMap::new()),
                double_click_window: config.double_click_window,
                runtime,
            }),
        }
    }

    pub fn runtime(&self) -> &Handle {
        &self.shared.runtime
    }

    /// Press edge. Returns the gesture if one was classified immediately; a
    /// single press is only known once the double-click window has passed.
    pub fn press(&self, channel: &str) -> Option<Gesture> {
        let mut pending = self.shared.pending();

        match pending.remove(channel) {
            Some(timer) if timer.is_pending() => {
                timer.cancel();
                let others = cancel_all(&mut pending);
                self.shared.lights.all_on(LightSource::Button);
                info!(%channel, cancelled = others, "double press, all lights on");
                Some(Gesture::DoublePress)
            }
            _ => {
                let timer = self.arm_single_press(channel);
                pending.insert(channel.to_string(), timer);
                debug!(%channel, window = ?self.shared.double_click_window, "press, waiting for a second one");
                None
            }
        }
    }

    /// Hold edge, raised once a press has been sustained past the hold duration.
    pub fn held(&self, channel: &str) -> Gesture {
        let mut pending = self.shared.pending();
        let cancelled = cancel_all(&mut pending);
        self.shared.lights.all_off(LightSource::Button);
        info!(%channel, cancelled, "hold, all lights off");
        Gesture::Hold
    }

    /// Channels with a single press waiting to fire.
    pub fn pending_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.shared.pending().keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Drop every pending single press. Used at shutdown.
    pub fn cancel_all(&self) -> usize {
        cancel_all(&mut self.shared.pending())
    }

    fn arm_single_press(&self, channel: &str) -> DelayedAction {
        let shared = Arc::clone(&self.shared);
        let channel = channel.to_string();

        DelayedAction::spawn_on(&self.shared.runtime, self.shared.double_click_window, move |ticket| async move {
            let mut pending = shared.pending();
            if ticket.is_cancelled() {
                return;
            }
            pending.remove(&channel);
            let on = shared.lights.toggle_light(&channel, LightSource::Button);
            info!(%channel, ?on, "single press, light toggled");
        })
    }
}

fn cancel_all(pending: &mut HashMap<String, DelayedAction>) -> usize {
    let count = pending.len();
    for (_, timer) in pending.drain() {
        timer.cancel();
    }
    count
}
