use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use super::cancel::DelayedAction;
use super::gesture::GestureClassifier;
use crate::config::ButtonConfig;
use crate::lights::LightActuator;

#[derive(Debug, Default)]
struct Level {
    /// Debounced level.
    down: bool,
    /// Level of the most recent edge, accepted or not.
    raw: bool,
    last_change: Option<Instant>,
    hold: Option<DelayedAction>,
    /// Re-reads `raw` once the bounce time after the last accepted change is over.
    settle: Option<DelayedAction>,
}

struct Shared<L> {
    channel: String,
    classifier: GestureClassifier<L>,
    bounce: Duration,
    hold_duration: Duration,
    level: Mutex<Level>,
}

/// Turns raw level changes of one button into press and hold edges.
///
/// An edge closer than the bounce time to the last accepted change is not
/// acted on immediately; the raw level is re-read when the bounce time is
/// over, so a tap shorter than the bounce time still ends in a release.
/// Every accepted press arms a hold timer that raises `held` if the button is
/// still down when it runs out; release disarms it.
pub struct ButtonInput<L> {
    shared: Arc<Shared<L>>,
}

impl<L: LightActuator> ButtonInput<L> {
    pub fn new(channel: &str, classifier: GestureClassifier<L>, config: &ButtonConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                channel: channel.to_string(),
                classifier,
                bounce: config.bounce,
                hold_duration: config.hold_duration,
                level: Mutex::new(Level::default()),
            }),
        }
    }

    pub fn channel(&self) -> &str {
        &self.shared.channel
    }

    /// Debounced level.
    pub fn is_down(&self) -> bool {
        self.shared.lock().down
    }

    pub fn set_level(&self, down: bool) {
        self.set_level_at(down, Instant::now());
    }

    pub fn set_level_at(&self, down: bool, at: Instant) {
        self.shared.edge(down, at);
    }

    /// Disarm pending hold and settle timers. Used at shutdown.
    pub fn cancel(&self) {
        let mut level = self.shared.lock();
        for timer in [level.hold.take(), level.settle.take()].into_iter().flatten() {
            timer.cancel();
        }
    }
}

impl<L: LightActuator> Shared<L> {
    fn lock(&self) -> MutexGuard<'_, Level> {
        self.level.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn edge(self: &Arc<Self>, down: bool, at: Instant) {
        let mut level = self.lock();
        level.raw = down;
        if level.down == down {
            if let Some(settle) = level.settle.take() {
                settle.cancel();
            }
            return;
        }

        match level.last_change.map(|last| last + self.bounce) {
            Some(settled) if at < settled => {
                trace!(channel = %self.channel, down, "contact bounce, waiting for the level to settle");
                if !level.settle.as_ref().is_some_and(DelayedAction::is_pending) {
                    level.settle = Some(self.arm_settle(settled.saturating_duration_since(at)));
                }
            }
            _ => self.accept(&mut level, down, at),
        }
    }

    fn accept(self: &Arc<Self>, level: &mut Level, down: bool, at: Instant) {
        level.down = down;
        level.last_change = Some(at);
        if let Some(settle) = level.settle.take() {
            settle.cancel();
        }

        if down {
            self.classifier.press(&self.channel);
            level.hold = Some(self.arm_hold());
        } else if let Some(hold) = level.hold.take() {
            hold.cancel();
        }
    }

    fn arm_settle(self: &Arc<Self>, delay: Duration) -> DelayedAction {
        let shared = Arc::clone(self);

        DelayedAction::spawn_on(self.classifier.runtime(), delay, move |ticket| async move {
            let mut level = shared.lock();
            if ticket.is_cancelled() {
                return;
            }
            level.settle = None;
            let raw = level.raw;
            if raw != level.down {
                shared.accept(&mut level, raw, Instant::now());
            }
        })
    }

    fn arm_hold(self: &Arc<Self>) -> DelayedAction {
        let shared = Arc::clone(self);

        DelayedAction::spawn_on(self.classifier.runtime(), self.hold_duration, move |ticket| async move {
            let mut level = shared.lock();
            if ticket.is_cancelled() || !level.down || !level.raw {
                return;
            }
            level.hold = None;
            shared.classifier.held(&shared.channel);
        })
    }
}
