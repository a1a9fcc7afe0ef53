use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::cancel::DelayedAction;
use super::presence::{OccupancyGraph, OccupancyRequest, OccupancyState};
use super::sequence::{SequenceDetector, SequenceOrder};
use super::window::EventWindow;
use crate::config::OccupancyConfig;
use crate::lights::{LightActuator, LightSource};
use crate::sensors::{BrightnessReading, SensorId};

/// Everything guarded by the room mutex.
/// Invariant: `exit_timer` is live only while `state` is `Exiting`.
#[derive(Debug, Default)]
struct RoomState {
    state: OccupancyState,
    exit_timer: Option<DelayedAction>,
}

/// The three-state occupancy machine of one room and its exit timer.
///
/// Cloning shares the same room; the poll loop and the exit timer each hold a
/// clone of the state handle and only touch it under the mutex.
pub struct OccupancyMachine<L> {
    room: Arc<Mutex<RoomState>>,
    lights: Arc<L>,
    channel: Arc<str>,
    detector: SequenceDetector,
    exit_delay: Duration,
}

impl<L> Clone for OccupancyMachine<L> {
    fn clone(&self) -> Self {
        Self {
            room: Arc::clone(&self.room),
            lights: Arc::clone(&self.lights),
            channel: Arc::clone(&self.channel),
            detector: self.detector,
            exit_delay: self.exit_delay,
        }
    }
}

impl<L: LightActuator> OccupancyMachine<L> {
    pub fn new(lights: Arc<L>, channel: &str, config: &OccupancyConfig) -> Self {
        Self {
            room: Arc::new(Mutex::new(RoomState::default())),
            lights,
            channel: Arc::from(channel),
            detector: SequenceDetector::new(config.max_sequence_interval),
            exit_delay: config.exit_delay,
        }
    }

    pub async fn state(&self) -> OccupancyState {
        self.room.lock().await.state
    }

    /// Whether an exit timer handle is currently held.
    pub async fn exit_timer_pending(&self) -> bool {
        self.room
            .lock()
            .await
            .exit_timer
            .as_ref()
            .is_some_and(DelayedAction::is_pending)
    }

    /// Evaluate one poll tick. Each state only looks at its own pattern:
    /// entrance while empty, exit while occupied, the room-side sensor while
    /// exiting. `read_brightness` is awaited only on the entrance transition.
    ///
    /// Returns the new state if a transition happened.
    pub async fn step<F, Fut>(&self, window: &EventWindow, read_brightness: F) -> Option<OccupancyState>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BrightnessReading>,
    {
        let mut room = self.room.lock().await;

        let request = match room.state {
            OccupancyState::Empty => self
                .detector
                .detect(window, SequenceOrder::Entrance)
                .then_some(OccupancyRequest::EntranceDetected),
            OccupancyState::Occupied => self
                .detector
                .detect(window, SequenceOrder::Exit)
                .then_some(OccupancyRequest::ExitDetected),
            OccupancyState::Exiting => window
                .latest()
                .is_some_and(|s| s.triggered(SensorId::Inner))
                .then_some(OccupancyRequest::InnerRetriggered),
        }?;
        let next = OccupancyGraph::transition(room.state, request)?;

        match request {
            OccupancyRequest::EntranceDetected => {
                let brightness = read_brightness().await;
                if brightness.is_dark {
                    self.lights.set_light(&self.channel, true, LightSource::Automation);
                    info!(channel = %self.channel, median = ?brightness.median, "entrance in the dark, light on");
                } else {
                    info!(channel = %self.channel, median = ?brightness.median, "entrance with enough light");
                }
            }
            OccupancyRequest::ExitDetected => {
                self.start_exit_timer(&mut room);
                info!(delay = ?self.exit_delay, "exit sequence, exit delay started");
            }
            OccupancyRequest::InnerRetriggered => {
                if let Some(timer) = room.exit_timer.take() {
                    timer.cancel();
                }
                info!("movement during exit delay, exit cancelled");
            }
            OccupancyRequest::ExitDelayElapsed => {}
        }

        info!(from = ?room.state, to = ?next, "occupancy transition");
        room.state = next;
        Some(next)
    }

    /// Cancel the pending exit timer without changing state. Used at shutdown.
    pub async fn cancel_timers(&self) {
        if let Some(timer) = self.room.lock().await.exit_timer.take() {
            timer.cancel();
            debug!("exit timer cancelled at shutdown");
        }
    }

    /// No-op while a timer is already running.
    fn start_exit_timer(&self, room: &mut RoomState) {
        if room.exit_timer.as_ref().is_some_and(DelayedAction::is_pending) {
            return;
        }

        let shared = Arc::clone(&self.room);
        let lights = Arc::clone(&self.lights);
        let channel = Arc::clone(&self.channel);

        room.exit_timer = Some(DelayedAction::spawn(self.exit_delay, move |ticket| async move {
            let mut room = shared.lock().await;
            // Cancellation happens under this lock, so the check is exact here.
            if ticket.is_cancelled() {
                debug!("exit timer fired after cancellation, ignoring");
                return;
            }
            let Some(next) = OccupancyGraph::transition(room.state, OccupancyRequest::ExitDelayElapsed) else {
                debug!(state = ?room.state, "exit delay elapsed outside Exiting, ignoring");
                return;
            };
            lights.set_light(&channel, false, LightSource::Automation);
            info!(channel = %channel, from = ?room.state, to = ?next, "exit delay elapsed, light off");
            room.state = next;
            room.exit_timer = None;
        }));
    }
}
