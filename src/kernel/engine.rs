use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::occupancy::OccupancyMachine;
use super::presence::OccupancyState;
use super::window::{EventWindow, SensorSample, SensorSnapshot};
use crate::config::Config;
use crate::error::SensorError;
use crate::lights::LightActuator;
use crate::sensors::{BrightnessReader, BrightnessReading, RangeReader, Reading, SensorId, SensorTransport};

/// The poll loop: reads both range sensors each tick, records the snapshot
/// and lets the occupancy machine react.
pub struct OccupancyEngine<T, L> {
    range: Arc<RangeReader<T>>,
    brightness: Arc<BrightnessReader<T>>,
    window: EventWindow,
    machine: OccupancyMachine<L>,
    poll_period: Duration,
    fault_backoff: Duration,
    shutdown_timeout: Duration,
}

impl<T: SensorTransport, L: LightActuator> OccupancyEngine<T, L> {
    pub fn new(transport: Arc<T>, lights: Arc<L>, config: &Config) -> Self {
        let occupancy = &config.occupancy;
        Self {
            range: Arc::new(RangeReader::new(Arc::clone(&transport), &config.sensors)),
            brightness: Arc::new(BrightnessReader::new(transport, &config.sensors)),
            window: EventWindow::new(occupancy.window_duration),
            machine: OccupancyMachine::new(lights, &config.lights.room_channel, occupancy),
            poll_period: occupancy.poll_period,
            fault_backoff: occupancy.fault_backoff,
            shutdown_timeout: occupancy.shutdown_timeout,
        }
    }

    pub fn machine(&self) -> &OccupancyMachine<L> {
        &self.machine
    }

    pub fn window(&self) -> &EventWindow {
        &self.window
    }

    /// One poll tick. Sensors are read one after the other, outer first, on
    /// the blocking pool. A transport fault aborts the tick before anything
    /// is recorded.
    pub async fn tick_step(&mut self) -> Result<Option<OccupancyState>, SensorError> {
        let now = Instant::now();
        let range = Arc::clone(&self.range);
        let (outer, inner) = tokio::task::spawn_blocking(move || -> Result<_, SensorError> {
            let outer = range.read_triggered(SensorId::Outer)?;
            let inner = range.read_triggered(SensorId::Inner)?;
            Ok((outer, inner))
        })
        .await??;

        self.window.insert(SensorSnapshot {
            timestamp: now,
            outer: sample(now, SensorId::Outer, outer),
            inner: sample(now, SensorId::Inner, inner),
        });

        let brightness = Arc::clone(&self.brightness);
        let transition = self
            .machine
            .step(&self.window, move || async move {
                match tokio::task::spawn_blocking(move || brightness.classify()).await {
                    Ok(reading) => reading,
                    Err(e) => {
                        warn!(error = %e, "brightness read did not complete, assuming dark");
                        BrightnessReading::dark()
                    }
                }
            })
            .await;
        Ok(transition)
    }

    /// Run the poll loop on the current runtime until the handle shuts it down.
    pub fn spawn(mut self) -> EngineHandle<L> {
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        let machine = self.machine.clone();
        let shutdown_timeout = self.shutdown_timeout;
        let task = tokio::spawn(async move { self.run(stop).await });
        EngineHandle {
            shutdown,
            task,
            machine,
            shutdown_timeout,
        }
    }

    async fn run(&mut self, shutdown: CancellationToken) {
        info!(period = ?self.poll_period, "occupancy engine started");

        let mut cadence = interval(self.poll_period);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = cadence.tick() => {}
            }

            if let Err(e) = self.tick_step().await {
                error!(error = %e, backoff = ?self.fault_backoff, "sensor fault, backing off");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(self.fault_backoff) => {}
                }
            }
        }

        info!("occupancy engine stopped");
    }
}

fn sample(at: Instant, sensor_id: SensorId, (triggered, reading): (bool, Reading)) -> SensorSample {
    SensorSample {
        timestamp: at,
        sensor_id,
        triggered,
        raw_distance: reading.distance(),
    }
}

/// Control handle of a spawned engine.
pub struct EngineHandle<L> {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    machine: OccupancyMachine<L>,
    shutdown_timeout: Duration,
}

impl<L: LightActuator> EngineHandle<L> {
    pub async fn state(&self) -> OccupancyState {
        self.machine.state().await
    }

    pub fn machine(&self) -> &OccupancyMachine<L> {
        &self.machine
    }

    /// Stop the loop, join it within the shutdown timeout and cancel the
    /// pending exit timer.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let abort = self.task.abort_handle();
        match timeout(self.shutdown_timeout, self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "occupancy engine task failed"),
            Err(_) => {
                warn!(timeout = ?self.shutdown_timeout, "occupancy engine did not stop in time, aborting");
                abort.abort();
            }
        }
        self.machine.cancel_timers().await;
    }
}
