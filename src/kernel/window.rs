use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::sensors::SensorId;

/// One sensor's outcome for one poll tick. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub timestamp: Instant,
    pub sensor_id: SensorId,
    pub triggered: bool,
    pub raw_distance: Option<f64>,
}

/// Both sensors' samples for one poll tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSnapshot {
    pub timestamp: Instant,
    pub outer: SensorSample,
    pub inner: SensorSample,
}

impl SensorSnapshot {
    /// Snapshot with both samples stamped at `at`.
    pub fn new(at: Instant, outer_triggered: bool, inner_triggered: bool) -> Self {
        Self {
            timestamp: at,
            outer: SensorSample {
                timestamp: at,
                sensor_id: SensorId::Outer,
                triggered: outer_triggered,
                raw_distance: None,
            },
            inner: SensorSample {
                timestamp: at,
                sensor_id: SensorId::Inner,
                triggered: inner_triggered,
                raw_distance: None,
            },
        }
    }

    pub fn sample(&self, sensor: SensorId) -> &SensorSample {
        match sensor {
            SensorId::Outer => &self.outer,
            SensorId::Inner => &self.inner,
        }
    }

    pub fn triggered(&self, sensor: SensorId) -> bool {
        self.sample(sensor).triggered
    }
}

/// Time-ordered snapshots younger than the window duration.
///
/// Insertion order is time order: one snapshot per tick, and every insert
/// prunes everything at least `duration` older than the new snapshot.
#[derive(Debug, Clone)]
pub struct EventWindow {
    duration: Duration,
    snapshots: VecDeque<SensorSnapshot>,
}

impl EventWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            snapshots: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, snapshot: SensorSnapshot) {
        let now = snapshot.timestamp;
        // At most one snapshot per tick.
        if self.latest().is_some_and(|last| last.timestamp >= now) {
            trace!(?now, "dropping snapshot that is not newer than the last tick");
            return;
        }
        self.snapshots.push_back(snapshot);
        while self
            .snapshots
            .front()
            .is_some_and(|s| now.saturating_duration_since(s.timestamp) >= self.duration)
        {
            self.snapshots.pop_front();
        }
    }

    /// The current tick's snapshot.
    pub fn latest(&self) -> Option<&SensorSnapshot> {
        self.snapshots.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorSnapshot> {
        self.snapshots.iter()
    }

    /// Adjacent snapshot pairs in time order.
    pub fn pairs(&self) -> impl Iterator<Item = (&SensorSnapshot, &SensorSnapshot)> {
        self.snapshots.iter().zip(self.snapshots.iter().skip(1))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
