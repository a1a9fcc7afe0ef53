use std::time::Duration;

use super::window::EventWindow;
use crate::sensors::SensorId;

/// Direction of travel through the doorway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOrder {
    /// Outer then inner.
    Entrance,
    /// Inner then outer.
    Exit,
}

impl SequenceOrder {
    pub fn sensors(self) -> (SensorId, SensorId) {
        match self {
            SequenceOrder::Entrance => (SensorId::Outer, SensorId::Inner),
            SequenceOrder::Exit => (SensorId::Inner, SensorId::Outer),
        }
    }
}

/// Finds an ordered trigger pair in adjacent ticks of the window.
#[derive(Debug, Clone, Copy)]
pub struct SequenceDetector {
    max_interval: Duration,
}

impl SequenceDetector {
    pub fn new(max_interval: Duration) -> Self {
        Self { max_interval }
    }

    /// Stateless: the same window yields the same answer every tick.
    pub fn detect(&self, window: &EventWindow, order: SequenceOrder) -> bool {
        let (first, second) = order.sensors();
        window.pairs().any(|(a, b)| {
            a.triggered(first)
                && b.triggered(second)
                && b.timestamp.saturating_duration_since(a.timestamp) < self.max_interval
        })
    }
}
