use std::time::{Duration, Instant};

use super::range::SPEED_OF_SOUND_CM_S;
use super::{SensorId, SensorTransport};
use crate::error::SensorError;

const NEAR_CM: f64 = 40.0;
const INNER_FAR_CM: f64 = 250.0;
const OUTER_FAR_CM: f64 = 300.0;
const BRIGHT_CHARGE: Duration = Duration::from_millis(40);
const DARK_CHARGE: Duration = Duration::from_millis(700);

/// Stand-in for the GPIO transport on machines without sensors.
///
/// Replays one walk cycle per `period`: someone crosses the doorway inwards
/// early in the cycle and outwards halfway through. The room is dark during
/// the second half of every minute.
pub struct SimulatedTransport {
    started: Instant,
    period: Duration,
}

impl SimulatedTransport {
    pub fn new(period: Duration) -> Self {
        Self {
            started: Instant::now(),
            period,
        }
    }

    fn phase(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        let period = self.period.as_secs_f64().max(1.0);
        (elapsed % period) / period
    }

    fn distance_cm(&self, sensor: SensorId) -> f64 {
        let phase = self.phase();
        let near = match sensor {
            SensorId::Outer => (0.10..0.12).contains(&phase) || (0.52..0.54).contains(&phase),
            SensorId::Inner => (0.12..0.14).contains(&phase) || (0.50..0.52).contains(&phase),
        };
        match (near, sensor) {
            (true, _) => NEAR_CM,
            (false, SensorId::Inner) => INNER_FAR_CM,
            (false, SensorId::Outer) => OUTER_FAR_CM,
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl SensorTransport for SimulatedTransport {
    fn trigger_and_time_echo(&self, sensor: SensorId) -> Result<Option<Duration>, SensorError> {
        let cm = self.distance_cm(sensor);
        Ok(Some(Duration::from_secs_f64(cm * 2.0 / SPEED_OF_SOUND_CM_S)))
    }

    fn discharge_and_time_high(&self, _node: u8) -> Result<Option<Duration>, SensorError> {
        let second = self.started.elapsed().as_secs() % 60;
        Ok(Some(if second < 30 { BRIGHT_CHARGE } else { DARK_CHARGE }))
    }
}
