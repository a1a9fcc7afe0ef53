use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::SensorTransport;
use crate::config::SensorConfig;
use crate::error::SensorError;

/// Filtered darkness classification of the RC brightness node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessReading {
    pub is_dark: bool,
    /// Median charge time; `None` when every sample timed out.
    pub median: Option<Duration>,
}

impl BrightnessReading {
    pub fn dark() -> Self {
        Self { is_dark: true, median: None }
    }

    pub fn bright() -> Self {
        Self { is_dark: false, median: None }
    }
}

/// Median-filters repeated RC charge-time samples. Longer charge time means a
/// darker room.
pub struct BrightnessReader<T> {
    transport: Arc<T>,
    node: u8,
    threshold: Duration,
    samples: usize,
    sample_delay: Duration,
    /// Overall budget of one classification.
    deadline: Duration,
}

impl<T: SensorTransport> BrightnessReader<T> {
    pub fn new(transport: Arc<T>, config: &SensorConfig) -> Self {
        Self {
            transport,
            node: config.brightness_node,
            threshold: config.brightness_threshold,
            samples: config.median_samples,
            sample_delay: config.sample_delay,
            deadline: config.charge_timeout,
        }
    }

    /// One raw charge-time sample.
    pub fn measure(&self) -> Result<Option<Duration>, SensorError> {
        self.transport.discharge_and_time_high(self.node)
    }

    /// Classify against the configured threshold.
    pub fn classify(&self) -> BrightnessReading {
        self.classify_with(self.threshold)
    }

    /// Takes up to `median_samples` samples, but stops once the charge timeout
    /// has elapsed since the first one and classifies what it has. The call
    /// therefore blocks for at most the charge timeout plus one sample.
    /// A transport fault counts as a timed-out sample.
    pub fn classify_with(&self, threshold: Duration) -> BrightnessReading {
        let deadline = Instant::now() + self.deadline;
        let mut raw = Vec::with_capacity(self.samples);
        for i in 0..self.samples {
            match self.measure() {
                Ok(sample) => raw.push(sample),
                Err(e) => {
                    warn!(node = self.node, error = %e, "brightness sample failed");
                    raw.push(None);
                }
            }
            if i + 1 == self.samples {
                break;
            }
            if Instant::now() >= deadline {
                debug!(node = self.node, taken = raw.len(), "brightness deadline reached");
                break;
            }
            if !self.sample_delay.is_zero() {
                std::thread::sleep(self.sample_delay);
            }
        }
        let reading = classify_samples(&raw, threshold);
        debug!(node = self.node, ?reading, "brightness classified");
        reading
    }
}

/// Median of the valid samples compared against the threshold. Dark means
/// strictly above it; a median equal to the threshold reads as bright. No
/// valid sample at all fails safe to dark.
pub fn classify_samples(samples: &[Option<Duration>], threshold: Duration) -> BrightnessReading {
    let mut valid: Vec<Duration> = samples.iter().flatten().copied().collect();
    match median(&mut valid) {
        Some(m) => BrightnessReading { is_dark: m > threshold, median: Some(m) },
        None => BrightnessReading::dark(),
    }
}

/// Middle value; the mean of the two middle values for an even count.
pub fn median(values: &mut [Duration]) -> Option<Duration> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2)
    }
}
