//! Offline threshold calibration.
//!
//! The operator records a baseline set (empty room / bright) and an occupied
//! set (person in range / dark) for one sensor; the recommendation separates
//! the two distributions.

use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::warn;

use crate::error::{CalibrationError, SensorError};

/// Floor of the overlap margin for charge times, seconds.
const BRIGHTNESS_MARGIN_FLOOR: f64 = 0.01;
/// Floor of the overlap margin for distances, cm.
const RANGE_MARGIN_FLOOR: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SensorKind {
    /// Distances in cm; occupied readings are the small ones.
    Range,
    /// Charge times in seconds; occupied (dark) readings are the large ones.
    Brightness,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

impl SampleStats {
    /// Missing readings are dropped; `None` if nothing is left.
    pub fn from_values(values: &[Option<f64>]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let stdev = if count > 1 {
            let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };
        let mid = count / 2;
        let median = if count % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        };

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            stdev,
            p10: percentile(&sorted, 10.0),
            p25: percentile(&sorted, 25.0),
            p75: percentile(&sorted, 75.0),
            p90: percentile(&sorted, 90.0),
        })
    }
}

/// Linear interpolation between the closest ranks of a sorted, non-empty slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let k = (sorted.len() - 1) as f64 * (p / 100.0);
    let f = k.floor() as usize;
    let c = (f + 1).min(sorted.len() - 1);
    if f == c {
        return sorted[f];
    }
    sorted[f] * (c as f64 - k) + sorted[c] * (k - f as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rationale {
    /// The distributions do not overlap.
    MidpointOfMedians,
    /// They overlap; the occupied p90 plus a margin.
    OverlapMargin,
}

impl fmt::Display for Rationale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rationale::MidpointOfMedians => f.write_str("midpoint between medians (no overlap)"),
            Rationale::OverlapMargin => f.write_str("overlap: occupied p90 + margin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub threshold: f64,
    pub rationale: Rationale,
    pub baseline: SampleStats,
    pub occupied: SampleStats,
}

pub fn recommend_threshold(
    kind: SensorKind,
    baseline: &[Option<f64>],
    occupied: &[Option<f64>],
) -> Result<Recommendation, CalibrationError> {
    let b = SampleStats::from_values(baseline).ok_or(CalibrationError::InsufficientData("baseline"))?;
    let o = SampleStats::from_values(occupied).ok_or(CalibrationError::InsufficientData("occupied"))?;

    let (separated, margin_floor, decimals) = match kind {
        // Bright times sit below dark times.
        SensorKind::Brightness => (b.p90 < o.p10, BRIGHTNESS_MARGIN_FLOOR, 4),
        // Near (occupied) distances sit below the empty-room distances.
        SensorKind::Range => (o.p90 < b.p10, RANGE_MARGIN_FLOOR, 2),
    };

    let (threshold, rationale) = if separated {
        ((b.median + o.median) / 2.0, Rationale::MidpointOfMedians)
    } else {
        (o.p90 + o.stdev.max(margin_floor), Rationale::OverlapMargin)
    };

    Ok(Recommendation {
        threshold: round_to(threshold, decimals),
        rationale,
        baseline: b,
        occupied: o,
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub unix_time: f64,
    pub value: Option<f64>,
}

/// Record `count` readings, `delay` apart. A faulted read is kept as a
/// missing value.
pub fn collect_samples<F>(count: usize, delay: Duration, mut read: F) -> Vec<CalibrationSample>
where
    F: FnMut() -> Result<Option<f64>, SensorError>,
{
    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        let unix_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        let value = read().unwrap_or_else(|e| {
            warn!(sample = i, error = %e, "calibration read failed");
            None
        });
        samples.push(CalibrationSample { unix_time, value });
        if i + 1 < count {
            std::thread::sleep(delay);
        }
    }
    samples
}

pub fn write_csv<W: Write>(samples: &[CalibrationSample], mut out: W) -> io::Result<()> {
    writeln!(out, "unix_time,value")?;
    for s in samples {
        match s.value {
            Some(v) => writeln!(out, "{:.6},{}", s.unix_time, v)?,
            None => writeln!(out, "{:.6},", s.unix_time)?,
        }
    }
    Ok(())
}

/// Values from the last column of each data row. Empty or unparsable cells
/// are missing readings; rows with fewer than two columns are skipped.
pub fn parse_csv(contents: &str) -> Vec<Option<f64>> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split(',').collect();
            if cols.len() < 2 {
                return None;
            }
            Some(cols[cols.len() - 1].trim().parse::<f64>().ok())
        })
        .collect()
}
