mod common;

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::echo_for_cm;
use roomlight::config::{Config, RawConfig};
use roomlight::error::SensorError;
use roomlight::sensors::brightness::{classify_samples, median};
use roomlight::sensors::gpio::{DigitalPins, GpioTransport, PinMap, PinMode};
use roomlight::sensors::range::echo_to_distance_cm;
use roomlight::sensors::{BrightnessReader, RangeReader, Reading, SensorId, SensorTransport};

fn secs(s: f64) -> Option<Duration> {
    Some(Duration::from_secs_f64(s))
}

/// Returns queued raw durations; `fault` yields a transport error instead.
#[derive(Default)]
struct QueuedTransport {
    echoes: Mutex<VecDeque<Option<Duration>>>,
    charges: Mutex<VecDeque<Result<Option<Duration>, ()>>>,
}

impl SensorTransport for QueuedTransport {
    fn trigger_and_time_echo(&self, _sensor: SensorId) -> Result<Option<Duration>, SensorError> {
        Ok(self.echoes.lock().unwrap().pop_front().flatten())
    }

    fn discharge_and_time_high(&self, node: u8) -> Result<Option<Duration>, SensorError> {
        match self.charges.lock().unwrap().pop_front() {
            Some(Ok(sample)) => Ok(sample),
            Some(Err(())) => Err(SensorError::Node {
                node,
                reason: "short".into(),
            }),
            None => Ok(None),
        }
    }
}

fn fast_sensors() -> Config {
    let mut raw = RawConfig::default();
    raw.sensors.sample_delay = 0.0;
    raw.sensors.echo_timeout = 0.005;
    raw.sensors.charge_timeout = 0.005;
    raw.sensors.discharge_time = 0.001;
    Config::try_from(raw).unwrap()
}

#[test]
fn test_median_rejects_single_outlier() {
    let samples = [secs(0.04), secs(0.04), secs(0.05), secs(0.6), secs(0.04), secs(0.04), secs(0.05)];
    let reading = classify_samples(&samples, Duration::from_secs_f64(0.12));

    assert!(!reading.is_dark, "one slow sample must not flip the room to dark");
    assert_eq!(reading.median, secs(0.04));
}

#[test]
fn test_all_timeouts_fail_safe_to_dark() {
    let reading = classify_samples(&[None; 7], Duration::from_secs_f64(0.12));
    assert!(reading.is_dark);
    assert_eq!(reading.median, None);
}

#[test]
fn test_median_ignores_timeouts() {
    let samples = [None, secs(0.5), None, secs(0.7), secs(0.6)];
    let reading = classify_samples(&samples, Duration::from_secs_f64(0.12));
    assert!(reading.is_dark);
    assert_eq!(reading.median, secs(0.6));
}

#[test]
fn test_median_even_count() {
    let mut values = vec![Duration::from_millis(40), Duration::from_millis(10), Duration::from_millis(30), Duration::from_millis(20)];
    assert_eq!(median(&mut values), Some(Duration::from_millis(25)));
    assert_eq!(median(&mut []), None);
}

#[test]
fn test_threshold_is_strict() {
    let threshold = Duration::from_millis(120);
    assert!(!classify_samples(&[Some(threshold)], threshold).is_dark);
    assert!(classify_samples(&[Some(threshold + Duration::from_millis(1))], threshold).is_dark);
}

#[test]
fn test_brightness_reader_counts_faults_as_timeouts() {
    let mut raw = RawConfig::default();
    raw.sensors.sample_delay = 0.0;
    let config = Config::try_from(raw).unwrap();
    let transport = Arc::new(QueuedTransport::default());
    {
        let mut charges = transport.charges.lock().unwrap();
        charges.extend([Ok(secs(0.03)), Err(()), Err(()), Err(()), Ok(secs(0.05)), Ok(None), Ok(secs(0.04))]);
    }
    let reader = BrightnessReader::new(Arc::clone(&transport), &config.sensors);

    let reading = reader.classify();
    assert!(!reading.is_dark);
    assert_eq!(reading.median, secs(0.04));
    assert!(transport.charges.lock().unwrap().is_empty(), "median_samples samples taken");

    // A custom threshold applies to the same kind of reading.
    transport.charges.lock().unwrap().extend([Ok(secs(0.04)); 7]);
    assert!(reader.classify_with(Duration::from_millis(10)).is_dark);
}

#[test]
fn test_range_reading_conversion() {
    let d = echo_to_distance_cm(echo_for_cm(50.0));
    assert!((d - 50.0).abs() < 1e-6, "got {}", d);

    assert!(Reading::Distance(40.0).is_within(100.0));
    assert!(!Reading::Distance(100.0).is_within(100.0), "threshold is strict");
    assert!(!Reading::NoEcho.is_within(100.0));
    assert_eq!(Reading::NoEcho.distance(), None);
}

#[test]
fn test_range_reader_plausibility() {
    let config = fast_sensors();
    let transport = Arc::new(QueuedTransport::default());
    transport.echoes.lock().unwrap().extend([
        Some(echo_for_cm(60.0)),
        Some(echo_for_cm(1.0)),
        Some(echo_for_cm(450.0)),
        None,
        Some(echo_for_cm(150.0)),
    ]);
    let reader = RangeReader::new(transport, &config.sensors);

    let (triggered, reading) = reader.read_triggered(SensorId::Outer).unwrap();
    assert!(triggered);
    assert!(matches!(reading, Reading::Distance(cm) if (cm - 60.0).abs() < 1e-6));

    assert_eq!(reader.read(SensorId::Outer).unwrap(), Reading::NoEcho, "below min distance");
    assert_eq!(reader.read(SensorId::Inner).unwrap(), Reading::NoEcho, "beyond max distance");
    assert_eq!(reader.read_triggered(SensorId::Inner).unwrap(), (false, Reading::NoEcho), "timeout");

    let (triggered, reading) = reader.read_triggered(SensorId::Inner).unwrap();
    assert!(!triggered, "150cm is beyond the 100cm threshold");
    assert!(reading.distance().is_some());
}

/// Pins driven by a scripted echo/charge line.
#[derive(Default)]
struct FakePins {
    /// Number of reads for which the line stays low, then high for `high_reads`.
    low_reads: usize,
    high_reads: usize,
    reads: AtomicUsize,
    broken: bool,
    writes: Mutex<Vec<(u8, bool)>>,
    modes: Mutex<HashMap<u8, PinMode>>,
}

impl DigitalPins for FakePins {
    fn set_mode(&self, pin: u8, mode: PinMode) -> io::Result<()> {
        self.modes.lock().unwrap().insert(pin, mode);
        Ok(())
    }

    fn write(&self, pin: u8, high: bool) -> io::Result<()> {
        self.writes.lock().unwrap().push((pin, high));
        Ok(())
    }

    fn read(&self, _pin: u8) -> io::Result<bool> {
        if self.broken {
            return Err(io::Error::new(io::ErrorKind::Other, "gpio unavailable"));
        }
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(n >= self.low_reads && n < self.low_reads + self.high_reads)
    }
}

#[test]
fn test_gpio_echo_timing() {
    let config = fast_sensors();
    let pins = FakePins {
        low_reads: 3,
        high_reads: 20,
        ..Default::default()
    };
    let transport = GpioTransport::new(pins, PinMap::default(), &config.sensors).unwrap();

    let echo = transport.trigger_and_time_echo(SensorId::Outer).unwrap();
    assert!(echo.is_some(), "rise and fall both seen");
}

#[test]
fn test_gpio_echo_timeout_is_no_reading() {
    let config = fast_sensors();
    let never_rises = FakePins {
        low_reads: usize::MAX / 2,
        ..Default::default()
    };
    let transport = GpioTransport::new(never_rises, PinMap::default(), &config.sensors).unwrap();
    assert_eq!(transport.trigger_and_time_echo(SensorId::Inner).unwrap(), None);

    let stuck_high = FakePins {
        high_reads: usize::MAX / 2,
        ..Default::default()
    };
    let transport = GpioTransport::new(stuck_high, PinMap::default(), &config.sensors).unwrap();
    assert_eq!(transport.trigger_and_time_echo(SensorId::Inner).unwrap(), None, "fall never seen");
}

#[test]
fn test_gpio_read_fault_is_transport_error() {
    let config = fast_sensors();
    let pins = FakePins {
        broken: true,
        ..Default::default()
    };
    let transport = GpioTransport::new(pins, PinMap::default(), &config.sensors).unwrap();

    let err = transport.trigger_and_time_echo(SensorId::Outer).unwrap_err();
    assert!(matches!(err, SensorError::Transport { sensor: SensorId::Outer, .. }));

    let err = transport.discharge_and_time_high(4).unwrap_err();
    assert!(matches!(err, SensorError::Node { node: 4, .. }));
}

#[test]
fn test_gpio_charge_timing() {
    let config = fast_sensors();
    let charges = FakePins {
        low_reads: 5,
        high_reads: usize::MAX / 2,
        ..Default::default()
    };
    let transport = GpioTransport::new(charges, PinMap::default(), &config.sensors).unwrap();
    assert!(transport.discharge_and_time_high(4).unwrap().is_some());

    let never_charges = FakePins {
        low_reads: usize::MAX / 2,
        ..Default::default()
    };
    let transport = GpioTransport::new(never_charges, PinMap::default(), &config.sensors).unwrap();
    assert_eq!(transport.discharge_and_time_high(4).unwrap(), None);
}

#[test]
fn test_brightness_read_bounded_when_node_never_charges() {
    let config = Config::defaults().unwrap();
    let never_charges = FakePins {
        low_reads: usize::MAX / 2,
        ..Default::default()
    };
    let transport = Arc::new(GpioTransport::new(never_charges, PinMap::default(), &config.sensors).unwrap());
    let reader = BrightnessReader::new(transport, &config.sensors);

    let started = Instant::now();
    let reading = reader.classify();
    let took = started.elapsed();

    assert!(reading.is_dark, "no sample at all reads as dark");
    assert_eq!(reading.median, None);
    assert!(
        took < config.sensors.charge_timeout + Duration::from_secs(1),
        "classify took {:?}, expected about one charge timeout",
        took
    );
}

#[test]
fn test_brightness_read_stops_at_deadline_with_partial_samples() {
    let mut raw = RawConfig::default();
    raw.sensors.charge_timeout = 0.05;
    raw.sensors.sample_delay = 0.03;
    let config = Config::try_from(raw).unwrap();

    let transport = Arc::new(QueuedTransport::default());
    transport.charges.lock().unwrap().extend([Ok(secs(0.7)); 7]);
    let reader = BrightnessReader::new(Arc::clone(&transport), &config.sensors);

    let reading = reader.classify();
    let left = transport.charges.lock().unwrap().len();
    assert!(left > 0, "sampling stops once the deadline passes");
    assert!(left < 7, "at least one sample is always taken");
    assert!(reading.is_dark);
    assert_eq!(reading.median, secs(0.7));
}
