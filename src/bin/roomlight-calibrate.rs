use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use roomlight::calibration::{self, SensorKind};
use roomlight::config::Config;
use roomlight::sensors::simulated::SimulatedTransport;
use roomlight::sensors::{BrightnessReader, RangeReader, SensorId};

#[derive(Parser, Debug)]
#[command(about = "Collect sensor samples and recommend trigger thresholds", version)]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Record samples from the simulated transport into a CSV file
    ///
    /// No GPIO driver is wired into this binary, so samples come from the
    /// simulated walk cycle. Record real data with a build that passes a
    /// `GpioTransport` to the readers.
    Collect {
        #[arg(value_enum)]
        sensor: SensorArg,
        #[arg(value_enum)]
        mode: Mode,
        /// Number of samples
        #[arg(short = 'n', long, default_value_t = 120)]
        samples: usize,
        /// Seconds between samples
        #[arg(long, default_value_t = 0.08)]
        delay: f64,
        /// Output file (default: samples_<sensor>_<mode>_<unix time>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Path to config file
        #[arg(short, long, default_value = "roomlight.toml")]
        config: PathBuf,
    },
    /// Compare a baseline and an occupied CSV and recommend a threshold
    Analyze {
        #[arg(value_enum)]
        sensor: SensorArg,
        baseline: PathBuf,
        occupied: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SensorArg {
    /// Room-side range sensor
    Us1,
    /// Doorway-side range sensor
    Us2,
    /// RC brightness node
    Ldr,
}

impl SensorArg {
    fn kind(self) -> SensorKind {
        match self {
            SensorArg::Us1 | SensorArg::Us2 => SensorKind::Range,
            SensorArg::Ldr => SensorKind::Brightness,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    /// Empty room / bright
    Baseline,
    /// Person in range / dark
    Occupied,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    match args.command {
        Cmd::Collect {
            sensor,
            mode,
            samples,
            delay,
            output,
            config,
        } => collect(sensor, mode, samples, delay, output, &config),
        Cmd::Analyze {
            sensor,
            baseline,
            occupied,
        } => analyze(sensor, &baseline, &occupied),
    }
}

fn collect(
    sensor: SensorArg,
    mode: Mode,
    count: usize,
    delay: f64,
    output: Option<PathBuf>,
    config_path: &Path,
) -> anyhow::Result<()> {
    let config = Config::load(config_path).or_else(|_| Config::defaults().map_err(anyhow::Error::from))?;
    let delay = Duration::try_from_secs_f64(delay).context("Invalid sample delay")?;
    let transport = Arc::new(SimulatedTransport::default());
    let range = RangeReader::new(Arc::clone(&transport), &config.sensors);
    let brightness = BrightnessReader::new(transport, &config.sensors);

    println!("Collecting {} {:?} samples for {:?}, {:?} apart", count, mode, sensor, delay);
    let samples = calibration::collect_samples(count, delay, || match sensor {
        SensorArg::Us1 => range.read(SensorId::Inner).map(|r| r.distance()),
        SensorArg::Us2 => range.read(SensorId::Outer).map(|r| r.distance()),
        SensorArg::Ldr => brightness.measure().map(|t| t.map(|d| d.as_secs_f64())),
    });

    let path = output.unwrap_or_else(|| {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        PathBuf::from(format!("samples_{:?}_{:?}_{}.csv", sensor, mode, now).to_lowercase())
    });
    let file = File::create(&path).context(format!("Failed to create {:?}", path))?;
    calibration::write_csv(&samples, BufWriter::new(file))?;
    println!("Saved {} samples to {:?}", samples.len(), path);
    Ok(())
}

fn analyze(sensor: SensorArg, baseline: &Path, occupied: &Path) -> anyhow::Result<()> {
    let read = |path: &Path| {
        fs::read_to_string(path)
            .map(|c| calibration::parse_csv(&c))
            .context(format!("Failed to read samples from {:?}", path))
    };
    let recommendation = calibration::recommend_threshold(sensor.kind(), &read(baseline)?, &read(occupied)?)?;

    println!("--- Analysis ---");
    println!("Baseline: {}", serde_json::to_string_pretty(&recommendation.baseline)?);
    println!("Occupied: {}", serde_json::to_string_pretty(&recommendation.occupied)?);
    match sensor.kind() {
        SensorKind::Brightness => {
            println!(
                "Recommended brightness_threshold: {} s ({})",
                recommendation.threshold, recommendation.rationale
            );
            println!("Median charge time above the threshold reads as dark.");
        }
        SensorKind::Range => println!(
            "Recommended {:?} threshold: {} cm ({})",
            sensor, recommendation.threshold, recommendation.rationale
        ),
    }
    Ok(())
}
