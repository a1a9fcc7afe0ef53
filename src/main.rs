use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use roomlight::config::{Config, RawConfig};
use roomlight::kernel::button::ButtonInput;
use roomlight::kernel::engine::EngineHandle;
use roomlight::kernel::gesture::GestureClassifier;
use roomlight::lights::{LightActuator, LightBank, LightSource};
use roomlight::sensors::simulated::SimulatedTransport;
use roomlight::OccupancyEngine;

#[derive(Parser, Debug)]
#[command(about, version)]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "roomlight.toml")]
    config: PathBuf,

    /// Print an example config file and exit
    #[arg(long)]
    print_config: bool,

    /// Length of one simulated walk cycle, in seconds
    #[arg(long, default_value_t = 60)]
    cycle: u64,
}

/// Console stand-ins for the button hardware.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Press(String),
    Hold(String),
    Down(String),
    Up(String),
    Status,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let channel = words.next().map(str::to_string);
        match (verb.as_str(), channel) {
            ("status", _) => Ok(Command::Status),
            ("press", Some(c)) => Ok(Command::Press(c)),
            ("hold", Some(c)) => Ok(Command::Hold(c)),
            ("down", Some(c)) => Ok(Command::Down(c)),
            ("up", Some(c)) => Ok(Command::Up(c)),
            _ => Err(format!("unrecognised command '{}'", line.trim())),
        }
    }
}

struct House {
    lights: Arc<LightBank>,
    engine: EngineHandle<LightBank>,
    classifier: GestureClassifier<LightBank>,
    buttons: BTreeMap<String, ButtonInput<LightBank>>,
}

impl House {
    async fn handle(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Press(c) => {
                self.classifier.press(&c);
            }
            Command::Hold(c) => {
                self.classifier.held(&c);
            }
            Command::Down(c) | Command::Up(c) if !self.buttons.contains_key(&c) => {
                warn!(channel = %c, "no button on this channel");
            }
            Command::Down(c) => self.buttons[&c].set_level(true),
            Command::Up(c) => self.buttons[&c].set_level(false),
            Command::Status => {
                let status = serde_json::json!({
                    "occupancy": self.engine.state().await,
                    "lights": self.lights.snapshot(),
                    "pending_single_press": self.classifier.pending_channels(),
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
        }
        Ok(())
    }

    async fn shutdown(self) {
        self.engine.shutdown().await;
        for button in self.buttons.values() {
            button.cancel();
        }
        let cancelled = self.classifier.cancel_all();
        self.lights.all_off(LightSource::System);
        info!(cancelled, "roomlight stopped");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", toml::to_string(&RawConfig::example())?);
        return Ok(());
    }

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config, using defaults: {:#}", e);
            Config::defaults()?
        }
    };
    info!(
        room = %config.lights.room_channel,
        exit_delay = ?config.occupancy.exit_delay,
        us1_threshold = config.sensors.inner_threshold_cm,
        us2_threshold = config.sensors.outer_threshold_cm,
        "roomlight booting (simulated sensors)"
    );

    let lights = Arc::new(LightBank::new(config.lights.channels.clone()));
    let transport = Arc::new(SimulatedTransport::new(Duration::from_secs(args.cycle)));
    let engine = OccupancyEngine::new(transport, Arc::clone(&lights), &config).spawn();
    let classifier = GestureClassifier::new(Arc::clone(&lights), &config.buttons);
    let buttons = config
        .lights
        .channels
        .iter()
        .map(|c| (c.clone(), ButtonInput::new(c, classifier.clone(), &config.buttons)))
        .collect();
    let house = House {
        lights,
        engine,
        classifier,
        buttons,
    };

    let (tx, mut rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(command) => {
                    if tx.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{} (try: press|hold|down|up <channel>, status)", e),
            }
        }
    });

    info!("roomlight active. Press Ctrl+C to stop.");
    let mut console_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            command = rx.recv(), if console_open => match command {
                Some(command) => house.handle(command).await?,
                None => console_open = false,
            },
        }
    }

    house.shutdown().await;
    Ok(())
}
