//! # ELRS Gamepad
//!
//! Fly an ExpressLRS-linked vehicle with a game controller.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse the command line and set up logging
//!    - Load configuration and apply command line overrides
//!    - Open the controller
//!
//! 2. **Mapping**
//!    - Load the stored mapping, or run interactive calibration when none is
//!      stored, it is unreadable, or `--calibrate` is given
//!
//! 3. **Main Loop**
//!    - Link task: send the latest frame to the ELRS module at the packet rate
//!    - Runtime loop: poll the controller, map it to a frame, publish it
//!
//! 4. **Shutdown**
//!    - Ctrl+C stops both loops cleanly
//!    - Losing the controller stops both loops with an error
//!
//! ```text
//! INFO elrs_gamepad: ELRS Gamepad v0.1.0 starting...
//! INFO elrs_gamepad::controller::gamepad: Using controller "Xbox Wireless Controller" at /dev/input/event17
//! INFO elrs_gamepad::mapping::store: Loaded mapping from /home/pilot/.config/elrs_gamepad/mapping.json
//! INFO elrs_gamepad::serial: Opened ELRS module at /dev/ttyUSB0 (921600 baud)
//! INFO elrs_gamepad: Streaming at 50Hz, press Ctrl+C to exit
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use elrs_gamepad::config::Config;
use elrs_gamepad::controller::calibration::Calibrator;
use elrs_gamepad::controller::channel_mapper::RuntimeMapper;
use elrs_gamepad::controller::gamepad::Gamepad;
use elrs_gamepad::controller::input::InputSource;
use elrs_gamepad::link::run_link;
use elrs_gamepad::mapping::store::MappingStore;
use elrs_gamepad::serial::ElrsSerial;

/// Number of runtime cycles between status log messages
const LOG_INTERVAL_CYCLES: u64 = 500;

#[derive(Parser, Debug)]
#[command(name = "elrs-gamepad", version)]
#[command(about = "Game controller to ExpressLRS bridge")]
struct Cli {
    /// Config file (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run calibration even if a mapping is stored
    #[arg(long)]
    calibrate: bool,

    /// Serial port of the ELRS module
    #[arg(long)]
    port: Option<String>,

    /// Baud rate of the ELRS module
    #[arg(long)]
    baud: Option<u32>,

    /// Mapping file (default: ~/.config/elrs_gamepad/mapping.json)
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// evdev node of the controller; auto-detected when omitted
    #[arg(long)]
    device: Option<PathBuf>,
}

impl Cli {
    /// Builds the effective configuration: file (or defaults), then flags
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(mapping) = &self.mapping {
            config.calibration.mapping_file = Some(mapping.clone());
        }
        if let Some(device) = &self.device {
            config.controller.device_path = device.display().to_string();
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Period of a loop running at `hz` cycles per second
fn period_from_hz(hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(hz.max(1)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("ELRS Gamepad v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = cli.resolve_config()?;

    let device_path = Some(config.controller.device_path.as_str())
        .filter(|path| !path.is_empty())
        .map(Path::new);
    let mut pad = Gamepad::open(device_path)?;

    let store = MappingStore::new(config.calibration.mapping_path());
    let calibration = &config.calibration;
    let pad_ref = &mut pad;
    let mapping = store
        .load_or_calibrate(cli.calibrate, move || async move {
            let mut calibrator = Calibrator::new(pad_ref, calibration);
            calibrator.run().await
        })
        .await?;
    debug!("Active mapping: {:?}", mapping);

    let mapper = RuntimeMapper::new(mapping);
    pad.pump()?;
    let (frame_tx, frame_rx) = watch::channel(mapper.map_cycle(&pad));

    let link = ElrsSerial::open(&config.serial)?;
    let link_task = tokio::spawn(run_link(
        link,
        frame_rx,
        period_from_hz(config.link.packet_rate_hz),
        Duration::from_millis(config.serial.reconnect_interval_ms),
    ));

    let mut ticker = interval(period_from_hz(config.controller.poll_rate_hz));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Streaming at {}Hz, press Ctrl+C to exit",
        config.controller.poll_rate_hz
    );

    let mut cycles: u64 = 0;
    let outcome: Result<()> = loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = pad.pump() {
                    break Err(e).context("Controller lost");
                }
                // Frames come from held state; button edges only matter to calibration
                pad.poll_events();
                frame_tx.send_replace(mapper.map_cycle(&pad));

                cycles += 1;
                if cycles % LOG_INTERVAL_CYCLES == 0 {
                    debug!("Runtime cycles: {}, latest frame {:?}", cycles, &*frame_tx.borrow());
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break Ok(());
            }
        }
    };

    // Closing the channel ends the link task
    drop(frame_tx);
    match link_task.await {
        Ok(stats) => info!(
            "Total cycles: {}, frames sent: {}, link failures: {}",
            cycles, stats.frames_sent, stats.send_failures
        ),
        Err(e) => warn!("Link task ended abnormally: {}", e),
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_period_from_hz() {
        assert_eq!(period_from_hz(50), Duration::from_millis(20));
        assert_eq!(period_from_hz(500), Duration::from_millis(2));
        // A zero rate is rejected by validation, but must not divide by zero
        assert_eq!(period_from_hz(0), Duration::from_secs(1));
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "elrs-gamepad",
            "--calibrate",
            "--port",
            "/dev/ttyACM0",
            "--baud",
            "420000",
            "--mapping",
            "/tmp/profile.json",
            "--device",
            "/dev/input/event5",
        ]);
        assert!(cli.calibrate);

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 420_000);
        assert_eq!(config.calibration.mapping_path(), PathBuf::from("/tmp/profile.json"));
        assert_eq!(config.controller.device_path, "/dev/input/event5");
    }

    #[test]
    fn test_no_flags_uses_defaults() {
        let cli = Cli::parse_from(["elrs-gamepad"]);
        assert!(!cli.calibrate);

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 921_600);
        assert!(config.controller.device_path.is_empty());
    }

    #[test]
    fn test_invalid_baud_flag_rejected() {
        let cli = Cli::parse_from(["elrs-gamepad", "--baud", "9600"]);
        assert!(cli.resolve_config().is_err());
    }

    #[test]
    fn test_log_interval_is_ten_seconds_at_default_rate() {
        assert_eq!(LOG_INTERVAL_CYCLES / 50, 10);
    }
}
