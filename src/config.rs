//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field carries a default, so an empty file (or no file at all, via
//! [`Config::default`]) yields a usable configuration.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::controller::calibration::DEFAULT_THRESHOLD;
use crate::error::{BridgeError, Result};

/// Name of the per-user directory holding the stored mapping
const APP_DIR_NAME: &str = "elrs_gamepad";

/// File name of the stored mapping
const MAPPING_FILE_NAME: &str = "mapping.json";

/// Baud rates accepted by ELRS transmitter modules
const VALID_BAUD_RATES: [u32; 6] = [115200, 400000, 420000, 921600, 1870000, 3750000];

/// Packet rates the link sink may run at
const VALID_PACKET_RATES: [u32; 4] = [50, 150, 250, 500];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub link: LinkConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ControllerConfig {
    /// Explicit evdev node; empty means auto-detect
    #[serde(default)]
    pub device_path: String,

    /// Runtime cycle cadence
    #[serde(default = "default_poll_rate_hz")]
    pub poll_rate_hz: u32,
}

/// Calibration configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    /// Minimum displacement from baseline, on the normalized [-1, 1] scale
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
}

/// Link sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_packet_rate_hz")]
    pub packet_rate_hz: u32,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 921600 }
fn default_timeout_ms() -> u64 { 100 }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_poll_rate_hz() -> u32 { 50 }

fn default_threshold() -> f32 { DEFAULT_THRESHOLD }
fn default_poll_interval_ms() -> u64 { 10 }

fn default_packet_rate_hz() -> u32 { 50 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            poll_rate_hz: default_poll_rate_hz(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
            mapping_file: None,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            packet_rate_hz: default_packet_rate_hz(),
        }
    }
}

impl CalibrationConfig {
    /// Location of the stored mapping
    ///
    /// Falls back to `<user config dir>/elrs_gamepad/mapping.json` when no
    /// explicit `mapping_file` is configured.
    pub fn mapping_path(&self) -> PathBuf {
        self.mapping_file.clone().unwrap_or_else(default_mapping_path)
    }
}

/// Default mapping location under the per-user config directory
pub fn default_mapping_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(MAPPING_FILE_NAME)
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use elrs_gamepad::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !VALID_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 115200, 400000, 420000, 921600, 1870000, 3750000",
            ));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.controller.poll_rate_hz == 0 || self.controller.poll_rate_hz > 1000 {
            return Err(invalid("poll_rate_hz must be between 1 and 1000"));
        }

        // NaN fails both comparisons, so test for the valid range instead
        let threshold = self.calibration.threshold;
        if !(threshold > 0.0 && threshold <= 2.0) {
            return Err(invalid("calibration threshold must be in (0.0, 2.0]"));
        }

        if self.calibration.poll_interval_ms == 0 || self.calibration.poll_interval_ms > 1000 {
            return Err(invalid("calibration poll_interval_ms must be between 1 and 1000"));
        }

        if !VALID_PACKET_RATES.contains(&self.link.packet_rate_hz) {
            return Err(invalid("packet_rate_hz must be one of: 50, 150, 250, 500"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.link.packet_rate_hz, 50);
        assert_eq!(config.controller.poll_rate_hz, 50);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyACM0"
baud_rate = 420000

[calibration]
threshold = 0.5
mapping_file = "/tmp/profile.json"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 420000);
        assert!((config.calibration.threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(
            config.calibration.mapping_path(),
            PathBuf::from("/tmp/profile.json")
        );
        // Untouched sections fall back to defaults
        assert_eq!(config.link.packet_rate_hz, 50);
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 921600);
    }

    #[test]
    fn test_load_invalid_toml() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[serial\nport = ").unwrap();
        temp_file.flush().unwrap();

        assert!(matches!(
            Config::load(temp_file.path()),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/elrs_gamepad.toml"),
            Err(BridgeError::Io(_))
        ));
    }

    #[test]
    fn test_default_mapping_path() {
        let config = Config::default();
        let path = config.calibration.mapping_path();
        assert!(path.ends_with("elrs_gamepad/mapping.json"));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 9600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in &VALID_BAUD_RATES {
            let mut config = Config::default();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_timeout_ms_bounds() {
        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
        config.serial.timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconnect_interval_bounds() {
        let mut config = Config::default();
        config.serial.reconnect_interval_ms = 0;
        assert!(config.validate().is_err());
        config.serial.reconnect_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_rate_bounds() {
        let mut config = Config::default();
        config.controller.poll_rate_hz = 0;
        assert!(config.validate().is_err());
        config.controller.poll_rate_hz = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        let mut config = Config::default();
        config.calibration.threshold = 0.0;
        assert!(config.validate().is_err());
        config.calibration.threshold = 2.5;
        assert!(config.validate().is_err());
        config.calibration.threshold = f32::NAN;
        assert!(config.validate().is_err());
        config.calibration.threshold = 2.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_calibration_poll_interval_bounds() {
        let mut config = Config::default();
        config.calibration.poll_interval_ms = 0;
        assert!(config.validate().is_err());
        config.calibration.poll_interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_packet_rate() {
        let mut config = Config::default();
        config.link.packet_rate_hz = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_packet_rates() {
        for &rate in &VALID_PACKET_RATES {
            let mut config = Config::default();
            config.link.packet_rate_hz = rate;
            assert!(config.validate().is_ok(), "Packet rate {} should be valid", rate);
        }
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyUSB0");
        assert_eq!(default_baud_rate(), 921600);
        assert_eq!(default_timeout_ms(), 100);
        assert_eq!(default_reconnect_interval_ms(), 1000);
        assert_eq!(default_poll_rate_hz(), 50);
        assert_eq!(default_threshold(), DEFAULT_THRESHOLD);
        assert_eq!(CalibrationConfig::default().threshold, 0.6);
        assert_eq!(default_poll_interval_ms(), 10);
        assert_eq!(default_packet_rate_hz(), 50);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config: Config = toml::from_str(include_str!("../config/default.toml")).unwrap();
        assert!(config.validate().is_ok());

        let defaults = Config::default();
        assert_eq!(config.serial.port, defaults.serial.port);
        assert_eq!(config.serial.baud_rate, defaults.serial.baud_rate);
        assert_eq!(config.serial.timeout_ms, defaults.serial.timeout_ms);
        assert_eq!(config.controller.poll_rate_hz, defaults.controller.poll_rate_hz);
        assert_eq!(config.calibration.threshold, defaults.calibration.threshold);
        assert_eq!(config.calibration.mapping_file, None);
        assert_eq!(config.link.packet_rate_hz, defaults.link.packet_rate_hz);
    }
}
