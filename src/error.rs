//! # Error Types
//!
//! Custom error types for ELRS Gamepad using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ELRS Gamepad
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No usable game controller is attached
    #[error("No game controller found")]
    NoInputDevice,

    /// Controller open/read errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// Serial link errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// No calibration profile has been stored yet
    #[error("No stored mapping at {}", .0.display())]
    MappingNotFound(PathBuf),

    /// Stored calibration profile cannot be used
    #[error("Stored mapping is corrupt: {0}")]
    MappingCorrupt(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ELRS Gamepad
pub type Result<T> = std::result::Result<T, BridgeError>;
