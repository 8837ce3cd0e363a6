//! # Mapping Store
//!
//! Durable single-profile persistence of one [`Mapping`] as JSON.
//!
//! The storage location is injected by the caller; the store never resolves
//! paths on its own. Saves go through a temporary file in the target
//! directory and an atomic rename, so a failed save never leaves a partial
//! profile behind for the next [`MappingStore::load`].

use std::fs;
use std::future::Future;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use super::Mapping;
use crate::error::{BridgeError, Result};

/// Persists and restores the calibration profile
#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
}

impl MappingStore {
    /// Creates a store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored mapping
    ///
    /// # Errors
    ///
    /// - `MappingNotFound` if nothing has been stored yet
    /// - `MappingCorrupt` if the file is not a well-formed mapping
    /// - `Io` for any other read failure
    pub fn load(&self) -> Result<Mapping> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BridgeError::MappingNotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        // Deserializing also checks the distinctness invariants
        serde_json::from_str(&contents).map_err(|e| BridgeError::MappingCorrupt(e.to_string()))
    }

    /// Replaces the stored mapping
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created or the file cannot be
    /// written or renamed into place. The previous profile, if any, is left
    /// untouched in that case.
    pub fn save(&self, mapping: &Mapping) -> Result<()> {
        let json = serde_json::to_string_pretty(mapping)
            .map_err(|e| BridgeError::Io(e.into()))?;

        self.replace_with(|file| {
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")
        })
    }

    /// Fills a temporary file next to the profile with `write`, then renames
    /// it over the profile
    ///
    /// If `write` fails the temporary file is deleted and the profile is
    /// left as it was.
    fn replace_with<F>(&self, write: F) -> Result<()>
    where
        F: FnOnce(&mut NamedTempFile) -> io::Result<()>,
    {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        write(&mut tmp)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| BridgeError::Io(e.error))?;

        Ok(())
    }

    /// Returns the stored mapping, or runs `calibrate` and stores its result
    ///
    /// Calibration runs when `force_calibration` is set, when nothing is
    /// stored, or when the stored profile is unreadable. A failure to save
    /// the new mapping is logged but does not discard it: the mapping is
    /// still returned for the current run.
    ///
    /// # Errors
    ///
    /// Only errors from `calibrate` itself are returned.
    pub async fn load_or_calibrate<F, Fut>(&self, force_calibration: bool, calibrate: F) -> Result<Mapping>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Mapping>>,
    {
        if !force_calibration {
            match self.load() {
                Ok(mapping) => {
                    info!("Loaded mapping from {}", self.path.display());
                    return Ok(mapping);
                }
                Err(BridgeError::MappingNotFound(_)) => {
                    info!("No stored mapping at {}, calibrating", self.path.display());
                }
                Err(e) => {
                    warn!("Failed to read mapping: {}. Re-calibrating", e);
                }
            }
        }

        let mapping = calibrate().await?;

        match self.save(&mapping) {
            Ok(()) => info!("Mapping saved to {}", self.path.display()),
            Err(e) => error!(
                "Failed to save mapping to {}: {}. Calibration will be needed again next start",
                self.path.display(),
                e
            ),
        }

        Ok(mapping)
    }
}
