//! # Gamepad Input Source
//!
//! Detects a game controller through the Linux evdev interface and exposes it
//! as an [`InputSource`].
//!
//! ## Controller Detection
//!
//! Any event device that reports absolute axes together with gamepad
//! (`BTN_SOUTH`) or joystick (`BTN_TRIGGER`) buttons qualifies. Without an
//! explicit device path, `/dev/input/event*` nodes are scanned in sorted
//! order and the first match wins.
//!
//! ## Reading
//!
//! A tokio task owns the evdev event stream and folds events into a shared
//! [`GamepadState`]. [`InputSource::pump`] copies that state and drains the
//! queued button edges, so reads between pumps are stable.

use evdev::{Device, Key};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::input::{ControllerEvent, InputSource};
use super::state::{AxisRange, GamepadState};
use crate::error::{BridgeError, Result};
use crate::mapping::ButtonId;

/// Directory scanned for event devices
const INPUT_DIR: &str = "/dev/input";

/// Button edges kept between `poll_events` calls; older ones are dropped
const MAX_PENDING_EVENTS: usize = 64;

/// A connected game controller
pub struct Gamepad {
    shared: Arc<Mutex<GamepadState>>,
    snapshot: GamepadState,
    events: mpsc::UnboundedReceiver<ControllerEvent>,
    pending: VecDeque<ControllerEvent>,
    reader: JoinHandle<()>,
    device_path: String,
    name: String,
}

impl std::fmt::Debug for Gamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gamepad")
            .field("device_path", &self.device_path)
            .field("name", &self.name)
            .field("axes", &self.snapshot.num_axes())
            .finish_non_exhaustive()
    }
}

impl Gamepad {
    /// Opens the controller at `device_path`, or the first one found
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `NoInputDevice`: auto-detection found no controller
    /// - `Controller`: the given device cannot be opened or is not a controller
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use elrs_gamepad::controller::gamepad::Gamepad;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let pad = Gamepad::open(None)?;
    ///     println!("Using {} at {}", pad.name(), pad.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(device_path: Option<&Path>) -> Result<Self> {
        let (device, path) = match device_path {
            Some(path) => {
                let device = Device::open(path).map_err(|e| {
                    BridgeError::Controller(format!("Failed to open {}: {}", path.display(), e))
                })?;
                if !is_controller(&device) {
                    return Err(BridgeError::Controller(format!(
                        "{} does not look like a game controller",
                        path.display()
                    )));
                }
                (device, path.to_path_buf())
            }
            None => find_controller()?,
        };

        Self::start(device, path)
    }

    fn start(device: Device, path: PathBuf) -> Result<Self> {
        let device_path = path.to_string_lossy().to_string();
        let name = device.name().unwrap_or("Unknown controller").to_string();
        let state = GamepadState::new(axis_ranges(&device)?);

        info!(
            "Using controller \"{}\" at {} ({} axes)",
            name,
            device_path,
            state.num_axes()
        );

        let mut stream = device.into_event_stream().map_err(|e| {
            BridgeError::Controller(format!("Failed to stream events from {}: {}", device_path, e))
        })?;

        let shared = Arc::new(Mutex::new(state.clone()));
        let (tx, rx) = mpsc::unbounded_channel();

        let reader_state = Arc::clone(&shared);
        let reader_path = device_path.clone();
        let reader = tokio::spawn(async move {
            loop {
                match stream.next_event().await {
                    Ok(event) => {
                        let edge = reader_state
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .process_event(&event);
                        if let Some(edge) = edge {
                            if tx.send(edge).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Controller {} stopped reporting: {}", reader_path, e);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            shared,
            snapshot: state,
            events: rx,
            pending: VecDeque::new(),
            reader,
            device_path,
            name,
        })
    }

    /// Path of the evdev node in use
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Human-readable device name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Gamepad {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl InputSource for Gamepad {
    fn pump(&mut self) -> Result<()> {
        while let Ok(event) = self.events.try_recv() {
            if self.pending.len() == MAX_PENDING_EVENTS {
                self.pending.pop_front();
            }
            self.pending.push_back(event);
        }
        self.snapshot = self
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if self.reader.is_finished() {
            return Err(BridgeError::Controller(format!(
                "Controller at {} disconnected",
                self.device_path
            )));
        }
        Ok(())
    }

    fn num_axes(&self) -> usize {
        self.snapshot.num_axes()
    }

    fn axis_value(&self, index: usize) -> f32 {
        self.snapshot.axis_value(index)
    }

    fn button_pressed(&self, button: ButtonId) -> bool {
        self.snapshot.button_pressed(button)
    }

    fn poll_events(&mut self) -> Vec<ControllerEvent> {
        self.pending.drain(..).collect()
    }
}

/// Whether `device` has both analog axes and gamepad/joystick buttons
fn is_controller(device: &Device) -> bool {
    let has_axes = device
        .supported_absolute_axes()
        .is_some_and(|axes| axes.iter().next().is_some());
    let has_buttons = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::BTN_SOUTH) || keys.contains(Key::BTN_TRIGGER));
    has_axes && has_buttons
}

/// Scans `/dev/input` for the first controller
fn find_controller() -> Result<(Device, PathBuf)> {
    let input_dir = Path::new(INPUT_DIR);
    if !input_dir.exists() {
        debug!("{} not found", INPUT_DIR);
        return Err(BridgeError::NoInputDevice);
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("event"))
        })
        .collect();

    // Deterministic choice when several controllers are attached
    entries.sort();

    for path in entries {
        match Device::open(&path) {
            Ok(device) => {
                let id = device.input_id();
                debug!(
                    "Found input device: {} (vendor: 0x{:04x}, product: 0x{:04x})",
                    path.display(),
                    id.vendor(),
                    id.product()
                );
                if is_controller(&device) {
                    return Ok((device, path));
                }
            }
            Err(e) => {
                // Permission denied or other errors - skip device
                debug!("Could not open {}: {}", path.display(), e);
            }
        }
    }

    Err(BridgeError::NoInputDevice)
}

/// Reads the range and current value of every supported absolute axis
fn axis_ranges(device: &Device) -> Result<Vec<AxisRange>> {
    let Some(supported) = device.supported_absolute_axes() else {
        return Ok(Vec::new());
    };
    let abs_state = device
        .get_abs_state()
        .map_err(|e| BridgeError::Controller(format!("Failed to read axis ranges: {}", e)))?;

    let mut ranges: Vec<AxisRange> = supported
        .iter()
        .filter_map(|axis| {
            abs_state.get(usize::from(axis.0)).map(|info| AxisRange {
                code: axis.0,
                minimum: info.minimum,
                maximum: info.maximum,
                value: info.value,
            })
        })
        .collect();
    ranges.sort_by_key(|range| range.code);

    Ok(ranges)
}
