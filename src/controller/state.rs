//! # Controller State Tracking
//!
//! Folds raw evdev events into a [`GamepadState`]: normalized axis values
//! and the set of held buttons.
//!
//! ## Axis indices
//!
//! Physical axis indices are ordinal positions within the device's supported
//! absolute axes, in ascending evdev code order. On a typical gamepad:
//!
//! | Index | evdev Code | Usually |
//! |-------|------------|---------|
//! | 0 | ABS_X | Left stick X |
//! | 1 | ABS_Y | Left stick Y |
//! | 2 | ABS_Z | Left trigger or right stick X |
//! | 3 | ABS_RX | Right stick X or left trigger |
//! | ... | ... | ... |
//!
//! The mapping never relies on that table; calibration discovers it.
//!
//! ## Button identities
//!
//! Buttons are identified by their evdev key code (e.g. `BTN_SOUTH` = 304).
//! Key events with value 1 are presses, 0 releases, and 2 (auto-repeat) is
//! ignored so a held button never produces a second press.

use evdev::{InputEvent, InputEventKind};
use std::collections::BTreeSet;

use super::input::ControllerEvent;
use crate::mapping::ButtonId;

/// evdev key event value for a press
const KEY_PRESSED: i32 = 1;
/// evdev key event value for a release
const KEY_RELEASED: i32 = 0;

/// Range and live value of one absolute axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    /// evdev absolute axis code
    pub code: u16,
    pub minimum: i32,
    pub maximum: i32,
    pub value: i32,
}

impl AxisRange {
    /// Current value on the normalized scale
    #[must_use]
    pub fn normalized(&self) -> f32 {
        normalize_axis(self.value, self.minimum, self.maximum)
    }
}

/// Maps a raw axis reading into `-1.0..=1.0`
///
/// `minimum` maps to -1.0 and `maximum` to 1.0. A degenerate range reads as
/// centered.
///
/// # Examples
///
/// ```
/// use elrs_gamepad::controller::state::normalize_axis;
///
/// assert_eq!(normalize_axis(0, 0, 255), -1.0);
/// assert_eq!(normalize_axis(255, 0, 255), 1.0);
/// assert!(normalize_axis(128, 0, 255).abs() < 0.01);
/// assert_eq!(normalize_axis(-1, -1, 1), -1.0);
/// ```
#[must_use]
pub fn normalize_axis(value: i32, minimum: i32, maximum: i32) -> f32 {
    if maximum <= minimum {
        return 0.0;
    }
    let span = f64::from(maximum) - f64::from(minimum);
    let offset = f64::from(value) - f64::from(minimum);
    ((offset / span) * 2.0 - 1.0).clamp(-1.0, 1.0) as f32
}

/// Accumulated state of one controller
#[derive(Debug, Clone, Default)]
pub struct GamepadState {
    axes: Vec<AxisRange>,
    held: BTreeSet<ButtonId>,
}

impl GamepadState {
    /// Creates a state over `axes`, which must be sorted by code
    #[must_use]
    pub fn new(axes: Vec<AxisRange>) -> Self {
        Self {
            axes,
            held: BTreeSet::new(),
        }
    }

    pub fn num_axes(&self) -> usize {
        self.axes.len()
    }

    /// Normalized value of axis `index`, `0.0` if out of range
    pub fn axis_value(&self, index: usize) -> f32 {
        self.axes.get(index).map_or(0.0, AxisRange::normalized)
    }

    pub fn button_pressed(&self, button: ButtonId) -> bool {
        self.held.contains(&button)
    }

    /// Applies one evdev event, returning the button edge it caused, if any
    pub fn process_event(&mut self, event: &InputEvent) -> Option<ControllerEvent> {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => {
                if let Some(range) = self.axes.iter_mut().find(|r| r.code == axis.0) {
                    range.value = event.value();
                }
                None
            }
            InputEventKind::Key(key) => self.process_key(key.code(), event.value()),
            _ => None,
        }
    }

    fn process_key(&mut self, code: u16, value: i32) -> Option<ControllerEvent> {
        match value {
            // The set check turns a duplicate press report into a no-op
            KEY_PRESSED if self.held.insert(code) => Some(ControllerEvent::ButtonPressed(code)),
            KEY_RELEASED if self.held.remove(&code) => Some(ControllerEvent::ButtonReleased(code)),
            _ => None,
        }
    }
}
