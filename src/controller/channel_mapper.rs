//! # Runtime Channel Mapper
//!
//! Applies a calibrated [`Mapping`] to live controller input, producing one
//! [`ChannelFrame`] per cycle.
//!
//! ## Channel Assignments
//!
//! | Channel | Source |
//! |---------|--------|
//! | CH1-CH4 | Calibrated axes, in calibration order |
//! | CH5 | Switch A button |
//! | CH6 | Switch B button |
//! | CH7-CH16 | Neutral (1024) |
//!
//! ## Value Ranges
//!
//! - Axis input: -1.0 to 1.0 (out-of-range input is clamped)
//! - CRSF output: 0-2047 (11-bit)
//! - Switches: 0 released, 2047 pressed
//!
//! Mapping never fails: every output frame is complete and in range.
//!
//! ## Usage
//!
//! ```
//! use std::collections::BTreeSet;
//! use elrs_gamepad::controller::channel_mapper::map_cycle;
//! use elrs_gamepad::mapping::{AxisBinding, ButtonBindings, Mapping};
//!
//! let mapping = Mapping::new(
//!     [
//!         AxisBinding::new(0, false),
//!         AxisBinding::new(1, true),
//!         AxisBinding::new(2, false),
//!         AxisBinding::new(3, false),
//!     ],
//!     ButtonBindings { btn_a: 5, btn_b: 7 },
//! )?;
//! let pressed: BTreeSet<u16> = [5].into_iter().collect();
//!
//! let frame = map_cycle(&mapping, &[1.0, 1.0, -1.0, 0.0], &pressed);
//! assert_eq!(&frame[..7], &[2047, 0, 0, 1024, 2047, 0, 1024]);
//! # Ok::<(), elrs_gamepad::error::BridgeError>(())
//! ```

use std::collections::BTreeSet;

use super::input::InputSource;
use crate::crsf::protocol::{
    ChannelFrame, CRSF_CHANNEL_VALUE_CENTER, CRSF_CHANNEL_VALUE_MAX, CRSF_CHANNEL_VALUE_MIN,
    NEUTRAL_FRAME,
};
use crate::mapping::{ButtonId, Mapping};

/// CRSF value for switch OFF state.
pub const SWITCH_OFF: u16 = CRSF_CHANNEL_VALUE_MIN;

/// CRSF value for switch ON state.
pub const SWITCH_ON: u16 = CRSF_CHANNEL_VALUE_MAX;

/// Channel indices for semantic access.
pub mod channels {
    /// First calibrated axis; the others follow consecutively
    pub const FIRST_AXIS: usize = 0;
    /// Switch A button
    pub const SWITCH_A: usize = 4;
    /// Switch B button
    pub const SWITCH_B: usize = 5;
    /// First slot left at neutral
    pub const FIRST_UNASSIGNED: usize = 6;
}

/// Converts a normalized axis value to a channel value
///
/// `clamp(round((value + 1.0) * 1024), 0, 2047)`. NaN reads as neutral.
///
/// # Examples
///
/// ```
/// use elrs_gamepad::controller::channel_mapper::axis_to_channel;
///
/// assert_eq!(axis_to_channel(-1.0), 0);
/// assert_eq!(axis_to_channel(0.0), 1024);
/// assert_eq!(axis_to_channel(1.0), 2047);
/// ```
#[must_use]
pub fn axis_to_channel(value: f32) -> u16 {
    if value.is_nan() {
        return CRSF_CHANNEL_VALUE_CENTER;
    }
    let scaled = ((f64::from(value) + 1.0) * f64::from(CRSF_CHANNEL_VALUE_CENTER)).round();
    scaled.clamp(
        f64::from(CRSF_CHANNEL_VALUE_MIN),
        f64::from(CRSF_CHANNEL_VALUE_MAX),
    ) as u16
}

/// Builds one frame from raw axis values and the set of held buttons
///
/// Axes the mapping refers to but `raw_axes` lacks read as centered.
#[must_use]
pub fn map_cycle(mapping: &Mapping, raw_axes: &[f32], pressed: &BTreeSet<ButtonId>) -> ChannelFrame {
    build_frame(
        mapping,
        |index| raw_axes.get(index).copied().unwrap_or(0.0),
        |button| pressed.contains(&button),
    )
}

fn build_frame(
    mapping: &Mapping,
    axis_value: impl Fn(usize) -> f32,
    button_pressed: impl Fn(ButtonId) -> bool,
) -> ChannelFrame {
    let mut frame = NEUTRAL_FRAME;

    for (offset, binding) in mapping.axes().iter().enumerate() {
        let raw = axis_value(binding.physical_index);
        let value = if binding.inverted { -raw } else { raw };
        frame[channels::FIRST_AXIS + offset] = axis_to_channel(value);
    }

    let buttons = mapping.buttons();
    frame[channels::SWITCH_A] = switch_value(button_pressed(buttons.btn_a));
    frame[channels::SWITCH_B] = switch_value(button_pressed(buttons.btn_b));

    frame
}

#[inline]
fn switch_value(pressed: bool) -> u16 {
    if pressed {
        SWITCH_ON
    } else {
        SWITCH_OFF
    }
}

/// Holds the loaded mapping for the lifetime of the runtime loop
#[derive(Debug, Clone)]
pub struct RuntimeMapper {
    mapping: Mapping,
}

impl RuntimeMapper {
    #[must_use]
    pub fn new(mapping: Mapping) -> Self {
        Self { mapping }
    }

    /// Maps the current state of `source` to a frame
    ///
    /// Reads whatever `source` reported at its last pump.
    #[must_use]
    pub fn map_cycle<S: InputSource + ?Sized>(&self, source: &S) -> ChannelFrame {
        build_frame(
            &self.mapping,
            |index| source.axis_value(index),
            |button| source.button_pressed(button),
        )
    }
}
