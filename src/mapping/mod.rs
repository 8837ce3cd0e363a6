//! # Mapping Module
//!
//! The calibration artifact: which physical axis drives each calibrated
//! channel (and with what polarity), and which physical buttons act as the
//! two auxiliary switches.
//!
//! A [`Mapping`] is immutable once built. Construction through
//! [`Mapping::new`] and deserialization both enforce
//! that no physical axis or button is bound twice.
//!
//! ## Stored format
//!
//! ```json
//! {
//!   "axes": [
//!     { "index": 0, "inverted": false },
//!     { "index": 1, "inverted": true },
//!     { "index": 2, "inverted": false },
//!     { "index": 3, "inverted": false }
//!   ],
//!   "buttons": { "btn_a": 5, "btn_b": 7 }
//! }
//! ```

pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{BridgeError, Result};

/// Number of analog channels bound during calibration
pub const CALIBRATED_AXES: usize = 4;

/// Physical button identity as reported by the input device
pub type ButtonId = u16;

/// Binding of one calibrated channel to a physical axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisBinding {
    /// Physical axis index on the controller
    #[serde(rename = "index")]
    pub physical_index: usize,
    /// Negate the raw value before conversion
    pub inverted: bool,
}

impl AxisBinding {
    pub fn new(physical_index: usize, inverted: bool) -> Self {
        Self {
            physical_index,
            inverted,
        }
    }
}

/// The two auxiliary switch buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonBindings {
    pub btn_a: ButtonId,
    pub btn_b: ButtonId,
}

/// Complete calibration result
///
/// # Examples
///
/// ```
/// use elrs_gamepad::mapping::{AxisBinding, ButtonBindings, Mapping};
///
/// let mapping = Mapping::new(
///     [
///         AxisBinding::new(0, false),
///         AxisBinding::new(1, true),
///         AxisBinding::new(2, false),
///         AxisBinding::new(3, false),
///     ],
///     ButtonBindings { btn_a: 5, btn_b: 7 },
/// )?;
/// assert!(mapping.axes()[1].inverted);
/// # Ok::<(), elrs_gamepad::error::BridgeError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMapping")]
pub struct Mapping {
    axes: [AxisBinding; CALIBRATED_AXES],
    buttons: ButtonBindings,
}

/// Unvalidated wire form of [`Mapping`]
#[derive(Deserialize)]
struct RawMapping {
    axes: [AxisBinding; CALIBRATED_AXES],
    buttons: ButtonBindings,
}

impl TryFrom<RawMapping> for Mapping {
    type Error = BridgeError;

    fn try_from(raw: RawMapping) -> Result<Self> {
        Self::new(raw.axes, raw.buttons)
    }
}

impl Mapping {
    /// Builds a mapping, rejecting duplicate axis indices or button ids
    ///
    /// # Errors
    ///
    /// Returns `MappingCorrupt` naming the first duplicate found.
    pub fn new(axes: [AxisBinding; CALIBRATED_AXES], buttons: ButtonBindings) -> Result<Self> {
        let mapping = Self { axes, buttons };
        mapping.validate()?;
        Ok(mapping)
    }

    /// Axis bindings in channel order
    pub fn axes(&self) -> &[AxisBinding; CALIBRATED_AXES] {
        &self.axes
    }

    pub fn buttons(&self) -> ButtonBindings {
        self.buttons
    }

    /// Checks the distinctness invariants
    fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for binding in &self.axes {
            if !seen.insert(binding.physical_index) {
                return Err(BridgeError::MappingCorrupt(format!(
                    "axis {} is bound to more than one channel",
                    binding.physical_index
                )));
            }
        }

        if self.buttons.btn_a == self.buttons.btn_b {
            return Err(BridgeError::MappingCorrupt(format!(
                "button {} is bound to both switches",
                self.buttons.btn_a
            )));
        }

        Ok(())
    }
}
