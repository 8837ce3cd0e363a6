//! # Input Source
//!
//! The capability the calibration engine and runtime mapper read from: the
//! current value of every physical axis, the held state of every button,
//! and a queue of edge-triggered button events.

use crate::error::Result;
use crate::mapping::ButtonId;

/// Discrete button edge reported by an input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Fired once per physical press
    ButtonPressed(ButtonId),
    ButtonReleased(ButtonId),
}

/// A game controller as seen by this crate
///
/// Axis values are normalized to `-1.0..=1.0`. Reads reflect the state as of
/// the most recent [`InputSource::pump`].
#[cfg_attr(test, mockall::automock)]
pub trait InputSource {
    /// Refreshes axis/button state and queues new events
    ///
    /// # Errors
    ///
    /// Returns `Controller` error when the device is gone.
    fn pump(&mut self) -> Result<()>;

    /// Number of physical axes
    fn num_axes(&self) -> usize;

    /// Current value of axis `index`, `0.0` if the axis does not exist
    fn axis_value(&self, index: usize) -> f32;

    /// Whether `button` is currently held
    fn button_pressed(&self, button: ButtonId) -> bool;

    /// Drains the events queued since the last call
    fn poll_events(&mut self) -> Vec<ControllerEvent>;

    /// Values of every axis, in index order
    fn axis_snapshot(&self) -> Vec<f32> {
        (0..self.num_axes()).map(|i| self.axis_value(i)).collect()
    }
}
