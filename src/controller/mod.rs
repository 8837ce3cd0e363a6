//! # Controller Module
//!
//! Game controller input and everything built directly on it.
//!
//! This module handles:
//! - Controller detection and event reading via evdev
//! - Normalizing axes and tracking held buttons
//! - Interactive calibration of axes and switches
//! - Mapping live input to a channel frame

pub mod input;
pub mod state;
pub mod gamepad;
pub mod calibration;
pub mod channel_mapper;
