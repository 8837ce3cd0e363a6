//! # ELRS Gamepad Library
//!
//! Fly an ExpressLRS-linked vehicle with any evdev game controller.
//!
//! A one-time interactive calibration binds four physical axes and two
//! buttons to logical channels. The resulting mapping is stored on disk and
//! applied every cycle to turn live controller input into a 16-channel
//! frame, which the link task streams to the transmitter module as CRSF.

pub mod config;
pub mod error;
pub mod crsf;
pub mod controller;
pub mod mapping;
pub mod serial;
pub mod link;
