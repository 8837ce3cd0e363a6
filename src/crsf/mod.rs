//! # CRSF Protocol Module
//!
//! Just enough of the Crossfire (CRSF) protocol to hand a channel frame to an
//! ExpressLRS transmitter module:
//! - 16 channels, 11-bit resolution, packed LSB-first
//! - CRC8-DVB-S2 checksum

pub mod protocol;
pub mod encoder;
pub mod crc;
