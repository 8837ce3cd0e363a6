//! # CRSF Protocol Constants and Types
//!
//! The 11-bit, 16-slot channel convention shared by the runtime mapper and
//! the link sink.

/// CRSF frame sync byte (address of the flight controller / TX module)
pub const CRSF_SYNC_BYTE: u8 = 0xC8;

/// RC Channels packet type
pub const CRSF_FRAMETYPE_RC_CHANNELS_PACKED: u8 = 0x16;

/// RC channels payload size (22 bytes for 16 channels × 11 bits)
pub const CRSF_RC_CHANNELS_PAYLOAD_SIZE: usize = 22;

/// RC channels frame length field (type + payload + crc)
pub const CRSF_RC_CHANNELS_FRAME_LENGTH: u8 = 0x18;

/// Full RC channels frame on the wire (sync + length + type + payload + crc)
pub const CRSF_RC_CHANNELS_FRAME_SIZE: usize = 26;

/// Bits per packed channel
pub const CRSF_CHANNEL_BITS: u32 = 11;

/// Number of RC channels
pub const CRSF_NUM_CHANNELS: usize = 16;

/// Channel value range (11-bit: 0-2047)
pub const CRSF_CHANNEL_VALUE_MIN: u16 = 0;
pub const CRSF_CHANNEL_VALUE_MAX: u16 = 2047;
pub const CRSF_CHANNEL_VALUE_CENTER: u16 = 1024;

/// One cycle's worth of channel values, every slot in
/// `CRSF_CHANNEL_VALUE_MIN..=CRSF_CHANNEL_VALUE_MAX`
pub type ChannelFrame = [u16; CRSF_NUM_CHANNELS];

/// Frame with every slot at neutral
pub const NEUTRAL_FRAME: ChannelFrame = [CRSF_CHANNEL_VALUE_CENTER; CRSF_NUM_CHANNELS];
