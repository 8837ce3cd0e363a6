//! # CRSF Packet Encoder
//!
//! Encodes a channel frame into a CRSF RC-channels packet.

use bytes::{BufMut, Bytes, BytesMut};

use super::crc::crc8_dvb_s2;
use super::protocol::*;

/// Encode a channel frame into a complete CRSF packet
///
/// Layout: sync, length, type, 22-byte payload, CRC over type + payload.
///
/// # Examples
///
/// ```
/// use elrs_gamepad::crsf::encoder::encode_rc_channels_frame;
/// use elrs_gamepad::crsf::protocol::NEUTRAL_FRAME;
///
/// let packet = encode_rc_channels_frame(&NEUTRAL_FRAME);
/// assert_eq!(packet.len(), 26);
/// assert_eq!(packet[0], 0xC8);
/// ```
pub fn encode_rc_channels_frame(channels: &ChannelFrame) -> Bytes {
    let mut packet = BytesMut::with_capacity(CRSF_RC_CHANNELS_FRAME_SIZE);
    packet.put_u8(CRSF_SYNC_BYTE);
    packet.put_u8(CRSF_RC_CHANNELS_FRAME_LENGTH);
    packet.put_u8(CRSF_FRAMETYPE_RC_CHANNELS_PACKED);
    packet.put_slice(&encode_rc_channels_payload(channels));

    // Skip sync and length
    let crc = crc8_dvb_s2(&packet[2..]);
    packet.put_u8(crc);

    packet.freeze()
}

/// Pack 16 channels of 11 bits each into the 22-byte payload
///
/// Channels form one continuous LSB-first bitstream:
/// ```text
/// Byte 0: Ch1[0:7]
/// Byte 1: Ch1[8:10] | Ch2[0:4]
/// Byte 2: Ch2[5:10] | Ch3[0:1]
/// ...
/// ```
/// Values above 2047 are clamped.
pub fn encode_rc_channels_payload(channels: &ChannelFrame) -> [u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE] {
    let mut payload = [0u8; CRSF_RC_CHANNELS_PAYLOAD_SIZE];
    let mut acc: u32 = 0;
    let mut acc_bits: u32 = 0;
    let mut out = 0;

    for &channel in channels {
        acc |= u32::from(channel.min(CRSF_CHANNEL_VALUE_MAX)) << acc_bits;
        acc_bits += CRSF_CHANNEL_BITS;

        while acc_bits >= 8 {
            payload[out] = (acc & 0xFF) as u8;
            out += 1;
            acc >>= 8;
            acc_bits -= 8;
        }
    }

    payload
}
