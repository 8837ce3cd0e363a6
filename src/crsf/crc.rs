//! # CRC8-DVB-S2
//!
//! Checksum closing every CRSF frame.
//!
//! **Polynomial**: 0xD5 (x^8 + x^7 + x^6 + x^4 + x^2 + 1)
//! **Initial Value**: 0x00

/// CRC-8-DVB-S2 polynomial
const CRC8_POLY: u8 = 0xD5;

/// Lookup table built at compile time
const CRC8_TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        table[i] = crc8_step(i as u8);
        i += 1;
    }

    table
}

/// Runs one byte's worth of shifts through the polynomial
const fn crc8_step(mut crc: u8) -> u8 {
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ CRC8_POLY
        } else {
            crc << 1
        };
        bit += 1;
    }
    crc
}

/// Calculate the CRC8-DVB-S2 checksum of `data`
///
/// For CRSF frames `data` is the frame type byte followed by the payload.
///
/// # Examples
///
/// ```
/// use elrs_gamepad::crsf::crc::crc8_dvb_s2;
///
/// assert_eq!(crc8_dvb_s2(b"123456789"), 0xBC);
/// ```
pub fn crc8_dvb_s2(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}
