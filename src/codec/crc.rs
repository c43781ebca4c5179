//! CRC-8/CCITT as computed by the relay firmware.
//!
//! Polynomial 0x07, initial value 0x00, MSB-first, no reflection, no final XOR.

/// Generator polynomial (x^8 + x^2 + x + 1).
pub const POLYNOMIAL: u8 = 0x07;

/// Initial register value.
pub const INIT: u8 = 0x00;

/// Apply one byte to the running checksum.
pub const fn update(mut crc: u8, input: u8) -> u8 {
    crc ^= input;
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x80 != 0 { (crc << 1) ^ POLYNOMIAL } else { crc << 1 };
        bit += 1;
    }
    crc
}

/// Fold [`update`] over `bytes` left to right.
pub fn update_buffer(crc: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(crc, |crc, &b| update(crc, b))
}

/// Checksum of `bytes` starting from [`INIT`].
pub fn checksum(bytes: &[u8]) -> u8 {
    update_buffer(INIT, bytes)
}
