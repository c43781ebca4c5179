//! Binary frame layout produced by the relay microcontroller.
//!
//! ```text
//! offset  size  field
//! 0       2     magic 0xAA 0x55
//! 2       4     timestamp_ms, little-endian u32
//! 6       2     identifier, big-endian u16
//! 8       1     payload length (0..=64)
//! 9       len   payload
//! 9+len   1     crc8 over bytes 2..9+len
//! ```
//!
//! The byte-order asymmetry between timestamp and identifier is part of the
//! contract with the firmware and must not be "fixed".

use super::crc;

/// Frame start marker.
pub const MAGIC: [u8; 2] = [0xAA, 0x55];

/// Magic plus the fixed header fields.
pub const HEADER_LEN: usize = 9;

/// Offset of the payload length byte.
pub const LEN_OFFSET: usize = 8;

/// Largest payload the firmware emits.
pub const MAX_PAYLOAD_LEN: u8 = 64;

/// Smallest possible frame (empty payload).
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 1;

/// Largest possible frame.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN as usize + 1;

/// Fixed header fields decoded from the first [`HEADER_LEN`] bytes of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    pub timestamp_ms: u32,
    pub identifier: u16,
    pub payload_len: u8,
}

impl WireHeader {
    /// Decode the header. `bytes` must start at the magic and hold at least
    /// [`HEADER_LEN`] bytes.
    pub fn parse(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= HEADER_LEN);
        Self {
            timestamp_ms: u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
            identifier: u16::from_be_bytes([bytes[6], bytes[7]]),
            payload_len: bytes[LEN_OFFSET],
        }
    }

    /// Total frame length including magic and trailing CRC.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload_len as usize + 1
    }
}

/// CRC over a frame body: everything after the magic up to, but excluding,
/// the trailing checksum byte.
pub fn body_checksum(frame_without_crc: &[u8]) -> u8 {
    crc::checksum(&frame_without_crc[MAGIC.len()..])
}

/// Append the wire encoding of one frame to `out`.
///
/// No length validation happens here; callers that need a valid frame go
/// through [`crate::Frame::new`].
pub fn encode_into(timestamp_ms: u32, identifier: u16, payload: &[u8], out: &mut Vec<u8>) {
    let start = out.len();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&timestamp_ms.to_le_bytes());
    out.extend_from_slice(&identifier.to_be_bytes());
    out.push(payload.len() as u8);
    out.extend_from_slice(payload);
    let crc = body_checksum(&out[start..]);
    out.push(crc);
}
