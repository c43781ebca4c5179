//! Validated telemetry frame

use std::fmt;
use std::sync::Arc;

use crate::FrameError;
use crate::codec::format::{self, HEADER_LEN, MAX_PAYLOAD_LEN, WireHeader};

/// One validated telemetry record.
///
/// A frame keeps the exact wire bytes it was decoded from (magic through CRC),
/// shared via `Arc`, so the raw log recorder can persist it without
/// re-serializing and clones stay cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Device milliseconds since boot. Free-running, may wrap.
    pub timestamp_ms: u32,

    /// Sensor/parameter identifier (DID)
    pub identifier: u16,

    wire: Arc<[u8]>,
}

impl Frame {
    /// Build a frame from its fields, computing the wire encoding and CRC.
    pub fn new(timestamp_ms: u32, identifier: u16, payload: &[u8]) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD_LEN as usize {
            return Err(FrameError::BadLength {
                len: u8::try_from(payload.len()).unwrap_or(u8::MAX),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut wire = Vec::with_capacity(HEADER_LEN + payload.len() + 1);
        format::encode_into(timestamp_ms, identifier, payload, &mut wire);
        Ok(Self { timestamp_ms, identifier, wire: wire.into() })
    }

    /// Wrap bytes the parser has already validated. The length always is; the
    /// CRC may not be under [`crate::codec::CrcPolicy::Accept`].
    pub(crate) fn from_validated_wire(wire: &[u8]) -> Self {
        let header = WireHeader::parse(wire);
        debug_assert_eq!(header.frame_len(), wire.len());
        Self {
            timestamp_ms: header.timestamp_ms,
            identifier: header.identifier,
            wire: Arc::from(wire),
        }
    }

    /// Raw value bytes; encoding depends on the identifier.
    pub fn payload(&self) -> &[u8] {
        &self.wire[HEADER_LEN..self.wire.len() - 1]
    }

    /// Exact wire bytes, magic through CRC.
    pub fn wire_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// Trailing checksum byte as received.
    pub fn crc(&self) -> u8 {
        self.wire[self.wire.len() - 1]
    }

    /// True when the trailing checksum matches the header and payload.
    pub fn crc_valid(&self) -> bool {
        format::body_checksum(&self.wire[..self.wire.len() - 1]) == self.crc()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("timestamp_ms", &self.timestamp_ms)
            .field("identifier", &format_args!("{:#06x}", self.identifier))
            .field("payload", &format_args!("{}", hex::encode(self.payload())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_exposes_fields_and_wire() {
        let frame = Frame::new(1234, 0x0076, &[0x03, 0xFF]).unwrap();
        assert_eq!(frame.timestamp_ms, 1234);
        assert_eq!(frame.identifier, 0x0076);
        assert_eq!(frame.payload(), &[0x03, 0xFF]);
        assert_eq!(frame.wire_bytes().len(), HEADER_LEN + 2 + 1);
        assert_eq!(&frame.wire_bytes()[..2], &format::MAGIC);
    }

    #[test]
    fn new_rejects_oversized_payload() {
        let err = Frame::new(0, 0x0100, &[0u8; 65]).unwrap_err();
        assert_eq!(err, FrameError::BadLength { len: 65, max: 64 });

        let err = Frame::new(0, 0x0100, &[0u8; 300]).unwrap_err();
        assert_eq!(err, FrameError::BadLength { len: u8::MAX, max: 64 });
    }

    #[test]
    fn validated_wire_round_trips() {
        let frame = Frame::new(u32::MAX, 0xBEEF, &[]).unwrap();
        let copy = Frame::from_validated_wire(frame.wire_bytes());
        assert_eq!(copy, frame);
        assert!(copy.payload().is_empty());
    }

    #[test]
    fn crc_validity_reflects_wire_bytes() {
        use crate::test_utils::wire_with_bad_crc;

        assert!(Frame::new(7, 0x0100, &[0x12, 0x34]).unwrap().crc_valid());
        let corrupt = Frame::from_validated_wire(&wire_with_bad_crc(7, 0x0100, &[0x12, 0x34]));
        assert!(!corrupt.crc_valid());
        assert_eq!(corrupt.payload(), &[0x12, 0x34]);
    }

    #[test]
    fn debug_shows_hex() {
        let frame = Frame::new(5, 0x0009, &[0x28]).unwrap();
        let rendered = format!("{frame:?}");
        assert!(rendered.contains("0x0009"));
        assert!(rendered.contains("28"));
    }
}
