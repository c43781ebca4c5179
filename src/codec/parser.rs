//! Resynchronizing frame parser
//!
//! [`FrameParser`] is the synchronous core of the decoder. It works on whatever
//! bytes the caller has buffered, reports how many it consumed, and keeps any
//! incomplete frame for the next call. Corrupt spans never surface as errors:
//! they are counted in [`DecoderStats`], logged, and scanned past.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::format::{HEADER_LEN, MAGIC, MAX_PAYLOAD_LEN, WireHeader, body_checksum};
use crate::{Frame, FrameError};

/// What to do with a frame whose trailing checksum does not match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrcPolicy {
    /// Discard the frame and resynchronize.
    #[default]
    Drop,
    /// Log a warning and emit the frame anyway. Payload must not be trusted.
    Accept,
}

/// Running counters for one decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames emitted
    pub frames: u64,
    /// Bytes discarded while hunting for a frame start
    pub skipped_bytes: u64,
    /// Headers rejected for a payload length above the maximum
    pub bad_length: u64,
    /// Frames whose checksum did not match
    pub crc_mismatch: u64,
    /// Mismatching frames emitted anyway under [`CrcPolicy::Accept`]
    pub crc_accepted: u64,
}

impl DecoderStats {
    /// Total framing errors seen.
    pub fn framing_errors(&self) -> u64 {
        self.bad_length + self.crc_mismatch
    }
}

/// Outcome of one [`FrameParser::parse`] call.
#[derive(Debug)]
pub struct Parsed {
    /// Bytes at the front of the input the caller may discard
    pub consumed: usize,
    /// Frame found, if any. `None` means more input is needed.
    pub frame: Option<Frame>,
}

/// Stateless scanner plus policy and counters.
#[derive(Debug, Clone, Default)]
pub struct FrameParser {
    policy: CrcPolicy,
    stats: DecoderStats,
}

impl FrameParser {
    pub fn new(policy: CrcPolicy) -> Self {
        Self { policy, stats: DecoderStats::default() }
    }

    pub fn policy(&self) -> CrcPolicy {
        self.policy
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Find the next valid frame in `input`.
    ///
    /// On success, `consumed` covers everything up to and including the frame.
    /// Without a complete frame, `consumed` covers the bytes proven useless
    /// (garbage before the next magic) and the rest must be presented again
    /// with more data appended.
    pub fn parse(&mut self, input: &[u8]) -> Parsed {
        let mut pos = 0;

        loop {
            match find_magic(&input[pos..]) {
                Some(offset) => {
                    self.skip(offset);
                    pos += offset;
                }
                None => {
                    // A trailing 0xAA may be the first half of the next magic.
                    let keep = usize::from(input.last() == Some(&MAGIC[0]) && input.len() > pos);
                    let discard = input.len() - pos - keep;
                    self.skip(discard);
                    return Parsed { consumed: input.len() - keep, frame: None };
                }
            }

            let rest = &input[pos..];
            if rest.len() < HEADER_LEN {
                return Parsed { consumed: pos, frame: None };
            }

            let header = WireHeader::parse(rest);
            if header.payload_len > MAX_PAYLOAD_LEN {
                self.stats.bad_length += 1;
                let error = FrameError::BadLength { len: header.payload_len, max: MAX_PAYLOAD_LEN };
                debug!(%error, identifier = header.identifier, "Rejected frame header, resyncing");
                self.skip(1);
                pos += 1;
                continue;
            }

            let frame_len = header.frame_len();
            if rest.len() < frame_len {
                return Parsed { consumed: pos, frame: None };
            }

            let computed = body_checksum(&rest[..frame_len - 1]);
            let received = rest[frame_len - 1];
            if computed != received {
                self.stats.crc_mismatch += 1;
                let error = FrameError::CrcMismatch { computed, received };
                match self.policy {
                    CrcPolicy::Drop => {
                        debug!(%error, identifier = header.identifier, "Dropped frame, resyncing");
                        self.skip(1);
                        pos += 1;
                        continue;
                    }
                    CrcPolicy::Accept => {
                        self.stats.crc_accepted += 1;
                        warn!(%error, identifier = header.identifier, "Accepting frame with bad crc");
                    }
                }
            }

            self.stats.frames += 1;
            trace!(
                timestamp_ms = header.timestamp_ms,
                identifier = header.identifier,
                len = header.payload_len,
                "Frame decoded"
            );
            return Parsed {
                consumed: pos + frame_len,
                frame: Some(Frame::from_validated_wire(&rest[..frame_len])),
            };
        }
    }

    /// Decode every complete frame in a finite buffer. Trailing partial data is
    /// treated as end of stream.
    pub fn parse_all(&mut self, mut input: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        loop {
            let Parsed { consumed, frame } = self.parse(input);
            input = &input[consumed..];
            match frame {
                Some(frame) => frames.push(frame),
                None => break,
            }
        }
        frames
    }

    fn skip(&mut self, n: usize) {
        self.stats.skipped_bytes += n as u64;
    }
}

fn find_magic(input: &[u8]) -> Option<usize> {
    input.windows(MAGIC.len()).position(|w| w == MAGIC)
}

/// Decode every complete frame in `bytes` with the default CRC policy.
pub fn decode_frames(bytes: &[u8]) -> Vec<Frame> {
    FrameParser::default().parse_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::format::encode_into;
    use proptest::prelude::*;

    fn wire(ts: u32, id: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encode_into(ts, id, payload, &mut out);
        out
    }

    #[test]
    fn decodes_single_frame() {
        let bytes = wire(42, 0x0100, &[0x4E, 0x20]);
        let frames = decode_frames(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp_ms, 42);
        assert_eq!(frames[0].identifier, 0x0100);
        assert_eq!(frames[0].payload(), &[0x4E, 0x20]);
        assert_eq!(frames[0].wire_bytes(), bytes.as_slice());
    }

    #[test]
    fn resyncs_over_garbage() {
        let mut bytes = vec![0x00, 0xAA, 0x13, 0x55, 0xFF];
        bytes.extend(wire(1, 0x0009, &[0x28]));
        bytes.extend([0xAA, 0xAA, 0x01, 0x02]);
        bytes.extend(wire(2, 0x0076, &[0x03, 0xFF]));
        bytes.extend([0x55, 0x55]);

        let mut parser = FrameParser::default();
        let frames = parser.parse_all(&bytes);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].timestamp_ms, 1);
        assert_eq!(frames[1].timestamp_ms, 2);
        assert_eq!(parser.stats().frames, 2);
        assert!(parser.stats().skipped_bytes >= 9);
    }

    #[test]
    fn drops_crc_mismatch_and_continues() {
        let mut bad = wire(1, 0x0100, &[0x10, 0x00]);
        let last = bad.len() - 1;
        bad[last] ^= 0x5A;

        let mut bytes = bad;
        bytes.extend(wire(2, 0x0100, &[0x20, 0x00]));

        let mut parser = FrameParser::new(CrcPolicy::Drop);
        let frames = parser.parse_all(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp_ms, 2);
        assert_eq!(parser.stats().crc_mismatch, 1);
        assert_eq!(parser.stats().crc_accepted, 0);
    }

    #[test]
    fn accept_policy_emits_mismatching_frame() {
        let mut bad = wire(1, 0x0100, &[0x10, 0x00]);
        let last = bad.len() - 1;
        bad[last] ^= 0x5A;

        let mut parser = FrameParser::new(CrcPolicy::Accept);
        let frames = parser.parse_all(&bad);

        assert_eq!(frames.len(), 1);
        assert_eq!(parser.stats().crc_mismatch, 1);
        assert_eq!(parser.stats().crc_accepted, 1);
    }

    #[test]
    fn rejects_oversized_length() {
        let mut bytes = vec![0xAA, 0x55, 0, 0, 0, 0, 0x01, 0x00, 65];
        bytes.extend([0u8; 66]);
        bytes.extend(wire(9, 0x0070, &[0xFF]));

        let mut parser = FrameParser::default();
        let frames = parser.parse_all(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp_ms, 9);
        assert_eq!(parser.stats().bad_length, 1);
        assert!(frames.iter().all(|f| f.payload().len() <= 64));
    }

    #[test]
    fn recovers_frame_hidden_inside_corrupt_span() {
        // Bad length header immediately followed by a real frame.
        let mut bytes = vec![0xAA, 0x55, 0, 0, 0, 0, 0x01, 0x00, 200];
        bytes.extend(wire(3, 0x0001, &[0x80]));

        let frames = decode_frames(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].timestamp_ms, 3);
    }

    #[test]
    fn incomplete_frame_waits_for_more_input() {
        let bytes = wire(5, 0x0100, &[1, 2, 3, 4]);
        let mut parser = FrameParser::default();

        let parsed = parser.parse(&bytes[..6]);
        assert!(parsed.frame.is_none());
        assert_eq!(parsed.consumed, 0);

        let parsed = parser.parse(&bytes);
        assert_eq!(parsed.consumed, bytes.len());
        assert!(parsed.frame.is_some());
    }

    #[test]
    fn trailing_magic_half_is_kept() {
        let mut parser = FrameParser::default();
        let parsed = parser.parse(&[0x01, 0x02, 0xAA]);
        assert_eq!(parsed.consumed, 2);
        assert!(parsed.frame.is_none());
        assert_eq!(parser.stats().skipped_bytes, 2);
    }

    #[test]
    fn empty_input_is_harmless() {
        let mut parser = FrameParser::default();
        let parsed = parser.parse(&[]);
        assert_eq!(parsed.consumed, 0);
        assert!(parsed.frame.is_none());
    }

    proptest! {
        #[test]
        fn round_trip(ts in any::<u32>(), id in any::<u16>(), payload in prop::collection::vec(any::<u8>(), 0..=64)) {
            let frames = decode_frames(&wire(ts, id, &payload));
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].timestamp_ms, ts);
            prop_assert_eq!(frames[0].identifier, id);
            prop_assert_eq!(frames[0].payload(), payload.as_slice());
        }

        #[test]
        fn garbage_without_magic_never_hides_frames(
            lead in prop::collection::vec(any::<u8>().prop_filter("no magic start", |b| *b != 0xAA), 0..64),
            gap in prop::collection::vec(any::<u8>().prop_filter("no magic byte", |b| *b != 0xAA && *b != 0x55), 0..64),
            first in prop::collection::vec(any::<u8>(), 0..=64),
            second in prop::collection::vec(any::<u8>(), 0..=64),
        ) {
            let mut bytes = lead;
            bytes.extend(wire(1, 0x0100, &first));
            bytes.extend(gap);
            bytes.extend(wire(2, 0x0076, &second));

            let frames = decode_frames(&bytes);
            prop_assert_eq!(frames.len(), 2);
            prop_assert_eq!(frames[0].payload(), first.as_slice());
            prop_assert_eq!(frames[1].payload(), second.as_slice());
        }
    }
}
