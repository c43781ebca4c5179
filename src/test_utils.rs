//! Test utilities for building wire streams
//!
//! Shared by unit tests and the criterion benchmarks.

#![cfg(any(test, feature = "benchmark"))]

use crate::Frame;
use crate::codec::format;

/// Encode one valid wire frame.
pub fn wire(timestamp_ms: u32, identifier: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(format::HEADER_LEN + payload.len() + 1);
    format::encode_into(timestamp_ms, identifier, payload, &mut out);
    out
}

/// Encode a frame and then corrupt its checksum.
pub fn wire_with_bad_crc(timestamp_ms: u32, identifier: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = wire(timestamp_ms, identifier, payload);
    if let Some(crc) = out.last_mut() {
        *crc ^= 0xFF;
    }
    out
}

/// Deterministic filler that never contains the magic's first byte.
pub fn garbage(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .map(|b| if b == format::MAGIC[0] { 0x00 } else { b })
        .collect()
}

/// A realistic mixed stream: RPM, TPS and coolant frames 10 ms apart, with a
/// few garbage bytes between every `noise_every` frames (0 disables noise).
pub fn sensor_stream(frames: usize, noise_every: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..frames {
        let ts = (i as u32) * 10;
        let bytes = match i % 3 {
            0 => wire(ts, 0x0100, &(4000u16 + i as u16).to_be_bytes()),
            1 => wire(ts, 0x0076, &((i as u16) % 1024).to_be_bytes()),
            _ => wire(ts, 0x0009, &[0x00, 0x5A]),
        };
        out.extend(bytes);
        if noise_every > 0 && i % noise_every == noise_every - 1 {
            out.extend(garbage(3, i as u8));
        }
    }
    out
}

/// Frames for direct use with the interpreter.
pub fn frame(timestamp_ms: u32, identifier: u16, payload: &[u8]) -> Frame {
    Frame::new(timestamp_ms, identifier, payload).expect("payload within bounds")
}
