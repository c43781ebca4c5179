//! Telemetry stream decoding
//!
//! - [`crc`]: CRC-8/CCITT used for frame integrity
//! - [`format`]: binary frame layout
//! - [`FrameParser`]: synchronous resynchronizing scanner
//! - [`FrameDecoder`]: async decoder over any byte source
//! - [`TextDecoder`]: alternate line-oriented form

pub mod crc;
pub mod format;
mod parser;
mod reader;
mod text;

pub use parser::{CrcPolicy, DecoderStats, FrameParser, Parsed, decode_frames};
pub use reader::FrameDecoder;
pub use text::{TextDecoder, parse_line};
