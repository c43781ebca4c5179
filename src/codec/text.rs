//! Line-oriented textual ingestion form
//!
//! Some relay firmware revisions print one record per line instead of binary
//! frames:
//!
//! ```text
//! timestampMs,0xIDENTIFIER,hexbytes[,extra]
//! 120345,0x0100,1F 40
//! ```
//!
//! Each valid line becomes the same [`Frame`] the binary decoder produces.
//! Lines that cannot be parsed are skipped; they never end the stream.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::codec::format::MAX_PAYLOAD_LEN;
use crate::{Frame, LineError};

/// Parse one line of the textual form.
pub fn parse_line(line: &str) -> Result<Frame, LineError> {
    let fields: Vec<&str> = line.trim().split(',').collect();
    if fields.len() < 3 {
        return Err(LineError::FieldCount(fields.len()));
    }

    let ts_field = fields[0].trim();
    let timestamp_ms: u32 =
        ts_field.parse().map_err(|_| LineError::Timestamp(ts_field.to_string()))?;

    let id_field = fields[1].trim();
    let id_hex =
        id_field.strip_prefix("0x").ok_or_else(|| LineError::MissingHexPrefix(id_field.into()))?;
    let identifier =
        u16::from_str_radix(id_hex, 16).map_err(|_| LineError::Identifier(id_field.into()))?;

    let payload_hex: String = fields[2].chars().filter(|c| !c.is_whitespace()).collect();
    if payload_hex.is_empty() {
        return Err(LineError::EmptyPayload);
    }
    if payload_hex.len() % 2 != 0 {
        return Err(LineError::OddLength(payload_hex.len()));
    }
    let payload = hex::decode(&payload_hex)?;
    if payload.len() > MAX_PAYLOAD_LEN as usize {
        return Err(LineError::PayloadTooLong(payload.len()));
    }

    Frame::new(timestamp_ms, identifier, &payload)
        .map_err(|_| LineError::PayloadTooLong(payload.len()))
}

/// Streaming decoder for the textual form.
///
/// Lines are split on raw bytes, so a line that is not UTF-8 (line noise on
/// the serial link) is skipped like any other unparseable line.
pub struct TextDecoder<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: u64,
    skipped: u64,
}

impl<R> TextDecoder<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self { reader, buf: Vec::with_capacity(128), line_no: 0, skipped: 0 }
    }

    /// Next frame from a parseable line; `Ok(None)` at end of input.
    pub async fn next_frame(&mut self) -> std::io::Result<Option<Frame>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let parsed = match std::str::from_utf8(&self.buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => parse_line(line),
                Err(_) => Err(LineError::NotUtf8),
            };
            match parsed {
                Ok(frame) => return Ok(Some(frame)),
                Err(error) => {
                    self.skipped += 1;
                    debug!(line = self.line_no, %error, "Skipping unparseable line");
                }
            }
        }
    }

    /// Non-blank lines skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
