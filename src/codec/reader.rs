//! Async frame decoder over any byte source
//!
//! Wraps [`FrameParser`] around an [`AsyncRead`] (serial device, log file,
//! in-memory slice) and turns it into a lazy sequence of frames.
//!
//! ```rust
//! use huskki::codec::FrameDecoder;
//! use huskki::Frame;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> std::io::Result<()> {
//! let frame = Frame::new(10, 0x0100, &[0x4E, 0x20]).unwrap();
//! let mut bytes = vec![0x00, 0x13];
//! bytes.extend_from_slice(frame.wire_bytes());
//!
//! let mut decoder = FrameDecoder::new(bytes.as_slice());
//! assert_eq!(decoder.next_frame().await?, Some(frame));
//! assert_eq!(decoder.next_frame().await?, None);
//! # Ok(())
//! # }
//! ```

use futures::Stream;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use super::parser::{CrcPolicy, DecoderStats, FrameParser, Parsed};
use crate::Frame;

const READ_CHUNK: usize = 4096;

/// Streaming frame decoder.
pub struct FrameDecoder<R> {
    reader: R,
    parser: FrameParser,
    buf: Vec<u8>,
    start: usize,
    eof: bool,
}

impl<R> FrameDecoder<R>
where
    R: AsyncRead + Unpin,
{
    /// Decoder with the default [`CrcPolicy::Drop`].
    pub fn new(reader: R) -> Self {
        Self::with_policy(reader, CrcPolicy::default())
    }

    pub fn with_policy(reader: R, policy: CrcPolicy) -> Self {
        Self {
            reader,
            parser: FrameParser::new(policy),
            buf: Vec::with_capacity(READ_CHUNK),
            start: 0,
            eof: false,
        }
    }

    /// Next validated frame.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - frame decoded
    /// - `Ok(None)` - source exhausted, including EOF inside a partial frame
    /// - `Err(e)` - the underlying reader failed
    pub async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            let Parsed { consumed, frame } = self.parser.parse(&self.buf[self.start..]);
            self.start += consumed;

            if let Some(frame) = frame {
                return Ok(Some(frame));
            }

            if self.eof {
                let leftover = self.buf.len() - self.start;
                if leftover > 0 {
                    trace!(leftover, "Discarding partial frame at end of stream");
                    self.start = self.buf.len();
                }
                return Ok(None);
            }

            self.compact();
            self.fill().await?;
        }
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> DecoderStats {
        self.parser.stats()
    }

    /// Turn the decoder into a [`Stream`] of frames.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Frame>> {
        futures::stream::unfold(Some(self), |state| async move {
            let mut decoder = state?;
            match decoder.next_frame().await {
                Ok(Some(frame)) => Some((Ok(frame), Some(decoder))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Give back the underlying reader, discarding buffered bytes.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn compact(&mut self) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
    }

    async fn fill(&mut self) -> io::Result<()> {
        let filled = self.buf.len();
        self.buf.resize(filled + READ_CHUNK, 0);

        let result = loop {
            match self.reader.read(&mut self.buf[filled..]).await {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };

        match result {
            Ok(n) => {
                self.buf.truncate(filled + n);
                if n == 0 {
                    self.eof = true;
                }
                Ok(())
            }
            Err(e) => {
                self.buf.truncate(filled);
                Err(e)
            }
        }
    }
}
