//! Provider trait for frame sources

use crate::codec::DecoderStats;
use crate::{ClockSource, Frame, Result};

/// Trait for telemetry frame sources
///
/// Providers abstract over where frames come from (serial link, recorded
/// log, textual capture) and handle their own timing internally. The driver
/// treats them all the same.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next validated frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame available
    /// - `Ok(None)` - Stream ended (normal termination)
    /// - `Err(e)` - Transport error; the driver decides whether to retry
    ///
    /// Framing errors never surface here: providers resynchronize internally.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Clock that sample timestamps from this provider are taken from
    fn clock(&self) -> ClockSource;

    /// Decoder counters, if the provider decodes binary frames
    fn stats(&self) -> DecoderStats {
        DecoderStats::default()
    }
}
