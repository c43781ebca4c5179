//! Provider for the line-oriented textual form

use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

use crate::codec::TextDecoder;
use crate::provider::Provider;
use crate::{ClockSource, Frame, Result, TelemetryError};

/// Frames parsed from `timestampMs,0xID,hex` lines.
pub struct TextProvider<R> {
    decoder: TextDecoder<R>,
    clock: ClockSource,
}

impl TextProvider<BufReader<File>> {
    /// Read a captured text log. Timestamps are the recorded device times.
    pub async fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).await.map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Opened text capture");
        Ok(Self::from_reader(BufReader::new(file), ClockSource::Device))
    }
}

impl<R> TextProvider<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    /// Wrap any line source. Use [`ClockSource::Wall`] for live links.
    pub fn from_reader(reader: R, clock: ClockSource) -> Self {
        Self { decoder: TextDecoder::new(reader), clock }
    }

    /// Lines skipped as unparseable so far.
    pub fn skipped(&self) -> u64 {
        self.decoder.skipped()
    }
}

#[async_trait::async_trait]
impl<R> Provider for TextProvider<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.decoder.next_frame().await.map_err(|e| TelemetryError::io_error("read text lines", e))
    }

    fn clock(&self) -> ClockSource {
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_capture_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture.csv");
        std::fs::write(&path, "10,0x0100,4E20\nbroken\n20,0x0009,28,extra\n").unwrap();

        let mut provider = TextProvider::open(&path).await.unwrap();
        assert_eq!(provider.clock(), ClockSource::Device);

        let first = provider.next_frame().await.unwrap().unwrap();
        let second = provider.next_frame().await.unwrap().unwrap();
        assert_eq!((first.timestamp_ms, first.identifier), (10, 0x0100));
        assert_eq!((second.timestamp_ms, second.identifier), (20, 0x0009));
        assert!(provider.next_frame().await.unwrap().is_none());
        assert_eq!(provider.skipped(), 1);
    }

    #[tokio::test]
    async fn live_text_uses_wall_clock() {
        let provider = TextProvider::from_reader(&b""[..], ClockSource::Wall);
        assert_eq!(provider.clock(), ClockSource::Wall);
    }

    #[tokio::test]
    async fn noisy_link_does_not_stop_the_pipeline() {
        use crate::driver::{Driver, Pipeline};
        use crate::history::SampleHistory;
        use crate::hub::EventHub;
        use crate::sensors::SensorTable;
        use crate::Value;
        use tokio_util::sync::CancellationToken;

        let mut input = b"1,0x0100,\xFF\xFE\n".repeat(12);
        input.extend_from_slice(b"2,0x0009,28\n");
        let provider = TextProvider::from_reader(std::io::Cursor::new(input), ClockSource::Wall);

        let pipeline = Pipeline {
            table: SensorTable::default(),
            hub: EventHub::new(),
            history: SampleHistory::new(["coolant"], 8),
        };
        let stats = Driver::spawn(provider, pipeline.clone(), None, CancellationToken::new())
            .join()
            .await
            .unwrap();

        assert_eq!(stats.errors, 0);
        assert_eq!(stats.frames, 1);
        assert_eq!(pipeline.hub.snapshot()["coolant"], Value::Int(0));
    }
}
