//! Live provider for the serial link to the relay microcontroller

use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{info, warn};

use crate::codec::{CrcPolicy, DecoderStats, FrameDecoder};
use crate::config::{PortSelection, SerialConfig};
use crate::provider::Provider;
use crate::{ClockSource, Frame, Result, TelemetryError};

/// Device name prefixes considered when the port is `auto`, in preference order.
const AUTO_PREFIXES: [&str; 2] = ["ttyACM", "ttyUSB"];

/// Pick a serial device from `dir` (normally `/dev`).
///
/// No USB descriptor heuristics: the first CDC-ACM device wins, then the first
/// USB-serial bridge.
pub fn auto_select_port_in(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        TelemetryError::transport_failed_with_source(
            format!("enumerate ports in {}", dir.display()),
            Box::new(e),
        )
    })?;

    let mut candidates: Vec<(usize, String)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| {
            AUTO_PREFIXES.iter().position(|prefix| name.starts_with(prefix)).map(|rank| (rank, name))
        })
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .map(|(_, name)| dir.join(name))
        .ok_or_else(|| TelemetryError::transport_failed("no serial ports found"))
}

/// Pick a serial device from `/dev`.
pub fn auto_select_port() -> Result<PathBuf> {
    auto_select_port_in(Path::new("/dev"))
}

/// Live provider decoding binary frames from a byte stream.
///
/// Sample timestamps come from the host wall-clock: the device clock is
/// free-running since its own boot and means nothing to a viewer.
pub struct LiveProvider<R = SerialStream> {
    decoder: FrameDecoder<R>,
    source: String,
}

/// Resolve and open the configured serial device at its baud rate, 8N1, no
/// flow control.
pub async fn open_serial(config: &SerialConfig) -> Result<(SerialStream, PathBuf)> {
    let path = match &config.port {
        PortSelection::Auto => auto_select_port()?,
        PortSelection::Path(path) => path.clone(),
    };

    let port = tokio_serial::new(path.to_string_lossy(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| {
            TelemetryError::transport_failed_with_source(
                format!("couldn't open serial {}", path.display()),
                Box::new(e),
            )
        })?;

    info!(port = %path.display(), baud = config.baud_rate, "Connected to serial device");
    Ok((port, path))
}

impl LiveProvider<SerialStream> {
    /// Open the configured serial device.
    pub async fn open(config: &SerialConfig, policy: CrcPolicy) -> Result<Self> {
        let (port, path) = open_serial(config).await?;
        Ok(Self::from_reader(port, path.display().to_string(), policy))
    }
}

impl<R> LiveProvider<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Decode frames from any byte stream (pipes, sockets, test doubles).
    pub fn from_reader(reader: R, source: impl Into<String>, policy: CrcPolicy) -> Self {
        Self { decoder: FrameDecoder::with_policy(reader, policy), source: source.into() }
    }
}

#[async_trait::async_trait]
impl<R> Provider for LiveProvider<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.decoder.next_frame().await {
            Ok(Some(frame)) => Ok(Some(frame)),
            Ok(None) => {
                warn!(source = %self.source, "Serial stream closed");
                Ok(None)
            }
            Err(e) => Err(TelemetryError::io_error(format!("read {}", self.source), e)),
        }
    }

    fn clock(&self) -> ClockSource {
        ClockSource::Wall
    }

    fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::wire;
    use tempfile::TempDir;

    #[test]
    fn auto_select_prefers_acm_devices() {
        let dir = TempDir::new().unwrap();
        for name in ["ttyS0", "ttyUSB1", "ttyACM1", "ttyACM0", "ttyUSB0"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let chosen = auto_select_port_in(dir.path()).unwrap();
        assert_eq!(chosen.file_name().unwrap(), "ttyACM0");
    }

    #[test]
    fn auto_select_falls_back_to_usb_serial() {
        let dir = TempDir::new().unwrap();
        for name in ["ttyS0", "ttyUSB3"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let chosen = auto_select_port_in(dir.path()).unwrap();
        assert_eq!(chosen.file_name().unwrap(), "ttyUSB3");
    }

    #[test]
    fn auto_select_without_candidates_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let err = auto_select_port_in(dir.path()).unwrap_err();
        assert!(matches!(err, TelemetryError::Transport { .. }));
    }

    #[tokio::test]
    async fn open_missing_device_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let config = SerialConfig {
            port: PortSelection::Path(dir.path().join("ttyACM9")),
            ..SerialConfig::default()
        };
        let err = LiveProvider::open(&config, CrcPolicy::Drop).await.err().expect("should fail");
        assert!(matches!(err, TelemetryError::Transport { .. }));
        assert!(err.to_string().contains("ttyACM9"));
    }

    #[tokio::test]
    async fn decodes_stream_with_wall_clock() {
        let mut bytes = vec![0x13, 0x37];
        bytes.extend(wire(5, 0x0100, &[0x4E, 0x20]));
        let mut provider = LiveProvider::from_reader(std::io::Cursor::new(bytes), "test", CrcPolicy::Drop);

        assert_eq!(provider.clock(), ClockSource::Wall);
        let frame = provider.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.identifier, 0x0100);
        assert!(provider.next_frame().await.unwrap().is_none());
        assert_eq!(provider.stats().skipped_bytes, 2);
    }
}
