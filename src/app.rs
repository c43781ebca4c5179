//! Application context wiring a frame source to the hub
//!
//! [`App`] owns the configuration, the [`EventHub`] and the [`SampleHistory`]
//! and hands them to the pipeline explicitly. There is no global state, so
//! tests can run several apps side by side.

use tokio::io::{AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::driver::{Driver, DriverHandle, Pipeline};
use crate::history::SampleHistory;
use crate::hub::EventHub;
use crate::providers::{LiveProvider, ReplayProvider, TextProvider, open_serial};
use crate::recorder::{RawLogWriter, next_available_path};
use crate::{ClockSource, Result};

/// Shared state for one ingestion pipeline.
pub struct App {
    config: Config,
    hub: EventHub,
    history: SampleHistory,
}

impl App {
    /// Validate `config` and build empty shared state.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let history = config.history();
        Ok(Self { config, hub: EventHub::new(), history })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline {
            table: self.config.sensor_table(),
            hub: self.hub.clone(),
            history: self.history.clone(),
        }
    }

    /// Open the configured source and spawn the pipeline.
    ///
    /// Replay reads a recorded log (binary, or line form with `text_input`);
    /// otherwise the serial device is opened and, when enabled, every validated
    /// frame is appended to a fresh raw log. Failing to open the source or the
    /// log is returned as an error before anything is spawned.
    pub async fn start(&self, cancel: CancellationToken) -> Result<DriverHandle> {
        let config = &self.config;

        if let Some(replay) = &config.replay {
            if config.text_input {
                let provider = TextProvider::open(&replay.path).await?;
                return Ok(Driver::spawn(provider, self.pipeline(), None, cancel));
            }
            let provider = ReplayProvider::open(replay, config.crc_policy).await?;
            return Ok(Driver::spawn(provider, self.pipeline(), None, cancel));
        }

        let (port, path) = open_serial(&config.serial).await?;
        self.start_live(port, path.display().to_string(), cancel).await
    }

    /// Spawn the live pipeline over an already open byte stream.
    ///
    /// Samples are wall-clock stamped and frames are recorded when enabled,
    /// exactly as for the serial device.
    pub async fn start_live<R>(
        &self,
        reader: R,
        source: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<DriverHandle>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let recorder = self.open_recorder().await?;

        if self.config.text_input {
            let provider = TextProvider::from_reader(BufReader::new(reader), ClockSource::Wall);
            return Ok(Driver::spawn(provider, self.pipeline(), recorder, cancel));
        }

        let provider = LiveProvider::from_reader(reader, source, self.config.crc_policy);
        Ok(Driver::spawn(provider, self.pipeline(), recorder, cancel))
    }

    async fn open_recorder(&self) -> Result<Option<RawLogWriter>> {
        let recording = &self.config.recording;
        if !recording.enabled {
            info!("Raw frame recording disabled");
            return Ok(None);
        }

        let path = next_available_path(&recording.dir, &recording.name, &recording.ext);
        RawLogWriter::create(path, recording.flush_every).await.map(Some)
    }
}
