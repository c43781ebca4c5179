//! Huskki entry point: ingest ECU telemetry and push it to dashboards.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use huskki::config::{Config, PortSelection, ReplayConfig};
use huskki::{App, server};

/// Framed ECU telemetry decoder and live push server
#[derive(Parser, Debug)]
#[command(name = "huskki", version, about, long_about = None)]
struct Args {
    /// YAML configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial device path, or `auto` for the first /dev/ttyACM* or /dev/ttyUSB*
    #[arg(long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Push endpoint address (IP:PORT)
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Replay a recorded raw log instead of reading the serial device
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Replay speed multiplier (0 = as fast as possible)
    #[arg(long)]
    replay_speed: Option<f64>,

    /// Start the replay over at end of file
    #[arg(long)]
    replay_loop: bool,

    /// Leading frames to skip on each replay pass
    #[arg(long)]
    replay_skip_frames: Option<u64>,

    /// Input is `timestampMs,0xID,hex` lines instead of binary frames
    #[arg(long)]
    text: bool,

    /// Do not write a raw log of the live link
    #[arg(long)]
    no_record: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(port) = self.port {
            config.serial.port = PortSelection::from(port);
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(addr) = self.addr {
            config.listen_addr = addr;
        }
        if let Some(path) = self.replay {
            let replay = config.replay.get_or_insert_with(|| ReplayConfig::new(&path));
            replay.path = path;
        }
        if let Some(replay) = config.replay.as_mut() {
            if let Some(speed) = self.replay_speed {
                replay.speed = speed;
            }
            if let Some(skip) = self.replay_skip_frames {
                replay.skip_frames = skip;
            }
            replay.looping |= self.replay_loop;
        } else if self.replay_speed.is_some() || self.replay_loop || self.replay_skip_frames.is_some() {
            warn!("Replay options given without --replay; ignoring them");
        }
        config.text_input |= self.text;
        if self.no_record {
            config.recording.enabled = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().into_config()?;
    let listen_addr = config.listen_addr;
    let app = App::new(config).context("invalid configuration")?;

    let cancel = CancellationToken::new();
    let driver = app.start(cancel.clone()).await.map_err(|e| {
        for hint in e.recovery_suggestions() {
            error!("hint: {}", hint);
        }
        e
    })?;

    let listener = server::bind(listen_addr).await.context("starting push server")?;
    let server_task = tokio::spawn(server::serve(
        listener,
        app.hub().clone(),
        app.history().clone(),
        cancel.clone(),
    ));

    // The last snapshot stays available to new clients after a replay ends.
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("Interrupt received, shutting down");

    let stats = driver.shutdown().await.context("pipeline task panicked")?;
    info!(
        frames = stats.frames,
        updates = stats.updates,
        recorded = stats.recorded,
        crc_mismatch = stats.decoder.crc_mismatch,
        bad_length = stats.decoder.bad_length,
        "Pipeline stopped"
    );

    server_task.await.context("push server task panicked")??;
    Ok(())
}
