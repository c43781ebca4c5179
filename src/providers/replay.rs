//! Replay provider for recorded raw frame logs

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::{debug, info};

use crate::codec::{CrcPolicy, DecoderStats, FrameDecoder};
use crate::config::ReplayConfig;
use crate::provider::Provider;
use crate::types::timestamp_after_u32;
use crate::{ClockSource, Frame, Result, TelemetryError};

const READ_BUFFER: usize = 1 << 20;

/// Replay provider that re-decodes a raw log with its original pacing.
///
/// Inter-frame gaps are taken from the embedded device timestamps and divided
/// by the speed multiplier; a speed of 0 replays as fast as possible. Sample
/// timestamps are the device timestamps.
pub struct ReplayProvider {
    path: PathBuf,
    decoder: FrameDecoder<BufReader<File>>,
    policy: CrcPolicy,

    /// Playback speed multiplier (1.0 = real time, 0 = unpaced)
    speed: f64,
    looping: bool,
    skip_frames: u64,

    /// Frames read in the current pass, skipped ones included
    frame_index: u64,
    /// Frames emitted in the current pass
    emitted: u64,
    prev_ms: Option<u32>,
    pass: u64,
}

impl ReplayProvider {
    /// Open the recorded log named in `config`.
    pub async fn open(config: &ReplayConfig, policy: CrcPolicy) -> Result<Self> {
        let decoder = open_decoder(&config.path, policy).await?;
        info!(
            path = %config.path.display(),
            speed = config.speed,
            looping = config.looping,
            skip_frames = config.skip_frames,
            "Opened replay log"
        );

        Ok(Self {
            path: config.path.clone(),
            decoder,
            policy,
            speed: config.speed.max(0.0),
            looping: config.looping,
            skip_frames: config.skip_frames,
            frame_index: 0,
            emitted: 0,
            prev_ms: None,
            pass: 0,
        })
    }

    /// Completed passes over the file (only advances when looping).
    pub fn passes(&self) -> u64 {
        self.pass
    }

    async fn rewind(&mut self) -> Result<()> {
        self.decoder = open_decoder(&self.path, self.policy).await?;
        self.frame_index = 0;
        self.emitted = 0;
        self.prev_ms = None;
        self.pass += 1;
        debug!(pass = self.pass, "Replay rewound");
        Ok(())
    }

    /// Sleep for the device-time gap since the previous frame, scaled by speed.
    async fn pace(&mut self, timestamp_ms: u32) {
        if self.speed <= 0.0 {
            return;
        }
        if let Some(prev) = self.prev_ms.filter(|prev| timestamp_after_u32(timestamp_ms, *prev)) {
            let delta_ms = timestamp_ms.wrapping_sub(prev);
            let nanos = (f64::from(delta_ms) * 1_000_000.0 / self.speed).round();
            tokio::time::sleep(Duration::from_nanos(nanos as u64)).await;
        }
        self.prev_ms = Some(timestamp_ms);
    }
}

async fn open_decoder(path: &Path, policy: CrcPolicy) -> Result<FrameDecoder<BufReader<File>>> {
    let file = File::open(path).await.map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
    Ok(FrameDecoder::with_policy(BufReader::with_capacity(READ_BUFFER, file), policy))
}

#[async_trait::async_trait]
impl Provider for ReplayProvider {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            let next = self
                .decoder
                .next_frame()
                .await
                .map_err(|e| TelemetryError::file_error(self.path.clone(), e))?;

            let Some(frame) = next else {
                info!(pass = self.pass, frames = self.emitted, "End of replay");
                if !self.looping || self.emitted == 0 {
                    return Ok(None);
                }
                self.rewind().await?;
                continue;
            };

            self.frame_index += 1;
            if self.frame_index <= self.skip_frames {
                continue;
            }

            self.pace(frame.timestamp_ms).await;
            self.emitted += 1;
            return Ok(Some(frame));
        }
    }

    fn clock(&self) -> ClockSource {
        ClockSource::Device
    }

    fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}
