//! Driver spawns and manages the telemetry pipeline task

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::codec::DecoderStats;
use crate::history::SampleHistory;
use crate::hub::EventHub;
use crate::provider::Provider;
use crate::recorder::RawLogWriter;
use crate::sensors::{SensorTable, samples_to_update};

/// Consecutive provider errors tolerated before the driver gives up.
pub const MAX_ERRORS: u32 = 10;

/// Counters reported when the pipeline task ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Validated frames received from the provider
    pub frames: u64,
    /// Frames with no decode rule
    pub unknown_frames: u64,
    /// Updates handed to the hub
    pub updates: u64,
    /// Frames written to the raw log
    pub recorded: u64,
    /// Provider errors, consecutive or not
    pub errors: u64,
    /// Final decoder counters of the provider
    pub decoder: DecoderStats,
}

/// Everything the pipeline feeds.
#[derive(Clone)]
pub struct Pipeline {
    pub table: SensorTable,
    pub hub: EventHub,
    pub history: SampleHistory,
}

/// Handle to a running pipeline task.
pub struct DriverHandle {
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    join: JoinHandle<DriverStats>,
}

impl DriverHandle {
    /// True once the pipeline task has returned.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the pipeline to end on its own (EOF or too many errors).
    pub async fn join(self) -> Result<DriverStats, tokio::task::JoinError> {
        self.join.await
    }

    /// Cancel the pipeline and wait for it to flush and exit.
    pub async fn shutdown(self) -> Result<DriverStats, tokio::task::JoinError> {
        self.cancel.cancel();
        self.join.await
    }
}

/// Driver spawns the single task that reads frames, records them, interprets
/// them and publishes the resulting updates.
pub struct Driver;

impl Driver {
    /// Spawn the pipeline task for `provider`.
    ///
    /// The task ends when the provider reports end of stream, after
    /// [`MAX_ERRORS`] consecutive provider errors, or when `cancel` fires. The
    /// raw log, if any, is flushed and synced before the task returns.
    pub fn spawn<P>(
        provider: P,
        pipeline: Pipeline,
        recorder: Option<RawLogWriter>,
        cancel: CancellationToken,
    ) -> DriverHandle
    where
        P: Provider,
    {
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            Self::frame_reader_task(provider, pipeline, recorder, task_cancel).await
        });

        DriverHandle { cancel, join }
    }

    async fn frame_reader_task<P>(
        mut provider: P,
        pipeline: Pipeline,
        mut recorder: Option<RawLogWriter>,
        cancel: CancellationToken,
    ) -> DriverStats
    where
        P: Provider,
    {
        info!(clock = ?provider.clock(), "Frame reader task started");
        let clock = provider.clock();
        let mut stats = DriverStats::default();
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Frame reader cancelled");
                    break;
                }
                result = provider.next_frame() => result,
            };

            match result {
                Ok(Some(frame)) => {
                    stats.frames += 1;
                    error_count = 0;
                    trace!(
                        frame = stats.frames,
                        timestamp_ms = frame.timestamp_ms,
                        identifier = frame.identifier,
                        "Frame received"
                    );

                    if let Some(writer) = recorder.as_mut() {
                        if !frame.crc_valid() {
                            debug!(identifier = frame.identifier, "Not recording frame with bad checksum");
                        } else {
                            match writer.record(&frame).await {
                                Ok(()) => stats.recorded += 1,
                                Err(e) => {
                                    error!("Raw log write failed, recording disabled: {}", e);
                                    recorder = None;
                                }
                            }
                        }
                    }

                    let samples = pipeline.table.interpret(&frame, clock);
                    if samples.is_empty() {
                        stats.unknown_frames += 1;
                        continue;
                    }

                    pipeline.history.record(&samples);
                    if let Some(update) = samples_to_update(&samples) {
                        pipeline.hub.broadcast(update);
                        stats.updates += 1;
                    }
                }
                Ok(None) => {
                    info!(frames = stats.frames, "Provider stream ended");
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    stats.errors += 1;
                    error!("Provider error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if !e.is_retryable() {
                        error!("Provider error is not retryable, shutting down");
                        break;
                    }
                    if error_count >= MAX_ERRORS {
                        error!("Too many provider errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 50ms, 100ms, 200ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        if let Some(writer) = recorder {
            if let Err(e) = writer.finish().await {
                warn!("Failed to close raw log: {}", e);
            }
        }

        stats.decoder = provider.stats();
        if stats.decoder.framing_errors() > 0 {
            debug!(
                bad_length = stats.decoder.bad_length,
                crc_mismatch = stats.decoder.crc_mismatch,
                skipped_bytes = stats.decoder.skipped_bytes,
                "Framing errors recovered"
            );
        }
        info!(frames = stats.frames, updates = stats.updates, "Frame reader task ended");
        stats
    }
}
