//! Append-only raw frame log
//!
//! Every validated frame is written verbatim (magic through CRC) so a session
//! can be replayed later by running the same decoder over the file. The file
//! has no header; frames are self-delimiting through their length byte.

use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::{Frame, Result, TelemetryError};

/// Frames written between explicit flushes unless configured otherwise.
pub const DEFAULT_FLUSH_EVERY: u64 = 100;

const WRITE_BUFFER: usize = 1 << 20;

/// First path in `dir` that does not exist yet: `name.ext`, then `name_1.ext`,
/// `name_2.ext`, ... `ext` includes its leading dot.
pub fn next_available_path(dir: &Path, name: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{name}{ext}"));
    if !candidate.exists() {
        return candidate;
    }
    (1u64..)
        .map(|i| dir.join(format!("{name}_{i}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Buffered writer for the raw log. Owned by the single producer task.
pub struct RawLogWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    frames: u64,
    flush_every: u64,
}

impl RawLogWriter {
    /// Open `path` for appending, creating parent directories as needed.
    pub async fn create(path: impl Into<PathBuf>, flush_every: u64) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TelemetryError::file_error(parent.to_path_buf(), e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| TelemetryError::file_error(path.clone(), e))?;

        info!(path = %path.display(), "Recording raw frames");
        Ok(Self {
            writer: BufWriter::with_capacity(WRITE_BUFFER, file),
            path,
            frames: 0,
            flush_every: flush_every.max(1),
        })
    }

    /// Append one frame's exact wire bytes; flushes every `flush_every` frames.
    pub async fn record(&mut self, frame: &Frame) -> Result<()> {
        self.writer
            .write_all(frame.wire_bytes())
            .await
            .map_err(|e| TelemetryError::file_error(self.path.clone(), e))?;
        self.frames += 1;

        if self.frames % self.flush_every == 0 {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.map_err(|e| TelemetryError::file_error(self.path.clone(), e))?;
        debug!(frames = self.frames, "Raw log flushed");
        Ok(())
    }

    /// Flush outstanding bytes and close. Returns frames written.
    pub async fn finish(mut self) -> Result<u64> {
        self.flush().await?;
        self.writer
            .get_mut()
            .sync_all()
            .await
            .map_err(|e| TelemetryError::file_error(self.path.clone(), e))?;
        info!(path = %self.path.display(), frames = self.frames, "Raw log closed");
        Ok(self.frames)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
