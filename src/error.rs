//! Error types for telemetry ingestion.
//!
//! Errors fall into three groups with very different handling:
//!
//! - **Framing errors** ([`FrameError`]): a corrupt span of the byte stream. The
//!   decoder recovers locally by resynchronizing; callers only ever see these in
//!   statistics and logs.
//! - **Line errors** ([`LineError`]): an unparseable record of the textual
//!   ingestion form. The line is skipped.
//! - **Telemetry errors** ([`TelemetryError`]): transport, file and configuration
//!   failures that reach the caller. Transport failures at startup are fatal.
//!
//! End of stream is never an error: providers return `Ok(None)`.
//!
//! ```rust
//! use huskki::TelemetryError;
//!
//! let error = TelemetryError::transport_failed("no serial ports found");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Failed to open telemetry transport: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Transport { .. } => true,
            TelemetryError::Io { .. } => true,
            TelemetryError::File { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Transport { .. } => vec![
                "Check the serial adapter is plugged in",
                "Pass an explicit device path instead of 'auto'",
                "Check permissions on the serial device (dialout group)",
            ],
            TelemetryError::File { .. } => vec![
                "Check file exists and is readable",
                "Ensure sufficient disk space for the raw log",
                "Check directory permissions",
            ],
            TelemetryError::Io { .. } => vec![
                "Check the serial cable and the relay microcontroller",
                "Restart the ingestion process",
            ],
            TelemetryError::Parse { .. } => vec![
                "Check data format compatibility",
                "Verify source data integrity",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the configuration file against the documented keys",
                "Remove the override to fall back to defaults",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for transport errors.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for mid-stream I/O errors.
    pub fn io_error(context: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Io { context: context.into(), source }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        TelemetryError::Config { reason: reason.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Io { context: "<unknown>".to_string(), source: err }
    }
}

/// A corrupt span of the binary frame stream.
///
/// Recovered locally by the decoder; never terminates a stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload length {len} exceeds maximum of {max}")]
    BadLength { len: u8, max: u8 },

    #[error("crc mismatch: computed {computed:#04x}, received {received:#04x}")]
    CrcMismatch { computed: u8, received: u8 },
}

/// Why a line of the textual ingestion form was skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineError {
    #[error("line is not valid UTF-8")]
    NotUtf8,

    #[error("expected at least 3 comma-separated fields, found {0}")]
    FieldCount(usize),

    #[error("timestamp '{0}' is not an unsigned integer")]
    Timestamp(String),

    #[error("identifier '{0}' lacks the 0x prefix")]
    MissingHexPrefix(String),

    #[error("identifier '{0}' is not a 16-bit hex value")]
    Identifier(String),

    #[error("payload is empty")]
    EmptyPayload,

    #[error("payload hex has odd length {0}")]
    OddLength(usize),

    #[error("payload is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("payload of {0} bytes exceeds frame maximum")]
    PayloadTooLong(usize),
}
