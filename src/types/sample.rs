//! Decoded sensor samples

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::Value;

/// Which clock a sample timestamp was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// Device milliseconds since boot, embedded in the frame.
    Device,
    /// Host wall-clock milliseconds since the Unix epoch, taken at decode time.
    Wall,
}

impl ClockSource {
    /// Timestamp for a frame decoded now, according to this clock.
    pub fn stamp(self, device_ms: u32) -> i64 {
        match self {
            ClockSource::Device => i64::from(device_ms),
            ClockSource::Wall => wall_clock_ms(),
        }
    }
}

/// Host wall-clock in Unix milliseconds.
pub fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// One decoded physical measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Stable logical name (`rpm`, `tps`, ...)
    pub name: String,

    /// Scaled physical value
    pub value: Value,

    /// Milliseconds on the clock named by `clock`
    pub timestamp: i64,

    pub clock: ClockSource,
}
