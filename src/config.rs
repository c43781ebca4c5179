//! Runtime configuration
//!
//! Every field has a default, so an empty YAML document is a valid config.
//! The binary layers command-line flags on top of an optional file.
//!
//! ```rust
//! use huskki::config::{Config, PortSelection};
//!
//! let config = Config::from_yaml_str(r#"
//! serial:
//!   port: /dev/ttyACM0
//!   baud_rate: 230400
//! replay:
//!   path: logs/RAWLOG.bin
//!   speed: 2.0
//!   loop: true
//! sensors:
//!   - identifier: 0x0001
//!     rules:
//!       - name: throttle
//!         rule: { kind: last_byte_raw }
//! "#).unwrap();
//!
//! assert!(matches!(config.serial.port, PortSelection::Path(_)));
//! assert!(config.replay.unwrap().looping);
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::codec::CrcPolicy;
use crate::history::{DEFAULT_HISTORY_CAPACITY, SampleHistory};
use crate::recorder::DEFAULT_FLUSH_EVERY;
use crate::sensors::{DecodeRule, SensorRule, SensorTable};
use crate::{Result, TelemetryError};

/// Baud rate of the relay firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub serial: SerialConfig,

    /// Address of the dashboard push endpoint
    pub listen_addr: SocketAddr,

    /// Replay a recorded log instead of reading the serial link
    pub replay: Option<ReplayConfig>,

    /// Input uses the `timestampMs,0xID,hex` line form instead of binary frames
    pub text_input: bool,

    pub recording: RecordingConfig,

    pub crc_policy: CrcPolicy,

    /// Points kept per charted channel
    pub history_capacity: usize,

    /// Channels whose recent history is kept
    pub history_names: Vec<String>,

    /// Decode rule replacements, applied over the built-in table
    pub sensors: Vec<SensorOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            replay: None,
            text_input: false,
            recording: RecordingConfig::default(),
            crc_policy: CrcPolicy::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_names: vec!["tps".to_string(), "rpm".to_string()],
            sensors: Vec::new(),
        }
    }
}

/// Serial device selection: a path, or `auto` to pick the first likely port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PortSelection {
    #[default]
    Auto,
    Path(PathBuf),
}

impl From<String> for PortSelection {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("auto") { PortSelection::Auto } else { PortSelection::Path(value.into()) }
    }
}

impl From<PortSelection> for String {
    fn from(value: PortSelection) -> Self {
        match value {
            PortSelection::Auto => "auto".to_string(),
            PortSelection::Path(path) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    pub port: PortSelection,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self { port: PortSelection::Auto, baud_rate: DEFAULT_BAUD_RATE }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayConfig {
    pub path: PathBuf,

    /// Speed multiplier; 0 replays as fast as possible
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Start over at end of file
    #[serde(default, rename = "loop")]
    pub looping: bool,

    /// Leading frames to skip on every pass
    #[serde(default)]
    pub skip_frames: u64,
}

impl ReplayConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), speed: default_speed(), looping: false, skip_frames: 0 }
    }
}

fn default_speed() -> f64 {
    1.0
}

/// Raw frame log written while reading a live link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordingConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub name: String,
    /// File extension including the dot
    pub ext: String,
    pub flush_every: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("logs"),
            name: "RAWLOG".to_string(),
            ext: ".bin".to_string(),
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

/// Replaces every rule for one identifier. An empty list disables it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorOverride {
    pub identifier: u16,
    #[serde(default)]
    pub rules: Vec<SensorRule>,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(yaml)
            .map_err(|e| TelemetryError::parse_error("configuration", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(replay) = &self.replay {
            if !replay.speed.is_finite() || replay.speed < 0.0 {
                return Err(TelemetryError::config_error(format!(
                    "replay speed must be a finite value >= 0, got {}",
                    replay.speed
                )));
            }
        }

        if self.recording.flush_every == 0 {
            return Err(TelemetryError::config_error("recording.flush_every must be at least 1"));
        }

        for sensor in &self.sensors {
            for rule in &sensor.rules {
                let degenerate = matches!(
                    rule.rule,
                    DecodeRule::U16Divide { divisor: 0 } | DecodeRule::U16Percent { full_scale: 0 }
                );
                if degenerate {
                    return Err(TelemetryError::config_error(format!(
                        "sensor '{}' ({:#06x}) has a zero divisor",
                        rule.name, sensor.identifier
                    )));
                }
            }
        }

        Ok(())
    }

    /// Built-in decode table with the configured overrides applied.
    pub fn sensor_table(&self) -> SensorTable {
        let mut table = SensorTable::default();
        for sensor in &self.sensors {
            table.set_rules(sensor.identifier, sensor.rules.clone());
        }
        table
    }

    /// Empty history buffers for the configured channels.
    pub fn history(&self) -> SampleHistory {
        SampleHistory::new(self.history_names.iter().cloned(), self.history_capacity)
    }
}
