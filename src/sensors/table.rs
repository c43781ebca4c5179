//! Identifier to sensor mapping

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::rule::{COOLANT_OFFSET, DecodeRule, TPS_FULL_SCALE};
use crate::{ClockSource, Frame, SensorSample, Update, Value};

/// Engine speed
pub const RPM_DID: u16 = 0x0100;
/// Computed throttle request
pub const THROTTLE_DID: u16 = 0x0001;
/// Twist-grip potentiometer
pub const GRIP_DID: u16 = 0x0070;
/// Throttle position sensor, 10-bit
pub const TPS_DID: u16 = 0x0076;
/// Coolant temperature
pub const COOLANT_DID: u16 = 0x0009;

/// Key under which every update carries its originating timestamp.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// One named value decoded from an identifier's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRule {
    pub name: String,
    pub rule: DecodeRule,
}

impl SensorRule {
    pub fn new(name: impl Into<String>, rule: DecodeRule) -> Self {
        Self { name: name.into(), rule }
    }
}

/// Decode rules keyed by identifier.
///
/// [`SensorTable::default`] holds the rules for the current firmware. Rules are
/// plain data and can be replaced per identifier, e.g. to switch throttle to
/// the legacy raw passthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorTable {
    rules: HashMap<u16, Vec<SensorRule>>,
}

impl Default for SensorTable {
    fn default() -> Self {
        Self::empty()
            .with_rule(RPM_DID, SensorRule::new("rpm", DecodeRule::U16Divide { divisor: 4 }))
            .with_rule(THROTTLE_DID, SensorRule::new("throttle", DecodeRule::LastBytePercent))
            .with_rule(GRIP_DID, SensorRule::new("grip", DecodeRule::LastBytePercent))
            .with_rule(
                TPS_DID,
                SensorRule::new("tps", DecodeRule::U16Percent { full_scale: TPS_FULL_SCALE }),
            )
            .with_rule(
                COOLANT_DID,
                SensorRule::new("coolant", DecodeRule::Offset { offset: COOLANT_OFFSET }),
            )
    }
}

impl SensorTable {
    /// Table that recognizes nothing.
    pub fn empty() -> Self {
        Self { rules: HashMap::new() }
    }

    /// Add a rule for `identifier`, keeping any existing ones.
    pub fn with_rule(mut self, identifier: u16, rule: SensorRule) -> Self {
        self.rules.entry(identifier).or_default().push(rule);
        self
    }

    /// Replace every rule for `identifier`.
    pub fn set_rules(&mut self, identifier: u16, rules: Vec<SensorRule>) {
        if rules.is_empty() {
            self.rules.remove(&identifier);
        } else {
            self.rules.insert(identifier, rules);
        }
    }

    pub fn rules_for(&self, identifier: u16) -> &[SensorRule] {
        self.rules.get(&identifier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_known(&self, identifier: u16) -> bool {
        self.rules.contains_key(&identifier)
    }

    /// Decode a frame into zero or more samples.
    ///
    /// Unknown identifiers and payloads too short for a rule yield nothing.
    pub fn interpret(&self, frame: &Frame, clock: ClockSource) -> Vec<SensorSample> {
        let rules = self.rules_for(frame.identifier);
        if rules.is_empty() {
            return Vec::new();
        }

        let timestamp = clock.stamp(frame.timestamp_ms);
        rules
            .iter()
            .filter_map(|r| {
                r.rule.decode(frame.payload()).map(|value| SensorSample {
                    name: r.name.clone(),
                    value,
                    timestamp,
                    clock,
                })
            })
            .collect()
    }
}

/// Collapse the samples of one frame into a single broadcast, with the
/// originating timestamp under [`TIMESTAMP_KEY`]. `None` when there is nothing
/// to broadcast.
pub fn samples_to_update(samples: &[SensorSample]) -> Option<Update> {
    let first = samples.first()?;
    let mut update: Update =
        samples.iter().map(|s| (s.name.clone(), s.value.clone())).collect();
    update.insert(TIMESTAMP_KEY.to_string(), Value::Int(first.timestamp));
    Some(update)
}
