//! Per-identifier decode rules

use serde::{Deserialize, Serialize};

use crate::Value;

/// Sensor zero offset of the coolant temperature channel, in °C.
pub const COOLANT_OFFSET: i64 = -40;

/// Full-scale reading of the 10-bit throttle position sensor.
pub const TPS_FULL_SCALE: u16 = 1023;

/// How to turn a payload into one physical value.
///
/// Integer arithmetic throughout; percent rules round half up, which is
/// equivalent to `round(raw / full_scale * 100)` for every possible input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeRule {
    /// Big-endian u16 from bytes 0..2, integer-divided by `divisor`.
    U16Divide { divisor: u16 },

    /// Big-endian u16 from bytes 0..2, clamped to `full_scale`, as 0-100 %.
    U16Percent { full_scale: u16 },

    /// Last payload byte as 0-100 % of 255.
    LastBytePercent,

    /// Last payload byte passed through unscaled (0-255).
    LastByteRaw,

    /// Big-endian u16 when at least two bytes are present, otherwise the single
    /// byte, plus `offset`.
    Offset { offset: i64 },
}

impl DecodeRule {
    /// Decode `payload`, or `None` if it is too short for this rule.
    pub fn decode(&self, payload: &[u8]) -> Option<Value> {
        if payload.len() < self.min_len() {
            return None;
        }
        let value = match *self {
            DecodeRule::U16Divide { divisor } => {
                let raw = be_u16(payload)?;
                i64::from(raw.checked_div(divisor)?)
            }
            DecodeRule::U16Percent { full_scale } => {
                if full_scale == 0 {
                    return None;
                }
                let raw = be_u16(payload)?.min(full_scale);
                percent(u32::from(raw), u32::from(full_scale))
            }
            DecodeRule::LastBytePercent => percent(u32::from(*payload.last()?), 255),
            DecodeRule::LastByteRaw => i64::from(*payload.last()?),
            DecodeRule::Offset { offset } => {
                let raw = match payload {
                    [single] => i64::from(*single),
                    _ => i64::from(be_u16(payload)?),
                };
                raw + offset
            }
        };
        Some(Value::Int(value))
    }

    /// Minimum payload length this rule needs.
    pub fn min_len(&self) -> usize {
        match self {
            DecodeRule::U16Divide { .. } | DecodeRule::U16Percent { .. } => 2,
            DecodeRule::LastBytePercent | DecodeRule::LastByteRaw | DecodeRule::Offset { .. } => 1,
        }
    }
}

fn be_u16(payload: &[u8]) -> Option<u16> {
    match payload {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

fn percent(raw: u32, full_scale: u32) -> i64 {
    i64::from((raw * 100 + full_scale / 2) / full_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TPS: DecodeRule = DecodeRule::U16Percent { full_scale: TPS_FULL_SCALE };
    const COOLANT: DecodeRule = DecodeRule::Offset { offset: COOLANT_OFFSET };

    #[test]
    fn rpm_quarter_steps() {
        let rule = DecodeRule::U16Divide { divisor: 4 };
        assert_eq!(rule.decode(&[0x4E, 0x20]), Some(Value::Int(5000)));
        assert_eq!(rule.decode(&[0x00, 0x03]), Some(Value::Int(0)));
        assert_eq!(rule.decode(&[0x4E]), None);
    }

    #[test]
    fn zero_divisor_yields_nothing() {
        assert_eq!(DecodeRule::U16Divide { divisor: 0 }.decode(&[1, 2]), None);
        assert_eq!(DecodeRule::U16Percent { full_scale: 0 }.decode(&[1, 2]), None);
    }

    #[test]
    fn tps_scaling_and_clamp() {
        assert_eq!(TPS.decode(&[0x03, 0xFF]), Some(Value::Int(100)));
        assert_eq!(TPS.decode(&[0x00, 0x00]), Some(Value::Int(0)));
        assert_eq!(TPS.decode(&[0xFF, 0xFF]), Some(Value::Int(100)));
        assert_eq!(TPS.decode(&[0x04, 0x00]), Some(Value::Int(100)));
        // 512/1023 = 50.05 %
        assert_eq!(TPS.decode(&[0x02, 0x00]), Some(Value::Int(50)));
        // 5/1023 = 0.489 %, 6/1023 = 0.587 %
        assert_eq!(TPS.decode(&[0x00, 0x05]), Some(Value::Int(0)));
        assert_eq!(TPS.decode(&[0x00, 0x06]), Some(Value::Int(1)));
        assert_eq!(TPS.decode(&[0x03]), None);
    }

    #[test]
    fn tps_matches_float_rounding_everywhere() {
        for raw in 0..=TPS_FULL_SCALE {
            let expected = (f64::from(raw) / 1023.0 * 100.0).round() as i64;
            assert_eq!(TPS.decode(&raw.to_be_bytes()), Some(Value::Int(expected)), "raw={raw}");
        }
    }

    #[test]
    fn last_byte_rules() {
        assert_eq!(DecodeRule::LastBytePercent.decode(&[0x00, 0xFF]), Some(Value::Int(100)));
        assert_eq!(DecodeRule::LastBytePercent.decode(&[0x80]), Some(Value::Int(50)));
        assert_eq!(DecodeRule::LastByteRaw.decode(&[0x12, 0x80]), Some(Value::Int(128)));
        assert_eq!(DecodeRule::LastByteRaw.decode(&[]), None);
        for raw in 0..=255u8 {
            let expected = (f64::from(raw) / 255.0 * 100.0).round() as i64;
            assert_eq!(DecodeRule::LastBytePercent.decode(&[raw]), Some(Value::Int(expected)));
        }
    }

    #[test]
    fn coolant_offset() {
        assert_eq!(COOLANT.decode(&[0x28]), Some(Value::Int(0)));
        assert_eq!(COOLANT.decode(&[0x00, 0x32]), Some(Value::Int(10)));
        assert_eq!(COOLANT.decode(&[0x00]), Some(Value::Int(-40)));
        assert_eq!(COOLANT.decode(&[]), None);
    }

    #[test]
    fn payload_shorter_than_min_len_is_rejected() {
        let rules = [
            DecodeRule::U16Divide { divisor: 4 },
            TPS,
            DecodeRule::LastBytePercent,
            DecodeRule::LastByteRaw,
            COOLANT,
        ];
        let payload = [0x01, 0x02, 0x03];
        for rule in rules {
            let min = rule.min_len();
            for len in 0..min {
                assert_eq!(rule.decode(&payload[..len]), None, "{rule:?} len={len}");
            }
            assert!(rule.decode(&payload[..min]).is_some(), "{rule:?} len={min}");
        }
    }

    #[test]
    fn rules_deserialize_from_yaml() {
        let rule: DecodeRule = serde_yaml_ng::from_str("kind: last_byte_raw").unwrap();
        assert_eq!(rule, DecodeRule::LastByteRaw);

        let rule: DecodeRule = serde_yaml_ng::from_str("kind: u16_divide\ndivisor: 4").unwrap();
        assert_eq!(rule, DecodeRule::U16Divide { divisor: 4 });
        assert_eq!(rule.min_len(), 2);
    }
}
