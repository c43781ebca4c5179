//! Sensor interpretation: `(identifier, payload)` to named physical values.
//!
//! | identifier | name     | rule                                         |
//! |------------|----------|----------------------------------------------|
//! | `0x0100`   | rpm      | big-endian u16 ÷ 4                           |
//! | `0x0001`   | throttle | last byte as % of 255 (raw passthrough opt.) |
//! | `0x0070`   | grip     | last byte as % of 255                        |
//! | `0x0076`   | tps      | big-endian u16 clamped to 1023, as %         |
//! | `0x0009`   | coolant  | big-endian u16 or single byte, minus 40      |
//!
//! ```rust
//! use huskki::sensors::{SensorTable, TPS_DID, samples_to_update};
//! use huskki::{ClockSource, Frame, Value};
//!
//! let table = SensorTable::default();
//! let frame = Frame::new(900, TPS_DID, &[0x03, 0xFF]).unwrap();
//! let samples = table.interpret(&frame, ClockSource::Device);
//! let update = samples_to_update(&samples).unwrap();
//! assert_eq!(update["tps"], Value::Int(100));
//! assert_eq!(update["timestamp"], Value::Int(900));
//! ```

mod rule;
mod table;

pub use rule::{COOLANT_OFFSET, DecodeRule, TPS_FULL_SCALE};
pub use table::{
    COOLANT_DID, GRIP_DID, RPM_DID, SensorRule, SensorTable, THROTTLE_DID, TIMESTAMP_KEY, TPS_DID,
    samples_to_update,
};
