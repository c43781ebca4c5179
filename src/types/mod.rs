//! Core types for telemetry data representation.
//!
//! - [`Frame`] is one validated wire record, sharing its raw bytes via `Arc`
//! - [`SensorSample`] is one decoded measurement tagged with its [`ClockSource`]
//! - [`Value`], [`Update`] and [`Snapshot`] are what the event hub carries
//!
//! ## Usage Example
//!
//! ```rust
//! use huskki::types::{Frame, Value, update};
//!
//! let frame = Frame::new(1500, 0x0100, &[0x4E, 0x20]).unwrap();
//! assert_eq!(frame.payload(), &[0x4E, 0x20]);
//!
//! let u = update([("rpm", Value::Int(5000))]);
//! assert_eq!(u.len(), 1);
//! ```

mod frame;
mod sample;
mod value;

pub use frame::Frame;
pub use sample::{ClockSource, SensorSample, wall_clock_ms};
pub use value::{Snapshot, Update, Value, update};

/// Compare device timestamps in u32 space with wraparound using the half-range
/// rule. Returns true if `a` is considered later than `b`.
pub fn timestamp_after_u32(a: u32, b: u32) -> bool {
    if a == b {
        return false;
    }
    a.wrapping_sub(b) < 0x8000_0000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_ordering_handles_wrap() {
        assert!(timestamp_after_u32(10, 5));
        assert!(!timestamp_after_u32(5, 10));
        assert!(!timestamp_after_u32(7, 7));
        assert!(timestamp_after_u32(3, u32::MAX - 2));
        assert!(!timestamp_after_u32(u32::MAX - 2, 3));
    }
}
