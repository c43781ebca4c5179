//! Framed ECU telemetry ingestion and live fan-out.
//!
//! Huskki reads a byte stream produced by a microcontroller relaying sensor
//! values from a motorcycle's engine control unit, recovers validated frames
//! from it, turns them into named sensor samples and pushes those to any
//! number of dashboard listeners.
//!
//! # Pipeline
//!
//! - **Codec**: resynchronizing [`FrameDecoder`] for the `AA 55` framed,
//!   CRC-8 checked wire format, plus the `timestampMs,0xID,hex` line form
//! - **Sensors**: per-identifier [`DecodeRule`](sensors::DecodeRule)s mapping
//!   payloads to [`SensorSample`]s
//! - **Hub**: [`EventHub`] merging every update into a snapshot and fanning it
//!   out through bounded, drop-on-full mailboxes
//! - **Providers**: live serial link, paced replay of raw logs, text captures
//!
//! # Quick Start
//!
//! ```rust
//! use huskki::{EventHub, FrameDecoder, SensorTable, ClockSource, samples_to_update};
//! use huskki::codec::format;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> std::io::Result<()> {
//! let mut bytes = vec![0x13, 0x37];
//! format::encode_into(1500, 0x0100, &[0x4E, 0x20], &mut bytes);
//!
//! let hub = EventHub::new();
//! let table = SensorTable::default();
//! let mut decoder = FrameDecoder::new(&bytes[..]);
//!
//! while let Some(frame) = decoder.next_frame().await? {
//!     let samples = table.interpret(&frame, ClockSource::Device);
//!     if let Some(update) = samples_to_update(&samples) {
//!         hub.broadcast(update);
//!     }
//! }
//! assert_eq!(hub.snapshot()["rpm"], huskki::Value::Int(5000));
//! # Ok(())
//! # }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding
pub mod codec;
pub mod sensors;

// Fan-out and persistence
pub mod history;
pub mod hub;
pub mod recorder;

// Stream-based ingestion architecture
pub mod driver;
pub mod provider;
pub mod providers;

// Application surface
pub mod app;
pub mod config;
pub mod server;

// Core exports
pub use error::*;
pub use types::*;

pub use codec::{CrcPolicy, DecoderStats, FrameDecoder, TextDecoder, decode_frames};
pub use sensors::{SensorTable, samples_to_update};

pub use history::SampleHistory;
pub use hub::{CancelHandle, EventHub, Subscription, SubscriptionId};
pub use recorder::RawLogWriter;

pub use app::App;
pub use config::Config;
pub use driver::{Driver, DriverHandle, DriverStats};
pub use provider::Provider;
pub use providers::{LiveProvider, ReplayProvider, TextProvider};
