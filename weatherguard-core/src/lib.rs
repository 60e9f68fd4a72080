//! Core sampling engine for WeatherGuard
//!
//! Turns a noisy 5-second reading stream from an environmental sensor into
//! a slow, smoothed measurement that is cheap to publish.
//!
//! Key constraints:
//! - One writer per channel, no locks in the hot path
//! - A published value is always a full-window average
//! - A failed read never touches window or gate state
//!
//! ```no_run
//! use weatherguard_core::{MeasurementChannel, Quantity};
//!
//! let mut pressure: MeasurementChannel = MeasurementChannel::new(Quantity::Pressure);
//!
//! for _ in 0..30 {
//!     if let Some(published) = pressure.record(101_325.0, 0) {
//!         assert_eq!(published.value, 1013.25);
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod constants;
pub mod driver;
pub mod errors;
pub mod gate;
pub mod poll;
pub mod quantity;
pub mod sinks;
pub mod time;
pub mod window;

// Public API
pub use channel::{MeasurementChannel, PublishedValue};
pub use driver::{Reading, SensorDriver};
pub use errors::{DriverError, SinkError, StationError};
pub use gate::PublishGate;
pub use poll::{PollLoop, PollLoopBuilder, PollState, TickReport};
pub use quantity::Quantity;
pub use sinks::{AccessoryStateSink, HistoryEntry, HistorySink, SensorState, Topics, TransportSink};
pub use window::SampleWindow;

/// Crate version, reported as the accessory firmware revision
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
