//! Error Types for the Sampling Engine
//!
//! ## Error Categories
//!
//! ### Driver Errors
//! - Init failure: fatal for the accessory instance, the loop stays idle
//! - Read failure: transient, the tick is discarded for every quantity
//!
//! Both carry the same [`DriverError`] payload, a numeric code and a
//! message, so the driver collaborator can pass its own codes through
//! unchanged.
//!
//! ### Sink Errors
//! - Transport not connected, history write failed, payload could not be
//!   encoded. Logged by the poll loop and otherwise ignored: a failing sink
//!   never touches window or gate state.
//!
//! ## Error Handling Strategy
//!
//! ```rust
//! use weatherguard_core::{DriverError, StationError};
//!
//! fn describe(err: &StationError) -> &'static str {
//!     match err {
//!         StationError::DriverInit(_) => "sensor missing, check the interface path",
//!         StationError::AlreadyRunning => "start() called twice",
//!         StationError::NotRunning => "tick before start()",
//!     }
//! }
//!
//! let err = StationError::DriverInit(DriverError::new(DriverError::DEVICE, "no chip"));
//! assert_eq!(describe(&err), "sensor missing, check the interface path");
//! ```

use thiserror_no_std::Error;

/// Error reported by the sensor driver collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("driver error {code}: {message}")]
pub struct DriverError {
    /// Driver-specific error code
    pub code: i32,
    /// Human-readable description
    pub message: String,
}

impl DriverError {
    /// Device not found or chip ID mismatch
    pub const DEVICE: i32 = 1;
    /// Driver failed to initialise
    pub const DRIVER: i32 = 2;
    /// Invalid argument or invalid reading
    pub const INVALID: i32 = 3;
    /// Bus read or write failed
    pub const BUS: i32 = 4;
    /// Read did not complete in time
    pub const TIMEOUT: i32 = 5;
    /// A previous read still owns the device
    pub const BUSY: i32 = 6;

    /// Create an error from a code and message
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The read exceeded its time budget
    pub fn timeout() -> Self {
        Self::new(Self::TIMEOUT, "sensor read timed out")
    }

    /// The device is still busy with an earlier read
    pub fn busy() -> Self {
        Self::new(Self::BUSY, "sensor busy with a previous read")
    }

    /// A reading contained a NaN or infinite value
    pub fn non_finite(quantity: crate::Quantity) -> Self {
        Self::new(
            Self::INVALID,
            format!("{} reading is not a finite number", quantity.name()),
        )
    }
}

/// Errors raised by downstream sinks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Transport has no live connection to its broker
    #[error("Not connected")]
    NotConnected,

    /// Local storage failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Transport rejected or could not queue the message
    #[error("Transport error: {0}")]
    Transport(String),

    /// Value could not be encoded for the sink
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Poll loop lifecycle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StationError {
    /// Driver init failed; the loop stays idle and is not retried
    #[error("Sensor initialisation failed: {0}")]
    DriverInit(DriverError),

    /// `start()` called on a running loop
    #[error("Poll loop already running")]
    AlreadyRunning,

    /// Operation requires a running loop
    #[error("Poll loop not running")]
    NotRunning,
}
