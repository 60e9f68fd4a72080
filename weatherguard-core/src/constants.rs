//! Sampling constants
//!
//! The defaults reproduce the behaviour of the deployed accessory: a
//! BME280 polled every 5 seconds, averaged over 30 samples, published
//! every 30 samples. That gives one published value every 150 seconds per
//! quantity.

/// Number of raw readings held by each sample window
pub const WINDOW_CAPACITY: usize = 30;

/// Accepted samples between two publishes
///
/// Kept equal to [`WINDOW_CAPACITY`] so the first publish already reflects
/// a full window.
pub const DEFAULT_PUBLISH_PERIOD: u32 = WINDOW_CAPACITY as u32;

/// Poll period in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Upper bound on a single driver read before the tick gives up
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2_000;

/// Pascals per millibar (hectopascal)
pub const PASCALS_PER_MILLIBAR: f64 = 100.0;

/// Device name used as the default MQTT topic prefix
pub const DEFAULT_DEVICE_NAME: &str = "BME280";

/// Default sensor interface path
pub const DEFAULT_INTERFACE_PATH: &str = "/dev/i2c-3";
