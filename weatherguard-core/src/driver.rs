//! Sensor driver contract
//!
//! The driver is an opaque collaborator: register access, bus framing and
//! calibration compensation all live behind it. The core only sees
//! compensated floating point values or a [`DriverError`].
//!
//! ## Example Implementation
//!
//! ```rust
//! use weatherguard_core::{DriverError, Reading, SensorDriver};
//!
//! struct Constant(Reading);
//!
//! impl SensorDriver for Constant {
//!     fn init(&mut self, _interface_path: &str) -> Result<(), DriverError> {
//!         Ok(())
//!     }
//!
//!     fn read(&mut self) -> Result<Reading, DriverError> {
//!         Ok(self.0)
//!     }
//! }
//! ```

use crate::{errors::DriverError, quantity::Quantity};

/// One compensated sample of all three quantities
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Pressure in Pa
    pub pressure: f64,
    /// Temperature in °C
    pub temperature: f64,
    /// Relative humidity in %RH
    pub humidity: f64,
}

impl Reading {
    /// Create a reading from driver-native units
    pub const fn new(pressure: f64, temperature: f64, humidity: f64) -> Self {
        Self {
            pressure,
            temperature,
            humidity,
        }
    }

    /// Raw value for one quantity
    pub fn get(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::Pressure => self.pressure,
            Quantity::Temperature => self.temperature,
            Quantity::Humidity => self.humidity,
        }
    }

    /// Reject the whole reading if any value is NaN or infinite
    pub fn validate(&self) -> Result<(), DriverError> {
        for quantity in Quantity::ALL {
            if !self.get(quantity).is_finite() {
                return Err(DriverError::non_finite(quantity));
            }
        }
        Ok(())
    }
}

/// Source of raw readings
///
/// ## Implementation Requirements
///
/// - `init()` is called once; a failure is fatal for the accessory
/// - `read()` is called once per tick and should not block for long, the
///   station wraps it in a timeout anyway
/// - Errors carry a code and a message; the core treats any error as "no
///   reading this tick"
pub trait SensorDriver {
    /// Open and configure the device at `interface_path`
    fn init(&mut self, interface_path: &str) -> Result<(), DriverError>;

    /// Take one compensated reading
    fn read(&mut self) -> Result<Reading, DriverError>;
}

impl<D: SensorDriver + ?Sized> SensorDriver for Box<D> {
    fn init(&mut self, interface_path: &str) -> Result<(), DriverError> {
        (**self).init(interface_path)
    }

    fn read(&mut self) -> Result<Reading, DriverError> {
        (**self).read()
    }
}
