//! The three measured quantities and their unit transforms

use core::fmt;

use crate::constants::PASCALS_PER_MILLIBAR;

/// Physical quantity measured by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Quantity {
    /// Barometric pressure, read in Pa, published in mbar
    Pressure,
    /// Air temperature in °C
    Temperature,
    /// Relative humidity in %RH
    Humidity,
}

impl Quantity {
    /// All quantities in the order the poll loop records them
    pub const ALL: [Quantity; 3] = [Quantity::Pressure, Quantity::Temperature, Quantity::Humidity];

    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Quantity::Pressure => "pressure",
            Quantity::Temperature => "temperature",
            Quantity::Humidity => "humidity",
        }
    }

    /// Unit of the published (post-transform) value
    pub const fn unit(&self) -> &'static str {
        match self {
            Quantity::Pressure => "mbar",
            Quantity::Temperature => "°C",
            Quantity::Humidity => "%RH",
        }
    }

    /// Convert an averaged driver value into the published unit
    ///
    /// Applied after averaging, never to individual readings.
    pub fn transform(&self, averaged: f64) -> f64 {
        match self {
            Quantity::Pressure => averaged / PASCALS_PER_MILLIBAR,
            Quantity::Temperature | Quantity::Humidity => averaged,
        }
    }

    pub(crate) const fn index(&self) -> usize {
        match self {
            Quantity::Pressure => 0,
            Quantity::Temperature => 1,
            Quantity::Humidity => 2,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
