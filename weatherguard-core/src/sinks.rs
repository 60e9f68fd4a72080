//! Downstream sink contracts
//!
//! Sinks consume [`PublishedValue`](crate::PublishedValue)s. They are
//! comparatively expensive, which is why the poll loop only calls them on
//! publish events and never at raw poll frequency.
//!
//! | Sink | Called with | Presence |
//! |------|-------------|----------|
//! | [`AccessoryStateSink`] | every publish, every read failure | always |
//! | [`HistorySink`] | every publish | optional |
//! | [`TransportSink`] | every publish while connected | optional |

use crate::{
    constants::DEFAULT_DEVICE_NAME,
    errors::{DriverError, SinkError},
    quantity::Quantity,
};

/// What the accessory presents for one quantity
#[derive(Debug, Clone, PartialEq)]
pub enum SensorState {
    /// Latest published value in the quantity's unit
    Value(f64),
    /// Sensor not responding; carries the read failure
    Unavailable(DriverError),
}

/// Home-automation accessory state
///
/// Must present `Unavailable` distinctly from any numeric value, upstream
/// maps it to "not responding".
pub trait AccessoryStateSink {
    /// Update the presented state of one quantity
    fn update(&mut self, quantity: Quantity, state: SensorState);
}

/// One history log entry; fields not published in this call stay `None`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryEntry {
    /// Unix time in seconds
    pub time: u64,
    /// Pressure in mbar
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub pressure: Option<f64>,
    /// Temperature in °C
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub temp: Option<f64>,
    /// Relative humidity in %RH
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub humidity: Option<f64>,
}

impl HistoryEntry {
    /// Entry carrying a single quantity
    pub fn single(time: u64, quantity: Quantity, value: f64) -> Self {
        let mut entry = Self {
            time,
            ..Self::default()
        };
        match quantity {
            Quantity::Pressure => entry.pressure = Some(value),
            Quantity::Temperature => entry.temp = Some(value),
            Quantity::Humidity => entry.humidity = Some(value),
        }
        entry
    }
}

/// Long-term history log
pub trait HistorySink {
    /// Append one entry
    fn add_entry(&mut self, entry: &HistoryEntry) -> Result<(), SinkError>;
}

/// Message-bus publisher
pub trait TransportSink {
    /// Publish `value` on `topic`
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), SinkError>;

    /// Check if the transport currently has a broker connection
    fn is_connected(&self) -> bool;
}

/// Per-quantity transport topics
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Topics {
    /// Topic for pressure values
    pub pressure: String,
    /// Topic for temperature values
    pub temperature: String,
    /// Topic for humidity values
    pub humidity: String,
}

impl Topics {
    /// `<device>/pressure`, `<device>/temperature`, `<device>/humidity`
    pub fn for_device(device: &str) -> Self {
        Self {
            pressure: format!("{}/pressure", device),
            temperature: format!("{}/temperature", device),
            humidity: format!("{}/humidity", device),
        }
    }

    /// Topic for one quantity
    pub fn topic(&self, quantity: Quantity) -> &str {
        match quantity {
            Quantity::Pressure => &self.pressure,
            Quantity::Temperature => &self.temperature,
            Quantity::Humidity => &self.humidity,
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::for_device(DEFAULT_DEVICE_NAME)
    }
}

impl<S: AccessoryStateSink + ?Sized> AccessoryStateSink for Box<S> {
    fn update(&mut self, quantity: Quantity, state: SensorState) {
        (**self).update(quantity, state)
    }
}

impl<S: HistorySink + ?Sized> HistorySink for Box<S> {
    fn add_entry(&mut self, entry: &HistoryEntry) -> Result<(), SinkError> {
        (**self).add_entry(entry)
    }
}

impl<S: TransportSink + ?Sized> TransportSink for Box<S> {
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), SinkError> {
        (**self).publish(topic, value)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
