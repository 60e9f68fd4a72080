//! In-memory accessory state
//!
//! Stands in for the home-automation accessory: it keeps, per quantity,
//! either the last published value or a "not responding" marker, plus the
//! accessory information record. Clones share the same table, so the
//! station can hand one clone to the poll loop and read another.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use weatherguard_core::{AccessoryStateSink, Quantity, SensorState, VERSION};

/// Accessory information record
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryInfo {
    /// Sensor manufacturer
    pub manufacturer: String,
    /// Sensor model
    pub model: String,
    /// `<hostname>-<interface name>`
    pub serial_number: String,
    /// Software version presenting the accessory
    pub firmware_revision: String,
}

impl AccessoryInfo {
    /// Information for a Bosch BME280 on `interface_path`
    ///
    /// The serial number combines the host name with the last path segment
    /// of the interface (`/dev/i2c-3` → `i2c-3`), which is unique per host.
    pub fn bme280(hostname: &str, interface_path: &str) -> Self {
        let interface = interface_path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(interface_path);

        Self {
            manufacturer: "Bosch".into(),
            model: "BME280".into(),
            serial_number: format!("{}-{}", hostname, interface),
            firmware_revision: VERSION.into(),
        }
    }
}

#[derive(Debug)]
struct StateTable {
    name: String,
    info: AccessoryInfo,
    states: HashMap<Quantity, SensorState>,
}

/// Shared accessory state table
#[derive(Debug, Clone)]
pub struct AccessoryState {
    inner: Arc<RwLock<StateTable>>,
}

impl AccessoryState {
    /// Empty table for the accessory called `name`
    pub fn new(name: impl Into<String>, info: AccessoryInfo) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StateTable {
                name: name.into(),
                info,
                states: HashMap::new(),
            })),
        }
    }

    /// Display name
    pub fn name(&self) -> String {
        self.read(|t| t.name.clone())
    }

    /// Accessory information record
    pub fn info(&self) -> AccessoryInfo {
        self.read(|t| t.info.clone())
    }

    /// Presented state of one quantity, `None` before the first update
    pub fn get(&self, quantity: Quantity) -> Option<SensorState> {
        self.read(|t| t.states.get(&quantity).cloned())
    }

    /// Presented numeric value of one quantity
    pub fn value(&self, quantity: Quantity) -> Option<f64> {
        match self.get(quantity)? {
            SensorState::Value(v) => Some(v),
            SensorState::Unavailable(_) => None,
        }
    }

    /// Check if no quantity is currently marked unavailable
    pub fn is_responding(&self) -> bool {
        self.read(|t| {
            !t.states
                .values()
                .any(|s| matches!(s, SensorState::Unavailable(_)))
        })
    }

    fn read<T>(&self, f: impl FnOnce(&StateTable) -> T) -> T {
        // A panic while holding the lock cannot leave the table half-written
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }
}

impl AccessoryStateSink for AccessoryState {
    fn update(&mut self, quantity: Quantity, state: SensorState) {
        let mut table = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if let SensorState::Unavailable(ref e) = state {
            log::debug!("{}: {} not responding ({})", table.name, quantity, e);
        }
        table.states.insert(quantity, state);
    }
}
