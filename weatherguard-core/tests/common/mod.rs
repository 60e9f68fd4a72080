//! Common test utilities for poll loop integration tests
//!
//! Provides:
//! - A scripted driver replaying a fixed sequence of read results
//! - Recording sinks whose calls can be inspected after the loop owns them
//! - A small deterministic noise generator

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use weatherguard_core::{
    AccessoryStateSink, DriverError, HistoryEntry, HistorySink, Quantity, Reading, SensorDriver,
    SensorState, SinkError, TransportSink,
};

/// Driver returning queued results in order, then repeating the fallback
pub struct ScriptedDriver {
    script: VecDeque<Result<Reading, DriverError>>,
    fallback: Result<Reading, DriverError>,
    pub reads: usize,
}

impl ScriptedDriver {
    pub fn new(script: Vec<Result<Reading, DriverError>>) -> Self {
        Self {
            script: script.into(),
            fallback: Err(DriverError::new(DriverError::BUS, "script exhausted")),
            reads: 0,
        }
    }

    /// Same reading forever
    pub fn steady(reading: Reading) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Ok(reading),
            reads: 0,
        }
    }
}

impl SensorDriver for ScriptedDriver {
    fn init(&mut self, _interface_path: &str) -> Result<(), DriverError> {
        Ok(())
    }

    fn read(&mut self) -> Result<Reading, DriverError> {
        self.reads += 1;
        self.script.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

/// Accessory sink recording every update
#[derive(Clone, Default)]
pub struct RecordingAccessory {
    pub updates: Arc<Mutex<Vec<(Quantity, SensorState)>>>,
}

impl RecordingAccessory {
    pub fn values(&self) -> Vec<(Quantity, f64)> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(q, s)| match s {
                SensorState::Value(v) => Some((*q, *v)),
                SensorState::Unavailable(_) => None,
            })
            .collect()
    }

    pub fn unavailable_count(&self) -> usize {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| matches!(s, SensorState::Unavailable(_)))
            .count()
    }
}

impl AccessoryStateSink for RecordingAccessory {
    fn update(&mut self, quantity: Quantity, state: SensorState) {
        self.updates.lock().unwrap().push((quantity, state));
    }
}

/// History sink recording entries, optionally failing every write
#[derive(Clone, Default)]
pub struct RecordingHistory {
    pub entries: Arc<Mutex<Vec<HistoryEntry>>>,
    pub fail: bool,
}

impl HistorySink for RecordingHistory {
    fn add_entry(&mut self, entry: &HistoryEntry) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Io("disk full".into()));
        }
        self.entries.lock().unwrap().push(*entry);
        Ok(())
    }
}

/// Transport sink recording publishes, with a switchable connection flag
#[derive(Clone)]
pub struct RecordingTransport {
    pub published: Arc<Mutex<Vec<(String, f64)>>>,
    pub connected: Arc<Mutex<bool>>,
}

impl RecordingTransport {
    pub fn connected() -> Self {
        Self {
            published: Arc::default(),
            connected: Arc::new(Mutex::new(true)),
        }
    }

    pub fn disconnected() -> Self {
        let transport = Self::connected();
        *transport.connected.lock().unwrap() = false;
        transport
    }
}

impl TransportSink for RecordingTransport {
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), SinkError> {
        self.published.lock().unwrap().push((topic.to_string(), value));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }
}

/// Deterministic xorshift noise in `[-amplitude, amplitude]`
pub struct Noise {
    state: u32,
}

impl Noise {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next(&mut self, amplitude: f64) -> f64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        let unit = self.state as f64 / u32::MAX as f64;
        (unit * 2.0 - 1.0) * amplitude
    }
}
