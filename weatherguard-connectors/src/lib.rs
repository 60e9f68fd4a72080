//! Downstream Sinks for Published Measurements
//!
//! ## Overview
//!
//! The core engine hands every published value to up to three sinks. This
//! crate provides the concrete ones used by the station:
//!
//! | Sink | Module | Backing |
//! |------|--------|---------|
//! | Accessory state | [`accessory`] | In-memory table shared through a cloneable handle |
//! | History | [`history`] | Append-only JSON Lines file |
//! | Transport | [`mqtt`] | MQTT broker via `rumqttc` |
//!
//! ## Call Discipline
//!
//! Sinks run synchronously on the poll loop's tick, so none of them may
//! block for long:
//! - MQTT publishes are queued with `try_publish`; the network work happens
//!   on the event loop task. A full queue is reported as an error, not
//!   waited on.
//! - History appends go through a buffered writer that is written out
//!   once per publish round, without `fsync`.
//! - Accessory updates take a short write lock.
//!
//! ## MQTT
//!
//! **Characteristics:**
//! - Persistent connection, automatic reconnect by the event loop
//! - QoS 0 by default; a lost sample is replaced 2.5 minutes later
//! - Payload is the value's decimal string (`"1013.25"`)
//! - Publishes while disconnected are skipped by the poll loop with a
//!   warning
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use weatherguard_connectors::mqtt::{MqttConfig, MqttTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MqttConfig::new("mqtt://broker.local:1883")
//!     .client_id("weatherguard-attic");
//! let (transport, event_loop) = MqttTransport::connect(config)?;
//! # drop((transport, event_loop));
//! # Ok(())
//! # }
//! ```

pub mod accessory;
pub mod history;

#[cfg(feature = "mqtt")]
pub mod mqtt;

// Re-export common types
pub use accessory::{AccessoryInfo, AccessoryState};
pub use history::{HistoryError, JsonLinesHistory};

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttError, MqttTransport};

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Total messages queued successfully
    pub messages_sent: u64,
    /// Total messages that could not be queued
    pub messages_failed: u64,
    /// Total payload bytes queued
    pub bytes_sent: u64,
    /// Number of (re)connections acknowledged by the broker
    pub reconnections: u32,
    /// Last error message
    pub last_error: Option<String>,
}
