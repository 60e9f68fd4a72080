//! WeatherGuard station
//!
//! Wires the sampling engine to its sinks from a configuration file and
//! runs it on a timer:
//!
//! - [`config`]: JSON configuration and validation
//! - [`scheduler`]: interval timer, read timeout, shutdown
//! - [`replay`]: file-backed driver replaying recorded readings
//!
//! [`assemble`] builds the poll loop with the accessory state sink always
//! attached and the history and MQTT sinks attached when enabled.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod replay;
pub mod scheduler;

use std::fs;

use tokio::task::JoinHandle;
use weatherguard_connectors::{
    AccessoryInfo, AccessoryState, JsonLinesHistory, MqttConfig, MqttTransport,
};
use weatherguard_core::PollLoop;

pub use config::{ConfigError, StationConfig};
pub use replay::{ReplayDriver, ReplayError};
pub use scheduler::{RunSummary, Scheduler};

/// A poll loop with its sinks attached
pub struct Station {
    /// Handle on the accessory state table shared with the poll loop
    pub accessory: AccessoryState,
    /// Idle poll loop, ready to start
    pub poll: PollLoop,
    /// MQTT event loop task, when the transport is enabled
    pub mqtt_task: Option<JoinHandle<()>>,
}

/// Build the poll loop and its sinks from `config`
///
/// A history directory that cannot be opened is logged and the station runs
/// without history. Must be called inside a tokio runtime when MQTT is
/// enabled.
pub fn assemble(config: &StationConfig) -> Result<Station, ConfigError> {
    let info = AccessoryInfo::bme280(&hostname(), &config.i2c_adaptor);
    log::info!(
        "{}: {} {} serial {} firmware {}",
        config.name,
        info.manufacturer,
        info.model,
        info.serial_number,
        info.firmware_revision
    );
    let accessory = AccessoryState::new(config.name.clone(), info);

    let mut builder = PollLoop::builder(accessory.clone()).publish_period(config.publish_period()?);

    if let Some(dir) = config.history_dir() {
        match JsonLinesHistory::open(&dir, &config.name) {
            Ok(history) => builder = builder.history(history),
            Err(e) => log::error!("History disabled: {}", e),
        }
    }

    let mut mqtt_task = None;
    if let Some(mqtt) = config.mqtt() {
        let client_id = format!("weatherguard-{}", accessory.info().serial_number);
        let mqtt_config = MqttConfig::new(mqtt.url.as_str()).client_id(client_id);
        let (transport, task) = MqttTransport::connect(mqtt_config)?;
        builder = builder.transport(transport, mqtt.topics());
        mqtt_task = Some(task);
    }

    Ok(Station {
        accessory,
        poll: builder.build(),
        mqtt_task,
    })
}

/// Host name for the accessory serial number
///
/// Falls back to `$HOSTNAME`, then `localhost`.
pub fn hostname() -> String {
    fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "localhost".to_string())
}
