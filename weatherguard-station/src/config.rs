//! Station configuration
//!
//! Read from a JSON file shaped like the accessory block of a home
//! automation bridge:
//!
//! ```json
//! {
//!   "name": "Weather",
//!   "i2cAdaptor": "/dev/i2c-3",
//!   "enableHistory": true,
//!   "historyStoragePath": "/var/lib/weatherguard",
//!   "enableMQTT": true,
//!   "mqtt": { "url": "mqtt://localhost:1883" }
//! }
//! ```
//!
//! Only `name` is required. `enableFakeGato` and `fakeGatoStoragePath` are
//! accepted in place of the history keys.

use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use weatherguard_connectors::mqtt::{BrokerAddress, MqttError};
use weatherguard_core::constants::{
    DEFAULT_INTERFACE_PATH, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PUBLISH_PERIOD,
    DEFAULT_READ_TIMEOUT_MS,
};
use weatherguard_core::Topics;

/// Configuration file used when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "weatherguard.json";

/// History directory used when history is enabled without a path
pub const DEFAULT_HISTORY_DIR: &str = "/var/lib/weatherguard";

/// Configuration errors, all reported before the poll loop starts
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Cannot read configuration {path}: {source}")]
    Io {
        /// Configuration file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid JSON or has the wrong shape
    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field has an unusable value
    #[error("Invalid {field}: {reason}")]
    Invalid {
        /// JSON key
        field: &'static str,
        /// What is wrong with it
        reason: &'static str,
    },

    /// MQTT broker URL is malformed
    #[error(transparent)]
    Mqtt(#[from] MqttError),
}

/// MQTT block of the configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttSection {
    /// Broker URL
    pub url: String,
    /// Topic for temperature, `BME280/temperature` if unset
    #[serde(default)]
    pub temperature_topic: Option<String>,
    /// Topic for pressure, `BME280/pressure` if unset
    #[serde(default)]
    pub pressure_topic: Option<String>,
    /// Topic for humidity, `BME280/humidity` if unset
    #[serde(default)]
    pub humidity_topic: Option<String>,
}

impl MqttSection {
    /// Topics with defaults filled in
    pub fn topics(&self) -> Topics {
        let defaults = Topics::default();
        Topics {
            pressure: self.pressure_topic.clone().unwrap_or(defaults.pressure),
            temperature: self.temperature_topic.clone().unwrap_or(defaults.temperature),
            humidity: self.humidity_topic.clone().unwrap_or(defaults.humidity),
        }
    }
}

/// Complete station configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationConfig {
    /// Accessory display name
    pub name: String,

    /// Sensor interface path
    #[serde(default = "default_interface")]
    pub i2c_adaptor: String,

    /// Milliseconds between driver reads
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Samples between publishes
    #[serde(default = "default_publish_period")]
    pub publish_period: u32,

    /// Budget for one driver read in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Write published values to the history log
    #[serde(default, alias = "enableFakeGato")]
    pub enable_history: bool,

    /// Directory for the history log
    #[serde(default, alias = "fakeGatoStoragePath")]
    pub history_storage_path: Option<PathBuf>,

    /// Publish values to an MQTT broker
    #[serde(default, rename = "enableMQTT")]
    pub enable_mqtt: bool,

    /// Broker settings, required when `enableMQTT` is set
    #[serde(default)]
    pub mqtt: Option<MqttSection>,
}

fn default_interface() -> String {
    DEFAULT_INTERFACE_PATH.into()
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_publish_period() -> u32 {
    DEFAULT_PUBLISH_PERIOD
}

fn default_read_timeout() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

impl StationConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse and validate configuration text
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "name",
                reason: "must not be empty",
            });
        }
        self.publish_period()?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "pollIntervalMs",
                reason: "must be greater than zero",
            });
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "readTimeoutMs",
                reason: "must be greater than zero",
            });
        }
        if let Some(mqtt) = self.mqtt.as_ref().filter(|_| self.enable_mqtt) {
            BrokerAddress::parse(&mqtt.url)?;
        }
        Ok(())
    }

    /// Publish period as a non-zero count
    pub fn publish_period(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.publish_period).ok_or(ConfigError::Invalid {
            field: "publishPeriod",
            reason: "must be greater than zero",
        })
    }

    /// Time between driver reads
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Budget for one driver read
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// History directory, if history is enabled
    pub fn history_dir(&self) -> Option<PathBuf> {
        if !self.enable_history {
            return None;
        }
        Some(
            self.history_storage_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DIR)),
        )
    }

    /// Broker settings, if MQTT is enabled and configured
    ///
    /// An enabled transport without an `mqtt` block is logged and ignored.
    pub fn mqtt(&self) -> Option<&MqttSection> {
        if !self.enable_mqtt {
            return None;
        }
        if self.mqtt.is_none() {
            log::error!("MQTT is enabled but the mqtt configuration block is missing");
        }
        self.mqtt.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = StationConfig::from_json(r#"{"name": "Weather"}"#).unwrap();

        assert_eq!(config.i2c_adaptor, "/dev/i2c-3");
        assert_eq!(config.publish_period().unwrap().get(), 30);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.read_timeout(), Duration::from_secs(2));
        assert!(config.history_dir().is_none());
        assert!(config.mqtt().is_none());
    }

    #[test]
    fn full_config() {
        let config = StationConfig::from_json(
            r#"{
                "name": "Attic",
                "i2cAdaptor": "/dev/i2c-1",
                "pollIntervalMs": 1000,
                "publishPeriod": 60,
                "readTimeoutMs": 500,
                "enableHistory": true,
                "historyStoragePath": "/tmp/history",
                "enableMQTT": true,
                "mqtt": {
                    "url": "mqtt://broker:1883",
                    "temperatureTopic": "attic/temp"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.i2c_adaptor, "/dev/i2c-1");
        assert_eq!(config.publish_period().unwrap().get(), 60);
        assert_eq!(config.history_dir(), Some(PathBuf::from("/tmp/history")));

        let topics = config.mqtt().unwrap().topics();
        assert_eq!(topics.temperature, "attic/temp");
        assert_eq!(topics.pressure, "BME280/pressure");
        assert_eq!(topics.humidity, "BME280/humidity");
    }

    #[test]
    fn legacy_history_keys() {
        let config = StationConfig::from_json(
            r#"{"name": "Weather", "enableFakeGato": true, "fakeGatoStoragePath": "/srv/fg"}"#,
        )
        .unwrap();

        assert_eq!(config.history_dir(), Some(PathBuf::from("/srv/fg")));
    }

    #[test]
    fn history_dir_default() {
        let config =
            StationConfig::from_json(r#"{"name": "Weather", "enableHistory": true}"#).unwrap();
        assert_eq!(config.history_dir(), Some(PathBuf::from(DEFAULT_HISTORY_DIR)));
    }

    #[test]
    fn zero_publish_period_rejected() {
        let err = StationConfig::from_json(r#"{"name": "Weather", "publishPeriod": 0}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "publishPeriod", .. }));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let err = StationConfig::from_json(r#"{"name": "Weather", "pollIntervalMs": 0}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "pollIntervalMs", .. }));
    }

    #[test]
    fn missing_name_rejected() {
        let err = StationConfig::from_json(r#"{"i2cAdaptor": "/dev/i2c-1"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn bad_broker_url_rejected_when_enabled() {
        let text = r#"{"name": "W", "enableMQTT": true, "mqtt": {"url": "mqtts://b"}}"#;
        assert!(matches!(
            StationConfig::from_json(text),
            Err(ConfigError::Mqtt(_))
        ));

        // Ignored while MQTT is disabled
        let text = r#"{"name": "W", "enableMQTT": false, "mqtt": {"url": "mqtts://b"}}"#;
        assert!(StationConfig::from_json(text).is_ok());
    }

    #[test]
    fn mqtt_enabled_without_block_runs_without_transport() {
        let config =
            StationConfig::from_json(r#"{"name": "Weather", "enableMQTT": true}"#).unwrap();
        assert!(config.mqtt().is_none());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"name": "Porch", "pollIntervalMs": 2500}}"#).unwrap();

        let config = StationConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "Porch");
        assert_eq!(config.poll_interval(), Duration::from_millis(2500));
    }

    #[test]
    fn missing_file_reported_with_path() {
        let err = StationConfig::load("/nonexistent/weatherguard.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/weatherguard.json"));
    }
}
