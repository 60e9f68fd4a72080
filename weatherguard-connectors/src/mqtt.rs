//! MQTT transport sink
//!
//! Publishes each smoothed value as its decimal string on the quantity's
//! topic. Built on `rumqttc`: [`MqttTransport`] holds the `AsyncClient`
//! handle used by the poll loop, while the returned event loop task owns
//! the socket, reconnects, and tracks the connection flag the poll loop
//! checks before publishing.
//!
//! ## Broker URL
//!
//! ```text
//! mqtt://[user[:password]@]host[:port]
//! tcp://host[:port]
//! ```
//!
//! The port defaults to 1883. IPv6 literals are written in brackets
//! (`mqtt://[::1]:1883`). TLS schemes are rejected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::task::JoinHandle;
use weatherguard_core::{SinkError, TransportSink};

use crate::ConnectionStats;

/// Default MQTT port
pub const DEFAULT_PORT: u16 = 1883;

/// Pause between reconnect attempts after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// MQTT-specific errors
#[derive(Debug, Error)]
pub enum MqttError {
    /// Broker URL could not be parsed
    #[error("Invalid broker URL '{url}': {reason}")]
    InvalidUrl {
        /// URL as configured
        url: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Client request queue rejected the message
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

impl From<MqttError> for SinkError {
    fn from(err: MqttError) -> Self {
        SinkError::Transport(err.to_string())
    }
}

/// Parsed broker address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    /// Host name or IP
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Optional user name and password
    pub credentials: Option<(String, String)>,
}

impl BrokerAddress {
    /// Parse `mqtt://[user[:password]@]host[:port]`
    pub fn parse(url: &str) -> Result<Self, MqttError> {
        let invalid = |reason| MqttError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let rest = match url.split_once("://") {
            Some(("mqtt", rest)) | Some(("tcp", rest)) => rest,
            Some(("mqtts", _)) | Some(("ssl", _)) | Some(("wss", _)) => {
                return Err(invalid("TLS transports are not supported"))
            }
            Some(_) => return Err(invalid("unknown scheme")),
            None => url,
        };
        let rest = rest.trim_end_matches('/');

        let (credentials, host_port) = match rest.rsplit_once('@') {
            Some((userinfo, host_port)) => {
                let (user, pass) = userinfo.split_once(':').unwrap_or((userinfo, ""));
                (Some((user.to_string(), pass.to_string())), host_port)
            }
            None => (None, rest),
        };

        let (host, port) = match host_port.strip_prefix('[') {
            // IPv6 literal: [addr] or [addr]:port
            Some(bracketed) => {
                let (host, after) = bracketed
                    .split_once(']')
                    .ok_or_else(|| invalid("unclosed '[' in host"))?;
                let port = match after {
                    "" => DEFAULT_PORT,
                    _ => after
                        .strip_prefix(':')
                        .and_then(|p| p.parse().ok())
                        .ok_or_else(|| invalid("port is not a number"))?,
                };
                (host, port)
            }
            None => match host_port.rsplit_once(':') {
                Some((host, port)) => {
                    let port = port.parse().map_err(|_| invalid("port is not a number"))?;
                    (host, port)
                }
                None => (host_port, DEFAULT_PORT),
            },
        };

        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            credentials,
        })
    }
}

/// MQTT configuration
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker URL
    pub url: String,
    /// Client identifier presented to the broker
    pub client_id: String,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Delivery guarantee for published values
    pub qos: QoS,
    /// Ask the broker to retain the last value per topic
    pub retain: bool,
    /// Client request queue length
    pub queue_capacity: usize,
}

impl MqttConfig {
    /// Configuration with defaults for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_id: "weatherguard".into(),
            keep_alive: Duration::from_secs(30),
            qos: QoS::AtMostOnce,
            retain: false,
            queue_capacity: 32,
        }
    }

    /// Set the client identifier
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Set the keep-alive interval in seconds
    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.keep_alive = Duration::from_secs(secs);
        self
    }

    /// Retain published values on the broker
    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    fn options(&self) -> Result<MqttOptions, MqttError> {
        let broker = BrokerAddress::parse(&self.url)?;
        let mut options = MqttOptions::new(self.client_id.clone(), broker.host, broker.port);
        options.set_keep_alive(self.keep_alive);
        if let Some((user, pass)) = broker.credentials {
            options.set_credentials(user, pass);
        }
        Ok(options)
    }
}

/// MQTT transport handle used by the poll loop
pub struct MqttTransport {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    stats: Arc<Mutex<ConnectionStats>>,
    qos: QoS,
    retain: bool,
}

impl MqttTransport {
    /// Create the client and spawn its event loop on the current tokio
    /// runtime
    ///
    /// The transport reports disconnected until the broker acknowledges the
    /// connection.
    pub fn connect(config: MqttConfig) -> Result<(Self, JoinHandle<()>), MqttError> {
        let options = config.options()?;
        let (client, event_loop) = AsyncClient::new(options, config.queue_capacity);

        let connected = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(ConnectionStats::default()));

        let task = tokio::spawn(drive_event_loop(
            event_loop,
            config.url.clone(),
            connected.clone(),
            stats.clone(),
        ));

        Ok((
            Self {
                client,
                connected,
                stats,
                qos: config.qos,
                retain: config.retain,
            },
            task,
        ))
    }

    /// Snapshot of connection statistics
    pub fn stats(&self) -> ConnectionStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, f: impl FnOnce(&mut ConnectionStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}

impl TransportSink for MqttTransport {
    fn publish(&mut self, topic: &str, value: f64) -> Result<(), SinkError> {
        if !self.is_connected() {
            return Err(SinkError::NotConnected);
        }

        let payload = value.to_string();
        let len = payload.len() as u64;

        match self.client.try_publish(topic, self.qos, self.retain, payload) {
            Ok(()) => {
                self.record(|s| {
                    s.messages_sent += 1;
                    s.bytes_sent += len;
                });
                Ok(())
            }
            Err(e) => {
                let err = MqttError::from(e);
                self.record(|s| {
                    s.messages_failed += 1;
                    s.last_error = Some(err.to_string());
                });
                Err(err.into())
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Poll the event loop forever, tracking connection state
async fn drive_event_loop(
    mut event_loop: EventLoop,
    url: String,
    connected: Arc<AtomicBool>,
    stats: Arc<Mutex<ConnectionStats>>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                log::info!("MQTT client connected to {}", url);
                connected.store(true, Ordering::Release);
                if let Ok(mut stats) = stats.lock() {
                    stats.reconnections += 1;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                log::warn!("MQTT broker {} closed the session", url);
                connected.store(false, Ordering::Release);
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::AcqRel) {
                    log::error!("MQTT client error: {}", e);
                } else {
                    log::debug!("MQTT connect to {} failed: {}", url, e);
                }
                if let Ok(mut stats) = stats.lock() {
                    stats.last_error = Some(e.to_string());
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
