use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for both the listening server and the message broker.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to, and how often the
/// acceptor wakes up to check whether it should keep running.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub accept_poll_ms: u64,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms.max(1))
    }
}

/// Configuration settings for the broker.
///
/// Controls the connection cap, how session bytes are split into messages,
/// how long an acknowledgement write may block and how long shutdown waits
/// for sessions before closing them.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub max_connections: usize,
    pub framing: Framing,
    pub read_buffer_bytes: usize,
    /// Longest unterminated line accepted under `Framing::Line`.
    pub max_line_bytes: usize,
    /// A peer that does not drain its acknowledgements within this time is
    /// disconnected.
    pub write_timeout_ms: u64,
    pub drain_timeout_ms: u64,
}

impl BrokerSettings {
    pub fn write_timeout(&self) -> Duration {
        // a zero timeout is rejected by the socket layer
        Duration::from_millis(self.write_timeout_ms.max(1))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// How a session's byte stream is cut into messages.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Newline-delimited messages, reassembled across reads.
    #[default]
    Line,
    /// Every successful read is one message.
    Read,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub accept_poll_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub framing: Option<Framing>,
    pub read_buffer_bytes: Option<usize>,
    pub max_line_bytes: Option<usize>,
    pub write_timeout_ms: Option<u64>,
    pub drain_timeout_ms: Option<u64>,
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server;
        let broker = self.broker;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                accept_poll_ms: server
                    .as_ref()
                    .and_then(|s| s.accept_poll_ms)
                    .unwrap_or(default.server.accept_poll_ms),
            },
            broker: BrokerSettings {
                max_connections: broker
                    .as_ref()
                    .and_then(|b| b.max_connections)
                    .unwrap_or(default.broker.max_connections),
                framing: broker
                    .as_ref()
                    .and_then(|b| b.framing)
                    .unwrap_or(default.broker.framing),
                read_buffer_bytes: broker
                    .as_ref()
                    .and_then(|b| b.read_buffer_bytes)
                    .unwrap_or(default.broker.read_buffer_bytes),
                max_line_bytes: broker
                    .as_ref()
                    .and_then(|b| b.max_line_bytes)
                    .unwrap_or(default.broker.max_line_bytes),
                write_timeout_ms: broker
                    .as_ref()
                    .and_then(|b| b.write_timeout_ms)
                    .unwrap_or(default.broker.write_timeout_ms),
                drain_timeout_ms: broker
                    .as_ref()
                    .and_then(|b| b.drain_timeout_ms)
                    .unwrap_or(default.broker.drain_timeout_ms),
            },
        }
    }
}

/// Provides default values for `Settings`.
///
/// Listens on all interfaces on port 9090 with a one second accept poll.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 9090,
                accept_poll_ms: 1000,
            },
            broker: BrokerSettings {
                max_connections: 1000,
                framing: Framing::Line,
                read_buffer_bytes: 1024,
                max_line_bytes: 64 * 1024,
                write_timeout_ms: 1000,
                drain_timeout_ms: 2000,
            },
        }
    }
}
