//! Configuration types for rclink
//!
//! Defines `Settings` (the `config.toml` file) and its sections.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use rclink_channel::{ConnectOptions, SessionOptions};

/// Application settings (config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub controls: ControlSettings,
}

/// Where the vehicle listens
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret; usually supplied via CLI or environment instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            credential: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Limits and timeouts for a session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionSettings {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub handshake_timeout_ms: u64,

    #[serde(default = "default_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Events buffered per subscriber before the oldest are dropped
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            connect_timeout_ms: default_timeout_ms(),
            handshake_timeout_ms: default_timeout_ms(),
            shutdown_timeout_ms: default_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_max_payload_bytes() -> usize {
    64 * 1024
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_event_capacity() -> usize {
    64
}

/// Behavior of the control engine
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ControlSettings {
    /// Switch autonomous modes off before closing the session
    #[serde(default = "default_true")]
    pub disengage_on_exit: bool,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            disengage_on_exit: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Build connection options, using `credential` when given and the
    /// configured credential otherwise. Returns `None` if neither is set.
    pub fn connect_options(&self, credential: Option<&str>) -> Option<ConnectOptions> {
        let credential = credential.or(self.connection.credential.as_deref())?;

        let options = ConnectOptions::new(
            self.connection.host.clone(),
            self.connection.port,
            credential,
        )
        .with_connect_timeout(Duration::from_millis(self.session.connect_timeout_ms))
        .with_handshake_timeout(Duration::from_millis(self.session.handshake_timeout_ms))
        .with_session(self.session_options());

        Some(options)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            max_payload_bytes: self.session.max_payload_bytes,
            shutdown_timeout: Duration::from_millis(self.session.shutdown_timeout_ms),
            event_capacity: self.session.event_capacity,
        }
    }
}
