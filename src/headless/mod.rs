//! Headless mode - drive a vehicle from stdin, report as JSON on stdout
//!
//! Commands are read one per line from stdin (see [`rclink_app::Message`]
//! for the syntax). Everything that happens is written to stdout as NDJSON
//! (newline-delimited JSON), one event per line, with an "event" field giving
//! its type.
//!
//! # Example Output
//!
//! ```json
//! {"event":"connected","peer":"192.168.1.11:8000","timestamp":1704700001000}
//! {"event":"command_sent","key":"forward","value":true,"timestamp":1704700002000}
//! {"event":"telemetry","sequence":1,"keys":["speed"],"dashboard":{...},"timestamp":1704700002100}
//! ```

pub mod runner;

use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

use rclink_app::Dashboard;
use rclink_channel::ReceiverStats;
use rclink_core::{CommandKey, Value};

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// Both streams are open and the credential was accepted
    Connected { peer: String, timestamp: i64 },

    /// A telemetry payload was merged
    Telemetry {
        sequence: u64,
        keys: Vec<String>,
        dashboard: Dashboard,
        timestamp: i64,
    },

    /// Reply to a `status` command
    Status { dashboard: Dashboard, timestamp: i64 },

    /// A command table was transmitted
    CommandSent {
        key: CommandKey,
        value: Value,
        timestamp: i64,
    },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },

    /// The session is closed
    Disconnected {
        reason: String,
        merged: Option<u64>,
        malformed: Option<u64>,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        // Consumers read line by line
        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn connected(peer: &str) -> Self {
        Self::Connected {
            peer: peer.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn telemetry(sequence: u64, keys: Vec<String>, dashboard: Dashboard) -> Self {
        Self::Telemetry {
            sequence,
            keys,
            dashboard,
            timestamp: Self::now(),
        }
    }

    pub fn status(dashboard: Dashboard) -> Self {
        Self::Status {
            dashboard,
            timestamp: Self::now(),
        }
    }

    pub fn command_sent(key: CommandKey, value: Value) -> Self {
        Self::CommandSent {
            key,
            value,
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }

    pub fn disconnected(reason: impl Into<String>, stats: Option<&ReceiverStats>) -> Self {
        Self::Disconnected {
            reason: reason.into(),
            merged: stats.map(|s| s.merged),
            malformed: stats.map(|s| s.malformed),
            timestamp: Self::now(),
        }
    }
}
