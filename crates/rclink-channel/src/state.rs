//! The two state tables held by a session

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use rclink_core::prelude::*;
use rclink_core::{CommandKey, Value};

use crate::protocol::Payload;

// ─────────────────────────────────────────────────────────────────
// CommandState
// ─────────────────────────────────────────────────────────────────

/// Desired state of every control, as last set by the client.
///
/// Always holds every [`CommandKey`]; controls that were never set are
/// `false`. Serializes to the JSON object pushed on the command stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CommandState {
    entries: BTreeMap<CommandKey, Value>,
}

impl Default for CommandState {
    fn default() -> Self {
        Self {
            entries: CommandKey::ALL
                .iter()
                .map(|key| (*key, Value::default()))
                .collect(),
        }
    }
}

impl CommandState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn set(&mut self, key: CommandKey, value: Value) -> Value {
        self.entries.insert(key, value).unwrap_or_default()
    }

    pub fn get(&self, key: CommandKey) -> Value {
        self.entries.get(&key).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CommandKey, Value)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    /// Serialize the full table for transmission
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

// ─────────────────────────────────────────────────────────────────
// ReportedState
// ─────────────────────────────────────────────────────────────────

/// State reported by the vehicle, accumulated over every merged payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportedState {
    entries: HashMap<String, Value>,
    merges: u64,
}

impl ReportedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite every key of `payload`; keys not in the payload
    /// keep their last value. Returns the merged key names, sorted.
    pub fn merge(&mut self, payload: Payload) -> Vec<String> {
        let mut keys = Vec::with_capacity(payload.len());
        for (key, value) in payload {
            keys.push(key.clone());
            self.entries.insert(key, value);
        }
        self.merges += 1;
        keys
    }

    /// Last reported value, or `false` when the key was never reported
    pub fn get(&self, key: &str) -> Value {
        self.entries.get(key).copied().unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of payloads merged so far
    pub fn merges(&self) -> u64 {
        self.merges
    }
}
