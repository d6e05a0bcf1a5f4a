//! rclink-app - Configuration and control engine for rclink
//!
//! Loads settings, maps driver input onto vehicle controls and summarizes
//! telemetry for display. Drivers (such as the headless stdin mode in the
//! `rclink` binary) feed [`Message`]s to an [`Engine`].

pub mod config;
pub mod engine;
pub mod message;

pub use config::Settings;
pub use engine::{Dashboard, Engine, Outcome};
pub use message::Message;
