//! # rclink-channel - Vehicle State Synchronization
//!
//! Opens the two TCP streams to a vehicle controller, authenticates, and keeps
//! a local command table and a reported telemetry table in sync with it.
//!
//! Depends on [`rclink_core`] for key vocabulary, values and error handling.
//!
//! ## Public API
//!
//! ### Connection
//! - [`connect()`] / [`connect_with()`] - Open both streams and authenticate
//! - [`ConnectOptions`] - Address, credential and timeouts
//! - [`authenticate()`] - Credential exchange over arbitrary streams
//!
//! ### Session
//! - [`Session`] - Start the receiver, set and read state, deactivate
//! - [`StateStore`] - Clonable handle for issuing commands from other tasks
//! - [`SessionEvent`] - Notifications delivered to subscribers
//!
//! ### Receiver
//! - [`ReceiverState`] - Position in the receive loop
//! - [`ReceiverStats`] / [`ReceiverExit`] - Outcome of a finished receiver
//!
//! ### Protocol
//! - [`PayloadDecoder`] - Pulls JSON objects out of the unframed telemetry stream
//! - [`credential_digest()`] - SHA-256 of the credential
//! - [`CommandState`] / [`ReportedState`] - The two state tables

pub mod connect;
pub mod events;
pub mod handshake;
pub mod protocol;
pub mod receiver;
pub mod session;
pub mod state;
pub mod store;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod transport;

pub use connect::{connect, connect_with, ConnectOptions};
pub use events::SessionEvent;
pub use handshake::authenticate;
pub use protocol::{credential_digest, GrantReply, Payload, PayloadDecoder};
pub use receiver::{ReceiverExit, ReceiverState, ReceiverStats};
pub use session::{Session, SessionOptions};
pub use state::{CommandState, ReportedState};
pub use store::StateStore;
