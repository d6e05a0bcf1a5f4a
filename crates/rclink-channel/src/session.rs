//! Session lifecycle: start the receiver, issue commands, deactivate
//!
//! ```text
//! from_transports / connect ──▶ Created ──start()──▶ Receiving
//!                                   │                   │
//!                              deactivate()        deactivate()
//!                                   ▼                   ▼
//!                                Closed ◀──────── receiver joined
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use rclink_core::prelude::*;
use rclink_core::{CommandKey, Value};

use crate::events::SessionEvent;
use crate::protocol::DEFAULT_MAX_PAYLOAD;
use crate::receiver::{Receiver, ReceiverState, ReceiverStats};
use crate::state::{CommandState, ReportedState};
use crate::store::StateStore;
use crate::transport::BoxedReader;

/// Tunables for a single session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Largest inbound object accepted before it is dropped
    pub max_payload_bytes: usize,
    /// How long `deactivate` waits for the receiver before aborting it
    pub shutdown_timeout: Duration,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD,
            shutdown_timeout: Duration::from_secs(5),
            event_capacity: 64,
        }
    }
}

/// An authenticated link to one vehicle.
pub struct Session {
    peer: String,
    store: StateStore,
    options: SessionOptions,
    /// Telemetry read half, handed to the receiver on `start`
    pending_reader: Option<BoxedReader>,
    /// Telemetry bytes that arrived with the handshake reply
    leftover: Vec<u8>,
    receiver: Option<JoinHandle<ReceiverStats>>,
    state_tx: Option<watch::Sender<ReceiverState>>,
    state_rx: watch::Receiver<ReceiverState>,
    deactivated: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer)
            .field("receiver_state", &*self.state_rx.borrow())
            .field("deactivated", &self.deactivated)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session over already-authenticated transports.
    ///
    /// `telemetry` is split: its read half feeds the receiver and its write
    /// half carries acknowledgements.
    pub fn from_transports<W, T>(
        peer: impl Into<String>,
        command_out: W,
        telemetry: T,
        options: SessionOptions,
    ) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (telemetry_in, ack_out) = tokio::io::split(telemetry);
        let store = StateStore::new(
            Box::new(command_out),
            Box::new(ack_out),
            options.event_capacity,
        );
        let (state_tx, state_rx) = watch::channel(ReceiverState::Idle);

        Self {
            peer: peer.into(),
            store,
            options,
            pending_reader: Some(Box::new(telemetry_in)),
            leftover: Vec::new(),
            receiver: None,
            state_tx: Some(state_tx),
            state_rx,
            deactivated: false,
        }
    }

    /// Bytes to decode before the first read from the telemetry stream.
    pub(crate) fn with_leftover(mut self, leftover: Vec<u8>) -> Self {
        self.leftover = leftover;
        self
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Clonable handle for issuing commands from other tasks
    pub fn store(&self) -> StateStore {
        self.store.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }

    /// Spawn the receiver task. Call once.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyStarted`] on a second call.
    /// - [`Error::SessionClosed`] after `deactivate`.
    pub fn start(&mut self) -> Result<()> {
        if self.deactivated {
            return Err(Error::SessionClosed);
        }
        let (Some(reader), Some(state_tx)) = (self.pending_reader.take(), self.state_tx.take())
        else {
            return Err(Error::AlreadyStarted);
        };

        let receiver = Receiver::new(
            reader,
            self.store.clone(),
            self.options.max_payload_bytes,
            state_tx,
            std::mem::take(&mut self.leftover),
        );
        self.receiver = Some(tokio::spawn(receiver.run()));
        info!("Session with {} started", self.peer);
        Ok(())
    }

    /// True while the receiver task is running
    pub fn is_receiving(&self) -> bool {
        self.receiver
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn receiver_state(&self) -> ReceiverState {
        *self.state_rx.borrow()
    }

    /// Watch receiver state transitions
    pub fn watch_receiver(&self) -> watch::Receiver<ReceiverState> {
        self.state_rx.clone()
    }

    pub fn is_deactivated(&self) -> bool {
        self.deactivated
    }

    pub async fn set(&self, key: CommandKey, value: impl Into<Value>) -> Result<()> {
        self.store.set(key, value).await
    }

    pub async fn set_many<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (CommandKey, Value)>,
    {
        self.store.set_many(entries).await
    }

    pub async fn toggle(&self, key: CommandKey) -> Result<bool> {
        self.store.toggle(key).await
    }

    pub async fn disengage_autonomy(&self) -> Result<()> {
        self.store.disengage_autonomy().await
    }

    pub async fn get(&self, key: impl AsRef<str>) -> Value {
        self.store.get(key).await
    }

    pub async fn get_many<K: AsRef<str>>(&self, keys: &[K]) -> Vec<Value> {
        self.store.get_many(keys).await
    }

    pub async fn command_snapshot(&self) -> CommandState {
        self.store.command_snapshot().await
    }

    pub async fn reported_snapshot(&self) -> ReportedState {
        self.store.reported_snapshot().await
    }

    /// Close the command stream and wait for the receiver to finish.
    ///
    /// The peer is expected to close the telemetry stream once the command
    /// stream closes. If the receiver is still running after
    /// `shutdown_timeout` it is aborted. Returns the receiver's stats when
    /// it finished on its own; later calls do nothing and return `None`.
    pub async fn deactivate(&mut self) -> Option<ReceiverStats> {
        if self.deactivated {
            return None;
        }
        self.deactivated = true;
        info!("Deactivating session with {}", self.peer);

        if let Err(e) = self.store.close_command_out().await {
            warn!("Error closing command stream: {}", e);
        }
        // Never started: nothing else holds the telemetry stream
        self.pending_reader = None;

        let mut handle = self.receiver.take()?;
        match tokio::time::timeout(self.options.shutdown_timeout, &mut handle).await {
            Ok(Ok(stats)) => {
                debug!("Receiver joined: {:?}", stats);
                Some(stats)
            }
            Ok(Err(e)) => {
                error!("Receiver task failed: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Receiver still running after {:?}, aborting",
                    self.options.shutdown_timeout
                );
                handle.abort();
                None
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.receiver.take() {
            handle.abort();
        }
    }
}
