//! Lock-guarded state shared by the caller and the receiver
//!
//! One `tokio::sync::Mutex` covers the command table, the reported table and
//! both outbound writers. It is held across the network write of a command
//! table and across the acknowledgement of a merge, so transmissions go out
//! in call order and never interleave with a merge.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};

use rclink_core::prelude::*;
use rclink_core::{CommandKey, Value};

use crate::events::SessionEvent;
use crate::protocol::{Payload, ACK_TOKEN};
use crate::receiver::ReceiverExit;
use crate::state::{CommandState, ReportedState};
use crate::transport::BoxedWriter;

struct Shared {
    commands: CommandState,
    reported: ReportedState,
    /// `None` once the session is deactivated
    command_out: Option<BoxedWriter>,
    /// Write half of the telemetry stream, used only for acknowledgements
    ack_out: BoxedWriter,
}

impl Shared {
    /// Push the whole command table. Caller holds the lock.
    async fn transmit(&mut self) -> Result<()> {
        let payload = self.commands.encode()?;
        let writer = self.command_out.as_mut().ok_or(Error::SessionClosed)?;

        writer
            .write_all(&payload)
            .await
            .map_err(|e| Error::transport(format!("sending command table: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::transport(format!("flushing command table: {e}")))?;

        trace!("Sent command table ({} bytes)", payload.len());
        Ok(())
    }
}

/// Clonable handle to a session's state tables.
///
/// Every clone shares the same lock; use it to call `set`/`get` from several
/// tasks at once.
#[derive(Clone)]
pub struct StateStore {
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl StateStore {
    pub(crate) fn new(
        command_out: BoxedWriter,
        ack_out: BoxedWriter,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            shared: Arc::new(Mutex::new(Shared {
                commands: CommandState::new(),
                reported: ReportedState::new(),
                command_out: Some(command_out),
                ack_out,
            })),
            events,
        }
    }

    /// Register an observer for session events. Drop the receiver to unregister.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Set one control and transmit the full command table.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] after deactivation (the table is left untouched).
    /// - [`Error::Transport`] if the write fails; the table keeps the new value.
    pub async fn set(&self, key: CommandKey, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let mut shared = self.shared.lock().await;
        if shared.command_out.is_none() {
            return Err(Error::SessionClosed);
        }

        debug!("set {} = {}", key, value);
        shared.commands.set(key, value);
        shared.transmit().await
    }

    /// Set several controls and transmit the table once for the whole batch.
    pub async fn set_many<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (CommandKey, Value)>,
    {
        let mut shared = self.shared.lock().await;
        if shared.command_out.is_none() {
            return Err(Error::SessionClosed);
        }

        for (key, value) in entries {
            shared.commands.set(key, value);
        }
        shared.transmit().await
    }

    /// Flip a control and transmit; returns the new state.
    ///
    /// The current state is the vehicle's reported value when it has reported
    /// this key, otherwise the locally commanded value.
    pub async fn toggle(&self, key: CommandKey) -> Result<bool> {
        let mut shared = self.shared.lock().await;
        if shared.command_out.is_none() {
            return Err(Error::SessionClosed);
        }

        let current = if shared.reported.contains(key.as_str()) {
            shared.reported.get(key.as_str())
        } else {
            shared.commands.get(key)
        };
        let next = !current.is_truthy();

        debug!("toggle {} -> {}", key, next);
        shared.commands.set(key, Value::Bool(next));
        shared.transmit().await?;
        Ok(next)
    }

    /// Switch every autonomous driving mode off in one transmission.
    pub async fn disengage_autonomy(&self) -> Result<()> {
        self.set_many(
            CommandKey::AUTONOMY
                .iter()
                .map(|key| (*key, Value::Bool(false))),
        )
        .await
    }

    /// Last reported value of `key`, or `false` if never reported.
    pub async fn get(&self, key: impl AsRef<str>) -> Value {
        self.shared.lock().await.reported.get(key.as_ref())
    }

    /// Reported values for `keys`, in order, from one consistent snapshot.
    pub async fn get_many<K: AsRef<str>>(&self, keys: &[K]) -> Vec<Value> {
        let shared = self.shared.lock().await;
        keys.iter()
            .map(|key| shared.reported.get(key.as_ref()))
            .collect()
    }

    pub async fn command_snapshot(&self) -> CommandState {
        self.shared.lock().await.commands.clone()
    }

    pub async fn reported_snapshot(&self) -> ReportedState {
        self.shared.lock().await.reported.clone()
    }

    /// Merge an inbound payload, acknowledge it and notify observers.
    ///
    /// All three happen under the lock. A failed acknowledgement is logged
    /// and otherwise ignored. Returns the payload's sequence number.
    pub(crate) async fn merge_inbound(&self, payload: Payload) -> u64 {
        let mut shared = self.shared.lock().await;
        let keys = shared.reported.merge(payload);
        let sequence = shared.reported.merges();
        debug!("Merged telemetry #{}: {:?}", sequence, keys);

        if let Err(e) = write_ack(&mut shared.ack_out).await {
            warn!("Failed to acknowledge telemetry #{}: {}", sequence, e);
        }

        // No subscribers is not an error
        let _ = self.events.send(SessionEvent::DataReceived { sequence, keys });
        sequence
    }

    pub(crate) fn notify_stopped(&self, exit: ReceiverExit) {
        let _ = self.events.send(SessionEvent::ReceiverStopped { exit });
    }

    /// Shut down and drop the command writer. Idempotent.
    pub(crate) async fn close_command_out(&self) -> Result<()> {
        let writer = self.shared.lock().await.command_out.take();
        if let Some(mut writer) = writer {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

async fn write_ack(writer: &mut BoxedWriter) -> std::io::Result<()> {
    writer.write_all(ACK_TOKEN).await?;
    writer.flush().await
}
