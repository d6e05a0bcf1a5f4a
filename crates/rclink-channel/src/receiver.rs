//! Background task that applies inbound telemetry to the state store
//!
//! ```text
//! Idle ──start()──▶ WaitingForData ──bytes──▶ Decoding ──object──▶ Merging
//!                        ▲                      │                     │
//!                        │                  malformed            ack + notify
//!                        │                      │                     ▼
//!                        └──────────────────────┴──────────────── AckSent
//!
//! WaitingForData ──EOF / read error──▶ Stopped
//! ```

use tokio::io::AsyncReadExt;
use tokio::sync::watch;

use rclink_core::prelude::*;

use crate::protocol::{Payload, PayloadDecoder};
use crate::store::StateStore;
use crate::transport::BoxedReader;

/// Size of a single read from the telemetry stream
const READ_CHUNK: usize = 4096;

/// Where the receiver is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Not started yet
    Idle,
    WaitingForData,
    Decoding,
    Merging,
    AckSent,
    Stopped,
}

/// Why the receiver stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverExit {
    /// The peer closed the telemetry stream
    StreamClosed,
    /// Reading failed (connection reset and similar)
    ReadFailed { message: String },
}

/// Summary returned when the receiver task is joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Payloads merged into the reported state
    pub merged: u64,
    /// Payloads dropped as malformed or oversized
    pub malformed: u64,
    pub exit: ReceiverExit,
}

pub(crate) struct Receiver {
    reader: BoxedReader,
    store: StateStore,
    decoder: PayloadDecoder,
    state_tx: watch::Sender<ReceiverState>,
    /// Bytes read together with the handshake reply
    leftover: Vec<u8>,
    merged: u64,
    malformed: u64,
}

impl Receiver {
    pub(crate) fn new(
        reader: BoxedReader,
        store: StateStore,
        max_payload: usize,
        state_tx: watch::Sender<ReceiverState>,
        leftover: Vec<u8>,
    ) -> Self {
        Self {
            reader,
            store,
            decoder: PayloadDecoder::new(max_payload),
            state_tx,
            leftover,
            merged: 0,
            malformed: 0,
        }
    }

    /// Run until the telemetry stream closes.
    pub(crate) async fn run(mut self) -> ReceiverStats {
        info!("Receiver started");

        if !self.leftover.is_empty() {
            let leftover = std::mem::take(&mut self.leftover);
            self.transition(ReceiverState::Decoding);
            let items = self.decoder.feed(&leftover);
            self.apply(items).await;
        }

        let mut buf = vec![0u8; READ_CHUNK];
        let exit = loop {
            self.transition(ReceiverState::WaitingForData);

            match self.reader.read(&mut buf).await {
                Ok(0) => {
                    info!("Telemetry stream closed by peer");
                    break ReceiverExit::StreamClosed;
                }
                Ok(n) => {
                    self.transition(ReceiverState::Decoding);
                    let items = self.decoder.feed(&buf[..n]);
                    self.apply(items).await;
                }
                Err(e) => {
                    error!("Telemetry read error: {}", e);
                    break ReceiverExit::ReadFailed {
                        message: e.to_string(),
                    };
                }
            }
        };

        self.transition(ReceiverState::Stopped);
        info!(
            "Receiver stopped ({:?}): {} merged, {} malformed",
            exit, self.merged, self.malformed
        );
        self.store.notify_stopped(exit.clone());

        ReceiverStats {
            merged: self.merged,
            malformed: self.malformed,
            exit,
        }
    }

    async fn apply(&mut self, items: Vec<Result<Payload>>) {
        for item in items {
            match item {
                Ok(payload) => {
                    self.transition(ReceiverState::Merging);
                    self.store.merge_inbound(payload).await;
                    self.merged += 1;
                    self.transition(ReceiverState::AckSent);
                }
                Err(e) => {
                    warn!("Dropping telemetry payload: {}", e);
                    self.malformed += 1;
                }
            }
        }
    }

    fn transition(&self, state: ReceiverState) {
        self.state_tx.send_replace(state);
    }
}
