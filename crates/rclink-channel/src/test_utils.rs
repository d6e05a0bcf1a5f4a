//! In-memory vehicle for exercising sessions without a network
//!
//! Enabled for this crate's own tests and, through the `test-helpers`
//! feature, for downstream crates.

use std::collections::VecDeque;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use crate::protocol::{Payload, PayloadDecoder, ACK_TOKEN, DEFAULT_MAX_PAYLOAD};
use crate::session::{Session, SessionOptions};

/// Buffer size of each in-memory stream
const PIPE_CAPACITY: usize = 1024 * 1024;

/// The vehicle's ends of both streams
pub struct FakePeer {
    pub commands: CommandTap,
    pub telemetry: TelemetryFeed,
}

/// Create a session wired to a [`FakePeer`]. The session is not started.
pub fn session_pair(options: SessionOptions) -> (Session, FakePeer) {
    let (command_client, command_peer) = tokio::io::duplex(PIPE_CAPACITY);
    let (telemetry_client, telemetry_peer) = tokio::io::duplex(PIPE_CAPACITY);

    let session =
        Session::from_transports("fake-vehicle", command_client, telemetry_client, options);
    let peer = FakePeer {
        commands: CommandTap::new(command_peer),
        telemetry: TelemetryFeed {
            stream: telemetry_peer,
        },
    };
    (session, peer)
}

/// Reads command tables as the vehicle would
pub struct CommandTap {
    stream: DuplexStream,
    decoder: PayloadDecoder,
    queued: VecDeque<Payload>,
}

impl CommandTap {
    fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            decoder: PayloadDecoder::new(DEFAULT_MAX_PAYLOAD),
            queued: VecDeque::new(),
        }
    }

    /// Next complete command table, or `None` once the stream is closed.
    pub async fn next_table(&mut self) -> Option<Payload> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(table) = self.queued.pop_front() {
                return Some(table);
            }
            let n = self.stream.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            for item in self.decoder.feed(&buf[..n]) {
                match item {
                    Ok(table) => self.queued.push_back(table),
                    Err(e) => panic!("client sent an undecodable table: {e}"),
                }
            }
        }
    }

    /// Every remaining table up to the end of the stream
    pub async fn wait_closed(&mut self) -> Vec<Payload> {
        let mut tables = Vec::new();
        while let Some(table) = self.next_table().await {
            tables.push(table);
        }
        tables
    }
}

/// Writes telemetry and reads acknowledgements as the vehicle would
pub struct TelemetryFeed {
    stream: DuplexStream,
}

impl TelemetryFeed {
    pub async fn send(&mut self, json: &str) {
        self.send_raw(json.as_bytes()).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream
            .write_all(bytes)
            .await
            .expect("telemetry stream closed");
    }

    /// Wait for one `Done.` acknowledgement.
    pub async fn expect_ack(&mut self) {
        let mut buf = [0u8; ACK_TOKEN.len()];
        self.stream
            .read_exact(&mut buf)
            .await
            .expect("telemetry stream closed before ack");
        assert_eq!(&buf[..], ACK_TOKEN, "unexpected acknowledgement bytes");
    }
}
