//! Opening an authenticated session over TCP
//!
//! Both streams go to the same host and port: the first carries commands,
//! the second carries telemetry and acknowledgements.

use std::time::Duration;

use rclink_core::prelude::*;

use crate::handshake::authenticate;
use crate::session::{Session, SessionOptions};
use crate::transport::open_stream;

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub credential: String,
    /// Limit for each TCP connect
    pub connect_timeout: Duration,
    /// Limit for the handshake reply
    pub handshake_timeout: Duration,
    pub session: SessionOptions,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16, credential: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            credential: credential.into(),
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
            session: SessionOptions::default(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    /// `host:port` as passed to the socket layer
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connect with default timeouts.
///
/// See [`connect_with`].
pub async fn connect(host: &str, port: u16, credential: &str) -> Result<Session> {
    connect_with(ConnectOptions::new(host, port, credential)).await
}

/// Open both streams, authenticate and return an unstarted session.
///
/// # Errors
///
/// - [`Error::ConnectionFailed`] if either stream cannot be opened or the
///   handshake breaks off.
/// - [`Error::AuthenticationFailed`] if the vehicle rejects the credential.
///
/// Streams opened before a failure are closed when this returns.
pub async fn connect_with(options: ConnectOptions) -> Result<Session> {
    let addr = options.addr();
    info!("Connecting to {}", addr);

    let mut command_stream = open_stream(&addr, options.connect_timeout).await?;
    let mut telemetry_stream = open_stream(&addr, options.connect_timeout).await?;

    let leftover = authenticate(
        &addr,
        &mut command_stream,
        &mut telemetry_stream,
        &options.credential,
        options.handshake_timeout,
    )
    .await
    .with_context(|| format!("Handshake with {} failed", addr))?;

    if !leftover.is_empty() {
        debug!("{} telemetry bytes arrived with the handshake", leftover.len());
    }

    let session = Session::from_transports(addr, command_stream, telemetry_stream, options.session)
        .with_leftover(leftover);
    Ok(session)
}
