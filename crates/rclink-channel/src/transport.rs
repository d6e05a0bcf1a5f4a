//! Stream types and TCP connection setup

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use rclink_core::prelude::*;

/// Inbound half of a transport, owned by the receiver
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Outbound half of a transport, owned by the state store
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Open one TCP stream to `addr`, giving up after `timeout`.
pub async fn open_stream(addr: &str, timeout: Duration) -> Result<TcpStream> {
    let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(Error::connection_failed(addr, e.to_string())),
        Err(_) => {
            return Err(Error::connection_failed(
                addr,
                format!("timed out after {:?}", timeout),
            ))
        }
    };

    // Command tables are small and latency-sensitive
    stream
        .set_nodelay(true)
        .map_err(|e| Error::connection_failed(addr, e.to_string()))?;

    debug!("Connected to {}", addr);
    Ok(stream)
}
