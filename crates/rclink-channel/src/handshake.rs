//! Credential exchange performed before a session starts
//!
//! The digest goes out on the command stream and the verdict comes back on
//! the telemetry stream. Anything the peer sent after the verdict line is
//! returned so the receiver can decode it.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use rclink_core::prelude::*;

use crate::protocol::{credential_digest, GrantReply, HANDSHAKE_REPLY_MAX};

/// Quiet period that ends a reply sent without a newline
const REPLY_IDLE: Duration = Duration::from_millis(100);

/// Send the credential digest and wait for the peer's verdict.
///
/// Returns the bytes that followed the verdict line.
///
/// # Errors
///
/// - [`Error::AuthenticationFailed`] if the reply is anything but `GRANTED`.
/// - [`Error::ConnectionFailed`] if the exchange itself fails: write error,
///   closed stream or no reply within `timeout`.
#[instrument(level = "debug", skip_all, fields(peer = %peer))]
pub async fn authenticate<W, R>(
    peer: &str,
    command_out: &mut W,
    telemetry_in: &mut R,
    credential: &str,
    timeout: Duration,
) -> Result<Vec<u8>>
where
    W: AsyncWrite + Unpin + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
{
    let digest = credential_digest(credential);
    command_out
        .write_all(&digest)
        .await
        .map_err(|e| Error::connection_failed(peer, format!("sending credential: {e}")))?;
    command_out
        .flush()
        .await
        .map_err(|e| Error::connection_failed(peer, format!("sending credential: {e}")))?;
    debug!("Sent credential digest to {}", peer);

    let reply = read_reply(peer, telemetry_in, timeout).await?;
    let reply = GrantReply::parse(&reply);
    if !reply.is_granted() {
        warn!("Peer {} rejected the credential: {:?}", peer, reply.text);
        return Err(Error::authentication_failed(reply.text));
    }

    info!("Authenticated with {}", peer);
    Ok(reply.leftover)
}

/// Collect the verdict, which may arrive in several segments.
///
/// Reading stops at the first newline, a full buffer, end of stream, or a
/// pause of [`REPLY_IDLE`] once some bytes have arrived.
async fn read_reply<R>(peer: &str, telemetry_in: &mut R, timeout: Duration) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; HANDSHAKE_REPLY_MAX];
    let mut len = 0;

    while len < buf.len() {
        let wait = if len == 0 { timeout } else { REPLY_IDLE };
        match tokio::time::timeout(wait, telemetry_in.read(&mut buf[len..])).await {
            Ok(Ok(0)) if len == 0 => {
                return Err(Error::connection_failed(
                    peer,
                    "stream closed during handshake",
                ))
            }
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                let newline = buf[len..len + n].contains(&b'\n');
                len += n;
                if newline {
                    break;
                }
            }
            Ok(Err(e)) => {
                return Err(Error::connection_failed(
                    peer,
                    format!("reading handshake reply: {e}"),
                ))
            }
            Err(_) if len == 0 => {
                return Err(Error::connection_failed(
                    peer,
                    format!("no handshake reply within {:?}", timeout),
                ))
            }
            Err(_) => break,
        }
    }

    buf.truncate(len);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const PEER: &str = "vehicle:8000";

    fn timeout() -> Duration {
        Duration::from_secs(1)
    }

    #[tokio::test]
    async fn test_granted_reply_authenticates() {
        let digest = credential_digest("69420");
        let mut out = Builder::new().write(&digest).build();
        let mut inbound = Builder::new().read(b"GRANTED\n").build();

        let leftover = authenticate(PEER, &mut out, &mut inbound, "69420", timeout())
            .await
            .unwrap();
        assert!(leftover.is_empty());
    }

    #[tokio::test]
    async fn test_split_grant_is_reassembled() {
        let digest = credential_digest("69420");
        let mut out = Builder::new().write(&digest).build();
        let mut inbound = Builder::new()
            .read(b"GRAN")
            .wait(Duration::from_millis(20))
            .read(b"TED\n{\"line\":true}")
            .build();

        let leftover = authenticate(PEER, &mut out, &mut inbound, "69420", timeout())
            .await
            .unwrap();
        assert_eq!(leftover, b"{\"line\":true}");
    }

    #[tokio::test]
    async fn test_grant_without_newline_ends_after_pause() {
        let digest = credential_digest("69420");
        let mut out = Builder::new().write(&digest).build();
        let (mut vehicle, mut inbound) = tokio::io::duplex(64);
        vehicle.write_all(b"GRANTED").await.unwrap();

        // The vehicle keeps the stream open; the pause ends the reply
        let leftover = authenticate(PEER, &mut out, &mut inbound, "69420", timeout())
            .await
            .unwrap();
        assert!(leftover.is_empty());
        drop(vehicle);
    }

    #[tokio::test]
    async fn test_rejected_reply_fails() {
        let digest = credential_digest("69420");
        let mut out = Builder::new().write(&digest).build();
        let mut inbound = Builder::new().read(b"rejected").build();

        let err = authenticate(PEER, &mut out, &mut inbound, "69420", timeout())
            .await
            .unwrap_err();
        match err {
            Error::AuthenticationFailed { reply } => assert_eq!(reply, "rejected"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lowercase_granted_is_rejected() {
        let digest = credential_digest("secret");
        let mut out = Builder::new().write(&digest).build();
        let mut inbound = Builder::new().read(b"granted\n").build();

        let err = authenticate(PEER, &mut out, &mut inbound, "secret", timeout())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn test_reply_with_trailing_telemetry() {
        let digest = credential_digest("69420");
        let mut out = Builder::new().write(&digest).build();
        let mut inbound = Builder::new().read(b"GRANTED\r\n{\"speed\":3}").build();

        let leftover = authenticate(PEER, &mut out, &mut inbound, "69420", timeout())
            .await
            .unwrap();
        assert_eq!(leftover, b"{\"speed\":3}");
    }

    #[tokio::test]
    async fn test_closed_stream_is_connection_failure() {
        let digest = credential_digest("69420");
        let mut out = Builder::new().write(&digest).build();
        let mut inbound = Builder::new().build();

        let err = authenticate(PEER, &mut out, &mut inbound, "69420", timeout())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let digest = credential_digest("69420");
        let mut out = Builder::new().write(&digest).build();
        let (_peer_side, mut inbound) = tokio::io::duplex(64);

        let err = authenticate(
            PEER,
            &mut out,
            &mut inbound,
            "69420",
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no handshake reply"));
    }
}
