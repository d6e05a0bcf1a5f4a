//! Wire protocol between rclink and the vehicle controller
//!
//! This module provides:
//! - The credential digest sent during the handshake
//! - Parsing of the handshake reply
//! - Decoding of inbound telemetry objects from an unframed byte stream
//!
//! The peer sends bare JSON objects with no length prefix or delimiter, so
//! [`PayloadDecoder`] buffers bytes and pulls complete objects out of them:
//! fragments wait for the rest, coalesced objects come out one by one, an
//! object with unsupported values is dropped whole, and a syntax error skips
//! ahead to the next `{`.

use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use sha2::{Digest, Sha256};

use rclink_core::prelude::*;
use rclink_core::Value;

/// Reply the peer sends when the credential is accepted
pub const GRANTED_TOKEN: &str = "GRANTED";

/// Acknowledgement written back after every merged telemetry object
pub const ACK_TOKEN: &[u8] = b"Done.";

/// Length of the credential digest
pub const DIGEST_LEN: usize = 32;

/// Largest handshake reply read from the peer
pub const HANDSHAKE_REPLY_MAX: usize = 1024;

/// Default limit for a single inbound object
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// A decoded inbound object: key name to value
pub type Payload = BTreeMap<String, Value>;

/// SHA-256 digest of the UTF-8 credential, as sent on the command stream.
pub fn credential_digest(credential: &str) -> [u8; DIGEST_LEN] {
    Sha256::digest(credential.as_bytes()).into()
}

// ─────────────────────────────────────────────────────────────────
// Handshake reply
// ─────────────────────────────────────────────────────────────────

/// Parsed handshake reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantReply {
    /// First line of the reply with surrounding whitespace removed
    pub text: String,
    /// Bytes after the first newline, already belonging to the telemetry stream
    pub leftover: Vec<u8>,
}

impl GrantReply {
    pub fn parse(bytes: &[u8]) -> Self {
        let (line, leftover) = match bytes.iter().position(|&b| b == b'\n') {
            Some(pos) => (&bytes[..pos], bytes[pos + 1..].to_vec()),
            None => (bytes, Vec::new()),
        };

        Self {
            text: String::from_utf8_lossy(line).trim().to_string(),
            leftover,
        }
    }

    /// Case-sensitive comparison against [`GRANTED_TOKEN`]
    pub fn is_granted(&self) -> bool {
        self.text == GRANTED_TOKEN
    }
}

// ─────────────────────────────────────────────────────────────────
// Inbound decoding
// ─────────────────────────────────────────────────────────────────

/// Incremental decoder for the unframed telemetry stream.
#[derive(Debug)]
pub struct PayloadDecoder {
    buf: Vec<u8>,
    max_payload: usize,
}

impl PayloadDecoder {
    pub fn new(max_payload: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_payload,
        }
    }

    /// Bytes buffered but not yet decoded
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append `data` and return every object that can now be decoded.
    ///
    /// Errors in the returned list are per-object; the decoder stays usable.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<Payload>> {
        self.buf.extend_from_slice(data);
        let mut out = Vec::new();

        loop {
            match self.buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(start) => {
                    self.buf.drain(..start);
                }
                None => {
                    self.buf.clear();
                    break;
                }
            }

            // Find where the next JSON value ends before typing it, so a
            // rejected object is dropped whole, nested objects included.
            let (next, consumed) = {
                let mut stream =
                    serde_json::Deserializer::from_slice(&self.buf).into_iter::<IgnoredAny>();
                let next = stream.next();
                (next, stream.byte_offset())
            };

            match next {
                Some(Ok(_)) => {
                    let decoded = serde_json::from_slice::<Payload>(&self.buf[..consumed])
                        .map_err(|e| Error::malformed(e.to_string()));
                    self.buf.drain(..consumed);
                    out.push(decoded);
                }
                Some(Err(e)) if e.is_eof() => {
                    if self.buf.len() > self.max_payload {
                        let size = self.buf.len();
                        self.buf.clear();
                        out.push(Err(Error::PayloadTooLarge {
                            size,
                            limit: self.max_payload,
                        }));
                    }
                    break;
                }
                Some(Err(e)) => {
                    out.push(Err(Error::malformed(e.to_string())));
                    self.resync();
                }
                None => break,
            }
        }

        out
    }

    /// Drop bytes up to the next candidate object start.
    fn resync(&mut self) {
        match self.buf.iter().skip(1).position(|&b| b == b'{') {
            Some(offset) => {
                self.buf.drain(..offset + 1);
            }
            None => self.buf.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> PayloadDecoder {
        PayloadDecoder::new(DEFAULT_MAX_PAYLOAD)
    }

    #[test]
    fn test_credential_digest_is_sha256() {
        let digest = credential_digest("69420");
        assert_eq!(digest.len(), DIGEST_LEN);
        assert_eq!(digest, <[u8; 32]>::from(Sha256::digest(b"69420")));
        assert_ne!(digest, credential_digest("69421"));
    }

    #[test]
    fn test_grant_reply_with_trailing_newline() {
        let reply = GrantReply::parse(b"GRANTED\n");
        assert!(reply.is_granted());
        assert!(reply.leftover.is_empty());
    }

    #[test]
    fn test_grant_reply_whitespace_and_crlf() {
        assert!(GrantReply::parse(b"  GRANTED \r\n").is_granted());
        assert!(GrantReply::parse(b"GRANTED").is_granted());
    }

    #[test]
    fn test_grant_reply_is_case_sensitive() {
        assert!(!GrantReply::parse(b"granted\n").is_granted());
        let rejected = GrantReply::parse(b"rejected");
        assert!(!rejected.is_granted());
        assert_eq!(rejected.text, "rejected");
    }

    #[test]
    fn test_grant_reply_keeps_leftover_telemetry() {
        let reply = GrantReply::parse(b"GRANTED\n{\"speed\":3}");
        assert!(reply.is_granted());
        assert_eq!(reply.leftover, b"{\"speed\":3}".to_vec());
    }

    #[test]
    fn test_decode_single_object() {
        let mut d = decoder();
        let out = d.feed(br#"{"distance":5,"line":true}"#);
        assert_eq!(out.len(), 1);
        let payload = out.into_iter().next().unwrap().unwrap();
        assert_eq!(payload["distance"], Value::Int(5));
        assert_eq!(payload["line"], Value::Bool(true));
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn test_decode_fragmented_object() {
        let mut d = decoder();
        assert!(d.feed(br#"{"dist"#).is_empty());
        assert!(d.pending() > 0);
        let out = d.feed(br#"ance":12.5}"#);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].as_ref().unwrap()["distance"],
            Value::Float(12.5)
        );
    }

    #[test]
    fn test_decode_coalesced_objects() {
        let mut d = decoder();
        let out = d.feed(b"{\"speed\":1}\n{\"speed\":2} {\"line\":false}");
        let speeds: Vec<_> = out.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(speeds.len(), 3);
        assert_eq!(speeds[1]["speed"], Value::Int(2));
        assert_eq!(speeds[2]["line"], Value::Bool(false));
    }

    #[test]
    fn test_garbage_then_valid_object() {
        let mut d = decoder();
        let out = d.feed(b"\xff\xfe not json {\"speed\":42}");
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Err(Error::MalformedPayload { .. })));
        assert_eq!(out[1].as_ref().unwrap()["speed"], Value::Int(42));
    }

    #[test]
    fn test_unsupported_value_type_is_malformed() {
        let mut d = decoder();
        let out = d.feed(br#"{"speed":"fast"}"#);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn test_nested_object_is_dropped_whole() {
        let mut d = decoder();
        let out = d.feed(br#"{"status":{"speed":99}}{"line":true}"#);
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Err(Error::MalformedPayload { .. })));
        let payload = out[1].as_ref().unwrap();
        assert!(!payload.contains_key("speed"));
        assert_eq!(payload["line"], Value::Bool(true));
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn test_rejected_object_split_across_reads() {
        let mut d = decoder();
        assert!(d.feed(br#"{"speed":"fast","extra":{"dist"#).is_empty());
        let out = d.feed(br#"ance":3}}"#);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
        assert_eq!(d.pending(), 0);
    }

    #[test]
    fn test_non_object_is_malformed() {
        let mut d = decoder();
        let out = d.feed(b"[1,2,3]");
        assert_eq!(out.len(), 1);
        assert!(out[0].is_err());
    }

    #[test]
    fn test_oversized_payload_is_dropped() {
        let mut d = PayloadDecoder::new(16);
        let out = d.feed(br#"{"distance": 1000000000000000000"#);
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0],
            Err(Error::PayloadTooLarge { limit: 16, .. })
        ));
        assert_eq!(d.pending(), 0);

        let out = d.feed(br#"{"line":true}"#);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_ok());
    }

    #[test]
    fn test_whitespace_only_is_ignored() {
        let mut d = decoder();
        assert!(d.feed(b" \r\n\t").is_empty());
        assert_eq!(d.pending(), 0);
    }
}
