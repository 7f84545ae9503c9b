pub mod checksum;
pub mod codec;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

use serde::Serialize;
use std::io;
use thiserror::Error;

pub use codec::{decode, default_payload, encode, DecodedReply, EchoHeader};
pub use session::{
    resolve_ipv4, EchoSession, EchoTransport, RawSocketTransport, MAX_ATTEMPT_TIMEOUT,
};

/// Outcome of a single echo attempt.
///
/// A value object: built once by the session, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EchoResult {
    /// Sequence number of the request this result describes.
    pub sequence: u16,
    pub success: bool,
    /// TTL of the reply's IP header, 0 when no valid reply arrived.
    pub ttl: u8,
    /// Round trip time in whole milliseconds.
    pub time_ms: u64,
    pub error: Option<AttemptError>,
}

impl EchoResult {
    pub fn success(sequence: u16, ttl: u8, time_ms: u64) -> Self {
        Self {
            sequence,
            success: true,
            ttl,
            time_ms,
            error: None,
        }
    }

    pub fn failure(sequence: u16, error: AttemptError) -> Self {
        Self {
            sequence,
            success: false,
            ttl: 0,
            time_ms: 0,
            error: Some(error),
        }
    }
}

/// Conditions that prevent a session from making any attempt at all.
#[derive(Debug, Error)]
pub enum EchoError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("cannot resolve {addr} to an IPv4 host: {reason}")]
    Resolution { addr: String, reason: String },
    #[error("cannot open raw ICMP socket to {addr} (raw sockets usually require root or CAP_NET_RAW): {source}")]
    Socket {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("payload of {0} bytes does not fit in an IPv4 datagram")]
    PayloadTooLarge(usize),
    #[error("session task aborted: {0}")]
    Aborted(String),
}

/// Why one attempt failed. Recorded in its `EchoResult`, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("transport error: short write, sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },
    #[error("transport error: timed out waiting for echo reply")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl AttemptError {
    /// Transport failures leave the socket unusable, so the session stops.
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Protocol(_))
    }
}

impl From<io::Error> for AttemptError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Transport(e.to_string()),
        }
    }
}

/// A datagram arrived but does not answer the outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ProtocolError {
    #[error("malformed ip header: header length {0} bytes")]
    MalformedIpHeader(usize),
    #[error("truncated datagram: {0} bytes")]
    Truncated(usize),
    #[error("not an echo reply: icmp type {0}")]
    NotEchoReply(u8),
    #[error("icmp id or seq not match: expected {expected:?}, got {received:?}")]
    Mismatch {
        expected: (u16, u16),
        received: (u16, u16),
    },
}
