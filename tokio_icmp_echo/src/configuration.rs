use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ping::codec::{default_payload, DEFAULT_PAYLOAD_LEN, MAX_PAYLOAD_LEN};
use crate::ping::{EchoError, MAX_ATTEMPT_TIMEOUT};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PARALLELISM: usize = 64;
pub const MAX_DEADLINE: Duration = Duration::from_secs(7 * 24 * 3600);

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_count() -> u16 {
    1
}

fn default_parallelism() -> usize {
    DEFAULT_PARALLELISM
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// That many bytes of the `'0'..'9'` pattern.
    Length(usize),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Self::Length(len) => *len,
            Self::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Self::Length(len) => default_payload(*len),
            Self::Bytes(bytes) => bytes.clone(),
        }
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::Length(DEFAULT_PAYLOAD_LEN)
    }
}

/// Everything needed to ping one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoConfig {
    /// IPv4 literal or host name.
    pub addr: String,
    #[serde(default)]
    pub payload: Payload,
    /// Don't-fragment intent. Raw ICMP sockets keep the OS default, so this
    /// is carried along but not applied.
    #[serde(default)]
    pub dont_fragment: bool,
    /// Read deadline of each attempt.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default = "default_count")]
    pub count: u16,
    /// Echo identifier, random when absent.
    #[serde(default)]
    pub identifier: Option<u16>,
    /// Outgoing IP TTL, OS default when absent.
    #[serde(default)]
    pub ttl: Option<u8>,
}

impl EchoConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            payload: Payload::default(),
            dont_fragment: false,
            timeout: DEFAULT_TIMEOUT,
            count: default_count(),
            identifier: None,
            ttl: None,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_count(mut self, count: u16) -> Self {
        self.count = count;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_dont_fragment(mut self, dont_fragment: bool) -> Self {
        self.dont_fragment = dont_fragment;
        self
    }

    pub fn validate(&self) -> Result<(), EchoError> {
        if self.addr.trim().is_empty() {
            return Err(EchoError::InvalidConfiguration("empty target address".into()));
        }
        if self.count == 0 {
            return Err(EchoError::InvalidConfiguration(
                "attempt count must be at least 1".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(EchoError::InvalidConfiguration(
                "timeout must be positive".into(),
            ));
        }
        if self.timeout > MAX_ATTEMPT_TIMEOUT {
            return Err(EchoError::InvalidConfiguration(format!(
                "timeout must not exceed {:?}",
                MAX_ATTEMPT_TIMEOUT
            )));
        }
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(EchoError::PayloadTooLarge(self.payload.len()));
        }
        Ok(())
    }
}

/// Worker pool settings of the fan-out coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutConfig {
    /// Sessions, hence raw sockets, open at the same time.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Give up on outstanding hosts after this long. Unbounded when absent.
    #[serde(default)]
    pub deadline: Option<Duration>,
}

impl FanOutConfig {
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn validate(&self) -> Result<(), EchoError> {
        if self.parallelism == 0 {
            return Err(EchoError::InvalidConfiguration(
                "parallelism must be at least 1".into(),
            ));
        }
        if matches!(self.deadline, Some(deadline) if deadline > MAX_DEADLINE) {
            return Err(EchoError::InvalidConfiguration(format!(
                "deadline must not exceed {:?}",
                MAX_DEADLINE
            )));
        }
        Ok(())
    }
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLELISM)
    }
}
