use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::codec::{self, EchoHeader, ICMP_HEADER_LEN, MAX_IP_HEADER_LEN};
use super::{AttemptError, EchoError, EchoResult, ProtocolError};

/// Longest wait for a single reply.
pub const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Datagram exchange with a single peer.
pub trait EchoTransport {
    /// Sends one datagram, returning how many bytes went out.
    fn send(&mut self, datagram: &[u8]) -> io::Result<usize>;
    /// Receives one datagram into `buf`. Gives up with `WouldBlock` or
    /// `TimedOut` once `deadline` has passed.
    fn recv(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize>;
}

/// Raw ICMP socket connected to one peer, so the kernel only hands us that
/// peer's datagrams. Received datagrams include the IP header.
#[derive(Debug)]
pub struct RawSocketTransport {
    socket: Socket,
}

impl RawSocketTransport {
    pub fn connect(peer: Ipv4Addr, ttl: Option<u8>) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
        if let Some(ttl) = ttl {
            socket.set_ttl(ttl as u32)?;
        }
        socket.connect(&SocketAddrV4::new(peer, 0).into())?;
        Ok(Self { socket })
    }
}

impl EchoTransport for RawSocketTransport {
    fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        self.socket.send(datagram)
    }

    fn recv(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        // A zero timeval would mean no timeout at all.
        self.socket
            .set_read_timeout(Some(remaining.max(Duration::from_millis(1))))?;
        (&self.socket).read(buf)
    }
}

pub fn resolve_ipv4(addr: &str) -> Result<Ipv4Addr, EchoError> {
    if let Ok(ip) = addr.parse::<Ipv4Addr>() {
        return Ok(ip);
    }
    let resolution_error = |reason: String| EchoError::Resolution {
        addr: addr.to_string(),
        reason,
    };
    (addr, 0)
        .to_socket_addrs()
        .map_err(|e| resolution_error(e.to_string()))?
        .find_map(|a| match a.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| resolution_error("no IPv4 address".to_string()))
}

/// One conversation with one destination.
///
/// The session owns its transport; dropping or closing the session releases
/// the socket.
pub struct EchoSession<T> {
    peer: Ipv4Addr,
    identifier: u16,
    transport: T,
}

impl EchoSession<RawSocketTransport> {
    pub fn open(addr: &str, identifier: u16, ttl: Option<u8>) -> Result<Self, EchoError> {
        let peer = resolve_ipv4(addr)?;
        let transport =
            RawSocketTransport::connect(peer, ttl).map_err(|source| EchoError::Socket {
                addr: addr.to_string(),
                source,
            })?;
        debug!(%peer, identifier, "opened echo session");
        Ok(Self::with_transport(peer, identifier, transport))
    }
}

impl<T: EchoTransport> EchoSession<T> {
    pub fn with_transport(peer: Ipv4Addr, identifier: u16, transport: T) -> Self {
        Self {
            peer,
            identifier,
            transport,
        }
    }

    pub fn peer(&self) -> Ipv4Addr {
        self.peer
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    /// Sends `count` requests, sequences 1 to `count`, one at a time.
    ///
    /// A transport failure ends the run after recording it. Protocol errors
    /// are recorded and the run moves on. Timeouts above
    /// [`MAX_ATTEMPT_TIMEOUT`] are rejected before anything is sent.
    pub fn run(
        &mut self,
        count: u16,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<EchoResult>, EchoError> {
        if timeout > MAX_ATTEMPT_TIMEOUT {
            return Err(EchoError::InvalidConfiguration(format!(
                "timeout {:?} exceeds {:?}",
                timeout, MAX_ATTEMPT_TIMEOUT
            )));
        }
        let mut buf = vec![0u8; MAX_IP_HEADER_LEN + ICMP_HEADER_LEN + payload.len()];
        let mut results = Vec::with_capacity(count as usize);

        for sequence in 1..=count {
            let request = codec::encode(self.identifier, sequence, payload)?;
            let expected = EchoHeader {
                identifier: self.identifier,
                sequence,
            };
            match self.attempt(&request, expected, &mut buf, timeout) {
                Ok((ttl, elapsed)) => {
                    let time_ms = round_millis(elapsed);
                    debug!(peer = %self.peer, sequence, ttl, time_ms, "echo reply");
                    results.push(EchoResult::success(sequence, ttl, time_ms));
                }
                Err(error) => {
                    debug!(peer = %self.peer, sequence, %error, "echo attempt failed");
                    let fatal = error.is_transport();
                    results.push(EchoResult::failure(sequence, error));
                    if fatal {
                        if sequence < count {
                            warn!(
                                peer = %self.peer,
                                skipped = count - sequence,
                                "stopping session after transport error"
                            );
                        }
                        break;
                    }
                }
            }
        }
        Ok(results)
    }

    fn attempt(
        &mut self,
        request: &[u8],
        expected: EchoHeader,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<(u8, Duration), AttemptError> {
        let start = Instant::now();
        let sent = self.transport.send(request)?;
        if sent != request.len() {
            return Err(AttemptError::ShortWrite {
                sent,
                expected: request.len(),
            });
        }

        // timeout <= MAX_ATTEMPT_TIMEOUT, checked in run
        let deadline = Instant::now() + timeout;
        let mut rejected = None;
        loop {
            let len = match self.transport.recv(buf, deadline) {
                Ok(len) => len,
                Err(e) => {
                    return Err(match (AttemptError::from(e), rejected) {
                        // Only strays arrived: the channel works, the reply did not come.
                        (AttemptError::Timeout, Some(stray)) => AttemptError::Protocol(stray),
                        (error, _) => error,
                    });
                }
            };
            let elapsed = start.elapsed();

            let decoded = codec::decode(&buf[..len], MAX_IP_HEADER_LEN);
            let stray = match decoded.header {
                Ok(header) if header == expected => return Ok((decoded.ttl, elapsed)),
                Ok(header) => ProtocolError::Mismatch {
                    expected: (expected.identifier, expected.sequence),
                    received: (header.identifier, header.sequence),
                },
                Err(e) => e,
            };
            trace!(peer = %self.peer, ttl = decoded.ttl, len, %stray, "ignoring datagram");
            rejected = Some(stray);
        }
    }

    /// Releases the transport.
    pub fn close(self) {
        trace!(peer = %self.peer, "closing echo session");
    }
}

fn round_millis(elapsed: Duration) -> u64 {
    ((elapsed.as_micros() + 500) / 1000) as u64
}
