//! In-memory transport replaying a script of peer behaviours.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::codec::test::{echo_reply, ip_datagram};
use super::session::EchoTransport;

/// What happens on the next send or receive.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// The peer answers the last request.
    Reply { ttl: u8 },
    /// The peer answers the last request after `delay`.
    SlowReply { ttl: u8, delay: Duration },
    /// A reply for the previous sequence number shows up.
    Stale,
    /// The raw socket hands back our own request.
    Looped,
    Datagram(Vec<u8>),
    /// Nothing arrives before the deadline.
    Silence,
    ReadError,
    SendError,
    ShortWrite,
    Panic,
}

/// Shared view on what a `ScriptedTransport` did.
#[derive(Debug, Clone, Default)]
pub(crate) struct Probe {
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    released: Arc<AtomicUsize>,
    pub(crate) open: Arc<AtomicUsize>,
}

impl Probe {
    pub(crate) fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }

    /// Sequence numbers of the requests sent so far.
    pub(crate) fn sent(&self) -> Vec<u16> {
        self.requests()
            .iter()
            .map(|r| u16::from_be_bytes([r[6], r[7]]))
            .collect()
    }

    pub(crate) fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedTransport {
    steps: VecDeque<Step>,
    last_request: Vec<u8>,
    probe: Probe,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: Vec<Step>, probe: Probe) -> Self {
        probe.open.fetch_add(1, Ordering::SeqCst);
        Self {
            steps: steps.into(),
            last_request: vec![],
            probe,
        }
    }

    fn reply(&self, ttl: u8) -> Vec<u8> {
        ip_datagram(ttl, 20, &echo_reply(&self.last_request))
    }
}

impl EchoTransport for ScriptedTransport {
    fn send(&mut self, datagram: &[u8]) -> io::Result<usize> {
        self.probe
            .requests
            .lock()
            .unwrap()
            .push(datagram.to_vec());
        self.last_request = datagram.to_vec();
        match self.steps.front() {
            Some(Step::SendError) => {
                self.steps.pop_front();
                Err(io::Error::new(io::ErrorKind::Other, "network is down"))
            }
            Some(Step::ShortWrite) => {
                self.steps.pop_front();
                Ok(datagram.len() - 1)
            }
            _ => Ok(datagram.len()),
        }
    }

    fn recv(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize> {
        let datagram = match self.steps.pop_front() {
            Some(Step::Reply { ttl }) => self.reply(ttl),
            Some(Step::SlowReply { ttl, delay }) => {
                std::thread::sleep(delay);
                self.reply(ttl)
            }
            Some(Step::Stale) => {
                let mut request = self.last_request.clone();
                let sequence = u16::from_be_bytes([request[6], request[7]]).wrapping_sub(1);
                request[6..8].copy_from_slice(&sequence.to_be_bytes());
                ip_datagram(64, 20, &echo_reply(&request))
            }
            Some(Step::Looped) => ip_datagram(64, 20, &self.last_request),
            Some(Step::Datagram(datagram)) => datagram,
            Some(Step::ReadError) => {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))
            }
            Some(Step::Panic) => panic!("scripted panic"),
            _ => {
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                return Err(io::ErrorKind::WouldBlock.into());
            }
        };
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(len)
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.probe.open.fetch_sub(1, Ordering::SeqCst);
        self.probe.released.fetch_add(1, Ordering::SeqCst);
    }
}
