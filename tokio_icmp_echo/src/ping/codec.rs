/*
   ICMP echo header, following the IPv4 header on receive

    0                   1                   2                   3
    0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
   |     Type      |     Code      |          Checksum             |
   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
   |           Identifier          |        Sequence Number        |
   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
   |     Data ...
   +-+-+-+-+-
*/

use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::IcmpTypes;
use pnet::packet::ipv4::Ipv4Packet;

use super::checksum::write_checksum;
use super::{EchoError, ProtocolError};

pub const ICMP_HEADER_LEN: usize = 8;
pub const MIN_IP_HEADER_LEN: usize = 20;
/// Largest IP header accepted on receive: the fixed part plus one option word.
pub const MAX_IP_HEADER_LEN: usize = 24;
/// Largest payload a single IPv4 datagram can carry behind the ICMP header.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - MIN_IP_HEADER_LEN - ICMP_HEADER_LEN;
pub const DEFAULT_PAYLOAD_LEN: usize = 32;

const ICMP_ECHO_REQUEST: u8 = 8;
const CHECKSUM_OFFSET: usize = 2;
const IP_TTL_OFFSET: usize = 8;

/// `len` bytes cycling through the ASCII digits.
pub fn default_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'0' + (i % 10) as u8).collect()
}

/// Builds an echo request with its checksum in place.
pub fn encode(identifier: u16, sequence: u16, payload: &[u8]) -> Result<Vec<u8>, EchoError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EchoError::PayloadTooLarge(payload.len()));
    }

    let mut req = Vec::with_capacity(ICMP_HEADER_LEN + payload.len());
    req.push(ICMP_ECHO_REQUEST);
    req.push(0); // code
    req.extend_from_slice(&[0, 0]); // checksum
    req.extend_from_slice(&identifier.to_be_bytes());
    req.extend_from_slice(&sequence.to_be_bytes());
    req.extend_from_slice(payload);

    write_checksum(&mut req, CHECKSUM_OFFSET);
    Ok(req)
}

/// Identifier and sequence of a valid echo reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoHeader {
    pub identifier: u16,
    pub sequence: u16,
}

/// What could be read from a received datagram.
///
/// `ttl` is filled in whenever the buffer reaches the TTL byte, even if the
/// datagram was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedReply {
    pub ttl: u8,
    pub header: Result<EchoHeader, ProtocolError>,
}

/// Parses an IPv4 datagram carrying an ICMP echo reply.
pub fn decode(datagram: &[u8], max_ip_header_len: usize) -> DecodedReply {
    let ttl = datagram.get(IP_TTL_OFFSET).copied().unwrap_or(0);
    DecodedReply {
        ttl,
        header: parse_echo_reply(datagram, max_ip_header_len),
    }
}

fn parse_echo_reply(datagram: &[u8], max_ip_header_len: usize) -> Result<EchoHeader, ProtocolError> {
    let ip = Ipv4Packet::new(datagram).ok_or(ProtocolError::Truncated(datagram.len()))?;
    let header_len = ip.get_header_length() as usize * 4;
    if header_len > max_ip_header_len || header_len < MIN_IP_HEADER_LEN {
        return Err(ProtocolError::MalformedIpHeader(header_len));
    }

    let icmp = &datagram[header_len.min(datagram.len())..];
    match icmp.first() {
        None => return Err(ProtocolError::Truncated(datagram.len())),
        Some(&ty) if ty != IcmpTypes::EchoReply.0 => return Err(ProtocolError::NotEchoReply(ty)),
        Some(_) => (),
    }

    let reply = EchoReplyPacket::new(icmp).ok_or(ProtocolError::Truncated(datagram.len()))?;
    Ok(EchoHeader {
        identifier: reply.get_identifier(),
        sequence: reply.get_sequence_number(),
    })
}
