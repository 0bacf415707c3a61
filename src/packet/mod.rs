use pnet::packet::{
    icmp::{IcmpPacket, IcmpTypes},
    icmpv6::{Icmpv6Packet, Icmpv6Types},
    Packet,
};
use pnet::util::checksum;
use std::convert::TryInto;
use std::fmt;

use crate::error::PingError;
use self::timestamp::TIMESTAMP_LEN;

pub use request::{echo_request, REQUEST_LEN};

mod request;
pub mod timestamp;

/// Type, code, checksum, identifier and sequence number
pub(crate) const ECHO_HEADER_LEN: usize = 8;

/// IP version a session runs on
///
/// The version decides which ICMP type values apply and which IP-layer field carries the hop
/// metric of incoming packets (TTL for IPv4, hop limit for IPv6).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn echo_request_type(self) -> u8 {
        match self {
            Self::V4 => IcmpTypes::EchoRequest.0,
            Self::V6 => Icmpv6Types::EchoRequest.0,
        }
    }

    pub fn echo_reply_type(self) -> u8 {
        match self {
            Self::V4 => IcmpTypes::EchoReply.0,
            Self::V6 => Icmpv6Types::EchoReply.0,
        }
    }

    pub fn time_exceeded_type(self) -> u8 {
        match self {
            Self::V4 => IcmpTypes::TimeExceeded.0,
            Self::V6 => Icmpv6Types::TimeExceeded.0,
        }
    }

    /// Name of the IP-layer field the hop metric is read from
    pub fn hop_field(self) -> &'static str {
        match self {
            Self::V4 => "ttl",
            Self::V6 => "hop limit",
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
        }
    }
}

/// Correlation fields of an echo reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Echo {
    pub identifier: u16,
    pub sequence: u16,
    pub data: Vec<u8>,
}

impl Echo {
    /// The send-time stamp, if the reply carries one
    pub fn stamp(&self) -> Option<[u8; TIMESTAMP_LEN]> {
        self.data.get(..TIMESTAMP_LEN)?.try_into().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    EchoReply(Echo),
    TimeExceeded,
    /// Any other ICMP type, including our own echo requests looping back
    Other(u8),
}

/// An incoming ICMP message after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub code: u8,
    /// TTL or hop limit observed on arrival, when the transport could tell
    pub hop_metric: Option<u8>,
}

/// Parse raw ICMP bytes received on a socket of the given IP version
///
/// `bytes` must start at the ICMP header; stripping the IPv4 header is the transport's job.
///
/// # Errors
///
/// Returns `MalformedMessage` for buffers shorter than the ICMP header, for echo replies without
/// identifier and sequence number, and for ICMPv4 messages whose checksum does not add up. ICMPv6
/// checksums cover a pseudo-header and are validated by the kernel.
pub fn classify(
    bytes: &[u8],
    version: IpVersion,
    hop_metric: Option<u8>,
) -> Result<Message, PingError> {
    let (icmp_type, code) = match version {
        IpVersion::V4 => {
            let packet = IcmpPacket::new(bytes)
                .ok_or(PingError::MalformedMessage("truncated ICMP header"))?;
            if checksum(packet.packet(), 1) != packet.get_checksum() {
                return Err(PingError::MalformedMessage("ICMP checksum mismatch"));
            }
            (packet.get_icmp_type().0, packet.get_icmp_code().0)
        }
        IpVersion::V6 => {
            let packet = Icmpv6Packet::new(bytes)
                .ok_or(PingError::MalformedMessage("truncated ICMPv6 header"))?;
            (packet.get_icmpv6_type().0, packet.get_icmpv6_code().0)
        }
    };

    let kind = if icmp_type == version.echo_reply_type() {
        if bytes.len() < ECHO_HEADER_LEN {
            return Err(PingError::MalformedMessage("truncated echo reply"));
        }
        MessageKind::EchoReply(Echo {
            identifier: u16::from_be_bytes([bytes[4], bytes[5]]),
            sequence: u16::from_be_bytes([bytes[6], bytes[7]]),
            data: bytes[ECHO_HEADER_LEN..].to_vec(),
        })
    } else if icmp_type == version.time_exceeded_type() {
        MessageKind::TimeExceeded
    } else {
        MessageKind::Other(icmp_type)
    };

    Ok(Message {
        kind,
        code,
        hop_metric,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    /// Turn one of our own requests into the reply a responder would send
    fn reply_to(mut request: Vec<u8>, version: IpVersion) -> Vec<u8> {
        request[0] = version.echo_reply_type();
        request[2] = 0;
        request[3] = 0;
        let sum = checksum(&request, 1);
        request[2..4].copy_from_slice(&sum.to_be_bytes());
        request
    }

    #[test]
    fn parse_echo_reply_from_icmp() {
        let now = SystemTime::now();
        let reply = reply_to(echo_request(IpVersion::V4, 5, 11, now), IpVersion::V4);

        let message = classify(&reply, IpVersion::V4, Some(57)).unwrap();

        assert_eq!(message.code, 0);
        assert_eq!(message.hop_metric, Some(57));
        match message.kind {
            MessageKind::EchoReply(echo) => {
                assert_eq!(echo.identifier, 5);
                assert_eq!(echo.sequence, 11);
                assert_eq!(echo.stamp(), Some(timestamp::encode(now)));
            }
            other => panic!("expected echo reply, got {:?}", other),
        }
    }

    #[test]
    fn parse_echo_reply_from_icmpv6() {
        let reply = reply_to(echo_request(IpVersion::V6, 7, 8, SystemTime::now()), IpVersion::V6);

        let message = classify(&reply, IpVersion::V6, None).unwrap();

        match message.kind {
            MessageKind::EchoReply(echo) => {
                assert_eq!((echo.identifier, echo.sequence), (7, 8));
            }
            other => panic!("expected echo reply, got {:?}", other),
        }
    }

    #[test]
    fn time_exceeded_by_version() {
        let mut v4 = vec![11u8, 0, 0, 0, 0, 0, 0, 0];
        let sum = checksum(&v4, 1);
        v4[2..4].copy_from_slice(&sum.to_be_bytes());
        assert_eq!(classify(&v4, IpVersion::V4, None).unwrap().kind, MessageKind::TimeExceeded);

        let v6 = [3u8, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(classify(&v6, IpVersion::V6, None).unwrap().kind, MessageKind::TimeExceeded);

        // Type 3 is destination unreachable on IPv4
        let mut unreachable = vec![3u8, 1, 0, 0, 0, 0, 0, 0];
        let sum = checksum(&unreachable, 1);
        unreachable[2..4].copy_from_slice(&sum.to_be_bytes());
        let message = classify(&unreachable, IpVersion::V4, None).unwrap();
        assert_eq!(message.kind, MessageKind::Other(3));
        assert_eq!(message.code, 1);
    }

    #[test]
    fn own_request_is_other() {
        let request = echo_request(IpVersion::V4, 1, 1, SystemTime::now());
        let message = classify(&request, IpVersion::V4, None).unwrap();
        assert_eq!(message.kind, MessageKind::Other(8));
    }

    #[test]
    fn malformed_messages() {
        assert!(matches!(
            classify(&[0, 0], IpVersion::V4, None),
            Err(PingError::MalformedMessage(_))
        ));

        let mut reply = reply_to(echo_request(IpVersion::V4, 1, 2, SystemTime::now()), IpVersion::V4);
        reply[9] ^= 0xFF;
        assert!(matches!(
            classify(&reply, IpVersion::V4, None),
            Err(PingError::MalformedMessage("ICMP checksum mismatch"))
        ));

        assert!(matches!(
            classify(&[129, 0, 0, 0, 0, 1], IpVersion::V6, None),
            Err(PingError::MalformedMessage("truncated echo reply"))
        ));
    }

    #[test]
    fn short_data_has_no_stamp() {
        let echo = Echo {
            identifier: 1,
            sequence: 1,
            data: vec![1, 2, 3],
        };
        assert_eq!(echo.stamp(), None);
    }

    #[test]
    fn version_names() {
        assert_eq!(IpVersion::V4.to_string(), "IPv4");
        assert_eq!(IpVersion::V6.to_string(), "IPv6");
        assert_eq!(IpVersion::V6.hop_field(), "hop limit");
    }
}
