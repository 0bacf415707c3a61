use pnet::packet::{
    icmp::{echo_request::MutableEchoRequestPacket, IcmpCode, IcmpTypes},
    icmpv6::{Icmpv6Code, Icmpv6Types, MutableIcmpv6Packet},
    Packet,
};
use pnet::util::checksum;
use std::time::SystemTime;

use super::timestamp::{self, TIMESTAMP_LEN};
use super::{IpVersion, ECHO_HEADER_LEN};

/// Total size of an outgoing echo request
pub const REQUEST_LEN: usize = ECHO_HEADER_LEN + TIMESTAMP_LEN;

/// A ping packet before send-out
///
/// The layout is the same for both families: type, code, checksum, identifier, sequence number
/// and the 8-byte send-time stamp. Only the type value differs, which is why ICMPv6 is built on
/// top of the generic `MutableIcmpv6Packet` with identifier and sequence in its payload.
#[derive(Debug)]
pub(super) enum RequestPacket {
    Icmp(MutableEchoRequestPacket<'static>),
    Icmpv6(MutableIcmpv6Packet<'static>),
}

impl RequestPacket {
    /// Create a zeroed echo request for the given IP version
    ///
    /// Returns `None` only if the buffer were too small for the header, which cannot happen for
    /// `REQUEST_LEN`.
    fn new(version: IpVersion) -> Option<Self> {
        match version {
            IpVersion::V4 => {
                MutableEchoRequestPacket::owned(vec![0; REQUEST_LEN]).map(|mut pkg| {
                    pkg.set_icmp_type(IcmpTypes::EchoRequest);
                    pkg.set_icmp_code(IcmpCode::new(0));
                    Self::Icmp(pkg)
                })
            }
            IpVersion::V6 => MutableIcmpv6Packet::owned(vec![0; REQUEST_LEN]).map(|mut pkg| {
                pkg.set_icmpv6_type(Icmpv6Types::EchoRequest);
                pkg.set_icmpv6_code(Icmpv6Code::new(0));
                Self::Icmpv6(pkg)
            }),
        }
    }

    /// Populate identifier, sequence number and stamp
    fn set_header_and_payload(&mut self, id: u16, sequence: u16, stamp: [u8; TIMESTAMP_LEN]) {
        match self {
            Self::Icmp(pkg) => {
                pkg.set_identifier(id);
                pkg.set_sequence_number(sequence);
                pkg.set_payload(&stamp);
            }
            Self::Icmpv6(pkg) => {
                let payload = [&id.to_be_bytes()[..], &sequence.to_be_bytes(), &stamp].concat();
                pkg.set_payload(&payload);
            }
        };
    }

    /// Set the checksum field of the packet
    ///
    /// The checksum is the 16-bit one's complement of the one's complement sum of the message.
    /// For ICMPv6 the kernel recomputes it over the pseudo-header before the packet leaves.
    fn set_checksum(&mut self) {
        match self {
            Self::Icmp(pkg) => pkg.set_checksum(checksum(pkg.packet(), 1)),
            Self::Icmpv6(pkg) => pkg.set_checksum(checksum(pkg.packet(), 1)),
        };
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Icmp(pkg) => pkg.packet().to_vec(),
            Self::Icmpv6(pkg) => pkg.packet().to_vec(),
        }
    }
}

/// Build a fully marshaled echo request stamped with `now`
pub fn echo_request(version: IpVersion, id: u16, sequence: u16, now: SystemTime) -> Vec<u8> {
    match RequestPacket::new(version) {
        Some(mut packet) => {
            packet.set_header_and_payload(id, sequence, timestamp::encode(now));
            packet.set_checksum();
            packet.into_bytes()
        }
        // The buffer is always large enough; build by hand if pnet ever disagrees
        None => {
            let mut bytes = vec![0u8; REQUEST_LEN];
            bytes[0] = version.echo_request_type();
            bytes[4..6].copy_from_slice(&id.to_be_bytes());
            bytes[6..8].copy_from_slice(&sequence.to_be_bytes());
            bytes[8..].copy_from_slice(&timestamp::encode(now));
            let sum = checksum(&bytes, 1);
            bytes[2..4].copy_from_slice(&sum.to_be_bytes());
            bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn create_icmp_echo_request_packet() {
        let now = UNIX_EPOCH + Duration::from_nanos(0x1122_3344_5566_7788);
        let packet = echo_request(IpVersion::V4, 0x0102, 0x0304, now);

        assert_eq!(packet.len(), 16);
        assert_eq!(packet[0], 8);
        assert_eq!(packet[1], 0);

        // The 5 - 6th byte are reserved for the identifier
        assert_eq!(&packet[4..6], &[0x01, 0x02]);

        // The 7 - 8th byte are reserved for the sequence number
        assert_eq!(&packet[6..8], &[0x03, 0x04]);

        assert_eq!(&packet[8..], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]);
    }

    #[test]
    fn create_icmpv6_echo_request_packet() {
        let packet = echo_request(IpVersion::V6, 3, 4, SystemTime::now());

        assert_eq!(packet.len(), 16);
        assert_eq!(packet[0], 128);
        assert_eq!(packet[5], 3);
        assert_eq!(packet[7], 4);
    }

    #[test]
    fn checksum_verifies() {
        let packet = echo_request(IpVersion::V4, 0xBEEF, 42, SystemTime::now());

        // Summing a message including its checksum folds to 0xFFFF, so the complement is zero
        let total = packet
            .chunks(2)
            .map(|word| u32::from(u16::from_be_bytes([word[0], word[1]])))
            .sum::<u32>();
        let folded = (total & 0xFFFF) + (total >> 16);
        let folded = (folded & 0xFFFF) + (folded >> 16);
        assert_eq!(folded, 0xFFFF);
    }
}
