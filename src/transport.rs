//! Raw ICMP socket shared between the control loop and the receiver thread
//!
//! The control loop only writes, the receiver only reads. Both operate on `&self`, so the socket
//! is shared behind an `Arc` without further locking.

use pnet::packet::{ip::IpNextHeaderProtocols, ipv4::Ipv4Packet};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::convert::TryFrom;
use std::io;
use std::mem::{self, MaybeUninit};
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use crate::error::PingError;
use crate::packet::IpVersion;

/// How long a blocking read may take before the receiver re-checks whether it should stop
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Size of the receive buffer. Large enough for any ICMP error quoting the original datagram.
const RECV_BUFFER_LEN: usize = 1500;

/// A datagram as handed to the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datagram {
    /// Number of ICMP bytes written to the caller's buffer
    pub len: usize,
    /// TTL or hop limit the datagram arrived with
    pub hop_metric: Option<u8>,
}

/// Connected raw-socket abstraction
///
/// Implementations must tolerate one thread sending while another one receives.
pub trait Transport: Send + Sync + 'static {
    /// Send one ICMP message to `dest`
    fn send_to(&self, packet: &[u8], dest: &SocketAddr) -> io::Result<usize>;

    /// Block until a datagram arrives and copy its ICMP part into `buf`
    ///
    /// Returns an error of kind `WouldBlock` or `TimedOut` when nothing arrived within the
    /// implementation's poll interval. Those are not failures and the caller simply reads again.
    fn recv(&self, buf: &mut [u8]) -> io::Result<Datagram>;
}

/// Raw ICMP or ICMPv6 socket
pub struct IcmpSocket {
    socket: Socket,
    version: IpVersion,
}

impl IcmpSocket {
    /// Open a raw socket for the given IP version
    ///
    /// # Errors
    ///
    /// Opening raw sockets requires `CAP_NET_RAW` or root. Any failure is reported as
    /// `TransportOpen`.
    pub fn open(version: IpVersion) -> Result<Self, PingError> {
        let (domain, protocol) = match version {
            IpVersion::V4 => (Domain::IPV4, Protocol::ICMPV4),
            IpVersion::V6 => (Domain::IPV6, Protocol::ICMPV6),
        };

        trace!("Opening raw {} socket", version);

        let socket =
            Socket::new(domain, Type::RAW, Some(protocol)).map_err(PingError::TransportOpen)?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(PingError::TransportOpen)?;

        Ok(Self { socket, version })
    }

    /// Set the TTL (IPv4) or unicast hop limit (IPv6) for all subsequent packets
    ///
    /// On IPv6 this also asks the kernel to attach the hop limit of every received packet as a
    /// control message. IPv4 raw sockets deliver the IP header, so nothing else is needed there.
    pub fn configure_hop_limit(&self, hops: u8) -> Result<(), PingError> {
        info!("Set {}: {}", self.version.hop_field(), hops);

        match self.version {
            IpVersion::V4 => self.socket.set_ttl(u32::from(hops)),
            IpVersion::V6 => self
                .socket
                .set_unicast_hops_v6(u32::from(hops))
                .and_then(|_| self.enable_hop_limit_cmsg()),
        }
        .map_err(PingError::TransportOpen)
    }

    fn enable_hop_limit_cmsg(&self) -> io::Result<()> {
        let enable: libc::c_int = 1;
        // SAFETY: the option value points to a live c_int of the advertised size
        let res = unsafe {
            libc::setsockopt(
                self.socket.as_raw_fd(),
                libc::IPPROTO_IPV6,
                libc::IPV6_RECVHOPLIMIT,
                &enable as *const libc::c_int as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if res == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// IPv4 raw sockets hand over the full IP datagram. Strip the header and keep its TTL.
    fn recv_v4(&self, buf: &mut [u8]) -> io::Result<Datagram> {
        let mut recv_buf = [MaybeUninit::<u8>::uninit(); RECV_BUFFER_LEN];
        let (len, _) = self.socket.recv_from(&mut recv_buf)?;

        // SAFETY: `recv_from` initialised the first `len` bytes
        let datagram: Vec<u8> = recv_buf[..len]
            .iter()
            .map(|byte| unsafe { byte.assume_init() })
            .collect();

        let ip = Ipv4Packet::new(&datagram)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated IPv4 header"))?;
        if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "not an ICMP datagram"));
        }

        let header_len = usize::from(ip.get_header_length()) * 4;
        let icmp = datagram
            .get(header_len..)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated IPv4 datagram"))?;
        let len = icmp.len().min(buf.len());
        buf[..len].copy_from_slice(&icmp[..len]);

        Ok(Datagram {
            len,
            hop_metric: Some(ip.get_ttl()),
        })
    }

    /// IPv6 raw sockets deliver only the ICMPv6 message. The hop limit arrives as ancillary data.
    fn recv_v6(&self, buf: &mut [u8]) -> io::Result<Datagram> {
        // u64 elements keep the control buffer aligned for cmsghdr
        let mut control = [0u64; 16];
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr() as *mut libc::c_void,
            iov_len: buf.len(),
        };

        // SAFETY: msghdr is plain data; all pointers set below outlive the recvmsg call
        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = mem::size_of_val(&control) as _;

        let len = unsafe { libc::recvmsg(self.socket.as_raw_fd(), &mut msg, 0) };
        if len < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut hop_metric = None;
        // SAFETY: walking the control messages the kernel just wrote into `control`
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
            while !cmsg.is_null() {
                let header = &*cmsg;
                if header.cmsg_level == libc::IPPROTO_IPV6
                    && header.cmsg_type == libc::IPV6_HOPLIMIT
                {
                    let data = libc::CMSG_DATA(cmsg) as *const libc::c_int;
                    let hops = std::ptr::read_unaligned(data);
                    hop_metric = u8::try_from(hops).ok();
                }
                cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
            }
        }

        Ok(Datagram {
            len: len as usize,
            hop_metric,
        })
    }
}

impl Transport for IcmpSocket {
    fn send_to(&self, packet: &[u8], dest: &SocketAddr) -> io::Result<usize> {
        self.socket.send_to(packet, &SockAddr::from(*dest))
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<Datagram> {
        match self.version {
            IpVersion::V4 => self.recv_v4(buf),
            IpVersion::V6 => self.recv_v6(buf),
        }
    }
}

/// Whether a receive error only means the poll interval elapsed
pub fn is_poll_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
