use dns_lookup::{getaddrinfo, AddrFamily, AddrInfoHints, SockType};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::error::PingError;
use crate::packet::IpVersion;

/// Resolved target of a ping session
///
/// The host name is kept for display only. Everything on the wire uses `addr`, which for
/// link-local IPv6 targets carries the scope id of the outgoing interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    host: String,
    addr: SocketAddr,
}

impl Destination {
    /// Resolve a host name or literal address for the given IP version
    ///
    /// Literal addresses, including IPv6 literals with a zone such as `fe80::1%eth0`, are handled
    /// by the system resolver without a DNS round trip. The first address of the requested family
    /// wins.
    ///
    /// # Errors
    ///
    /// Fails with `AddressResolution` if the resolver fails or returns no address of the
    /// requested family.
    pub fn resolve(host: &str, version: IpVersion) -> Result<Self, PingError> {
        let family = match version {
            IpVersion::V4 => AddrFamily::Inet,
            IpVersion::V6 => AddrFamily::Inet6,
        };
        let hints = AddrInfoHints {
            flags: 0,
            address: family.into(),
            socktype: SockType::Raw.into(),
            protocol: 0,
        };
        let failed = |reason: String| PingError::AddressResolution {
            host: host.to_string(),
            reason,
        };

        let addr = getaddrinfo(Some(host), None, Some(hints))
            .map_err(|e| failed(format!("{:?}", e)))?
            .filter_map(Result::ok)
            .map(|info| info.sockaddr)
            .find(|addr| version.matches(addr.ip()))
            .ok_or_else(|| failed(format!("no {} address", version)))?;

        info!("Resolved host {} to IP {}", host, addr.ip());

        Ok(Self {
            host: host.to_string(),
            addr,
        })
    }

    /// Wrap an already known address
    pub fn from_addr(host: &str, addr: IpAddr) -> Self {
        Self {
            host: host.to_string(),
            addr: SocketAddr::new(addr, 0),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Socket address to send probes to, port zero
    pub fn socket_addr(&self) -> &SocketAddr {
        &self.addr
    }

    pub fn version(&self) -> IpVersion {
        match self.addr {
            SocketAddr::V4(_) => IpVersion::V4,
            SocketAddr::V6(_) => IpVersion::V6,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr.ip())
    }
}

impl IpVersion {
    fn matches(self, ip: IpAddr) -> bool {
        match self {
            Self::V4 => ip.is_ipv4(),
            Self::V6 => ip.is_ipv6(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn resolve_ipv4_literal() {
        let dest = Destination::resolve("127.0.0.1", IpVersion::V4).expect("Failed resolving literal");
        assert_eq!(dest.ip(), IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(dest.version(), IpVersion::V4);
        assert_eq!(dest.host(), "127.0.0.1");
        assert_eq!(dest.socket_addr().port(), 0);
    }

    #[test]
    fn resolve_ipv6_literal() {
        let dest = Destination::resolve("::1", IpVersion::V6).expect("Failed resolving literal");
        assert_eq!(dest.ip(), "::1".parse::<IpAddr>().unwrap());
        assert_eq!(dest.version(), IpVersion::V6);
    }

    #[test]
    fn family_mismatch_fails() {
        let err = Destination::resolve("127.0.0.1", IpVersion::V6).unwrap_err();
        assert!(matches!(err, PingError::AddressResolution { .. }));
    }

    #[test]
    fn display_is_bare_ip() {
        let dest = Destination::from_addr("localhost", IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(dest.to_string(), "127.0.0.1");
    }
}
