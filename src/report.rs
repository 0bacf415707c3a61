use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::PingError;
use crate::packet::IpVersion;

/// Outcome of one stop-and-wait cycle, or a notable event within it
#[derive(Debug)]
pub enum Outcome {
    /// The outstanding probe was answered
    Success {
        destination: IpAddr,
        sequence: u16,
        hop_metric: Option<u8>,
        rtt: Duration,
    },
    /// No attributable reply within the timeout
    Unreachable { destination: IpAddr, sequence: u16 },
    /// A router discarded the probe because its hop limit ran out
    TtlExceeded { destination: IpAddr, sequence: u16 },
    /// A message type the session does not handle. Not terminal for the cycle.
    UnexpectedType { icmp_type: u8, code: u8 },
    /// Receiving or parsing failed
    ReceiveError(PingError),
}

impl Outcome {
    /// Whether this outcome ends the current cycle
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::UnexpectedType { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success {
                destination,
                sequence,
                hop_metric,
                rtt,
            } => {
                write!(f, "64 bytes from {}: icmp_seq={} ttl=", destination, sequence)?;
                match hop_metric {
                    Some(hops) => write!(f, "{}", hops)?,
                    None => write!(f, "?")?,
                }
                write!(f, " time={:.3}ms", rtt.as_secs_f64() * 1000f64)
            }
            Self::Unreachable { destination, .. } => write!(f, "unreachable: {}.", destination),
            Self::TtlExceeded {
                destination,
                sequence,
            } => write!(f, "From {}: icmp_seq={} Time exceeded: Hop limit", destination, sequence),
            Self::UnexpectedType { icmp_type, code } => {
                write!(f, "got ICMP type {} code {}; want echo reply", icmp_type, code)
            }
            Self::ReceiveError(e) => write!(f, "Receive error: {}.", e),
        }
    }
}

/// Sink for the per-cycle narrative
pub trait Report {
    fn report(&mut self, outcome: Outcome);
}

/// Prints one line per outcome to standard output
///
/// Unexpected message types are only of diagnostic interest and go to the debug log instead.
#[derive(Debug, Default)]
pub struct Console;

impl Console {
    /// Print the banner shown once before the first probe
    pub fn banner(host: &str, version: IpVersion, ttl: u8) {
        println!("PING {}, IP version: {}, ttl: {}.", host, version, ttl);
    }
}

impl Report for Console {
    fn report(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::UnexpectedType { .. } => debug!("{}", outcome),
            _ => println!("{}", outcome),
        }
    }
}
