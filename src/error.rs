use std::error::Error;
use std::fmt;
use std::io;

/// Everything that can go wrong during a ping session
///
/// Only `AddressResolution`, `TransportOpen`, `Spawn` and `TransportSend` are fatal. The others
/// are reported once for the cycle they occurred in and the session moves on.
#[derive(Debug)]
pub enum PingError {
    /// The destination could not be resolved to an address of the requested IP version
    AddressResolution { host: String, reason: String },
    /// The raw socket could not be opened or configured, usually due to missing privileges
    TransportOpen(io::Error),
    /// The receiver thread could not be started
    Spawn(io::Error),
    /// A received buffer is not a valid ICMP message
    MalformedMessage(&'static str),
    TransportReceive(io::Error),
    TransportSend(io::Error),
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressResolution { host, reason } => {
                write!(f, "Address resolving error: {}: {}", host, reason)
            }
            Self::TransportOpen(e) => write!(f, "Opening connection error: {}", e),
            Self::Spawn(e) => write!(f, "Could not start receiver: {}", e),
            Self::MalformedMessage(what) => write!(f, "Malformed message: {}", what),
            Self::TransportReceive(e) => write!(f, "Receive echo error: {}", e),
            Self::TransportSend(e) => write!(f, "Send echo error: {}", e),
        }
    }
}

impl Error for PingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TransportOpen(e)
            | Self::Spawn(e)
            | Self::TransportReceive(e)
            | Self::TransportSend(e) => Some(e),
            Self::AddressResolution { .. } | Self::MalformedMessage(_) => None,
        }
    }
}
