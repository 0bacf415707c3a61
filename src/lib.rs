//! # PINGER stop-and-wait ping
//!
//! This crate provides the components of a UNIX ping client that keeps exactly one echo request
//! in flight. It consists of two major components:
//! - The wire codec in [`packet`] which stamps outgoing echo requests with their send time and
//!   classifies whatever comes back
//! - The [`Session`](session::Session) which sends a probe, races a timeout against the replies
//!   forwarded by its receiver thread, reports the outcome and moves on to the next probe
//!
//! The raw socket and the output sink sit behind the [`Transport`](transport::Transport) and
//! [`Report`](report::Report) traits, so the session can be driven without privileges in tests.

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use std::time::Duration;

use packet::IpVersion;

pub mod cli;
pub mod dest;
pub mod error;
pub mod logger;
pub mod packet;
pub mod receiver;
pub mod report;
pub mod session;
pub mod transport;

/// Application configuration
///
/// Produced by [`cli::App`] and consumed by the `Session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host name or literal address as given by the user
    pub host: String,
    pub version: IpVersion,
    /// Outgoing TTL / hop limit
    pub ttl: u8,
    /// Maximum wait for a reply before a probe counts as unreachable
    pub timeout: Duration,
    /// Pause between a completed exchange and the next request
    pub interval: Duration,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            version: IpVersion::V4,
            ttl: 100,
            timeout: Duration::from_millis(2000),
            interval: Duration::from_millis(1300),
            verbose: false,
        }
    }
}
