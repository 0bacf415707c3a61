use clap::{App as ClapApp, Arg, ErrorKind, Result as ClapResult};
use std::ffi::OsString;
use std::time::Duration;

use super::Config;
use crate::packet::IpVersion;

/// Application initialization
pub struct App;

impl App {
    /// Retrieve user input from the process' command line
    ///
    /// See [`parse_from`](App::parse_from) for the accepted arguments.
    pub fn parse_args() -> ClapResult<Config> {
        Self::parse_from(std::env::args_os())
    }

    /// Parse an argument list, program name first
    ///
    /// The user can modify the following parameters of the application:
    /// - destination: Either as IP address or host name (required)
    /// - ttl: The time to live / hop limit for outgoing packets (default 100)
    /// - 6: Use IPv6. Implied if the destination contains a colon
    /// - timeout: Wait for a reply per packet (default 2,000ms)
    /// - interval: Pause after a reply before the next packet (default 1,300ms)
    ///
    /// The single-dash long form `-ttl` is accepted as well.
    pub fn parse_from<I, T>(args: I) -> ClapResult<Config>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args = args.into_iter().map(|arg| {
            let arg = arg.into();
            if arg == "-ttl" {
                OsString::from("--ttl")
            } else {
                arg
            }
        });

        let matches = ClapApp::new("pinger")
            .version(crate_version!())
            .about("Send ICMP echo requests to a host, one at a time")
            .arg(Arg::with_name("destination")
                .help("Host name or destination address")
                .required(true)
                .index(1))
            .arg(Arg::with_name("verbose")
                .help("Print diagnostics to stderr")
                .short("v")
                .long("verbose"))
            .arg(Arg::with_name("ttl")
                .help("Sets the time to live / hop limit")
                .short("t")
                .long("ttl")
                .takes_value(true)
                .default_value("100"))
            .arg(Arg::with_name("ipv6")
                .help("Use IPv6")
                .short("6"))
            .arg(Arg::with_name("timeout")
                .help("Time to wait for a reply (in ms)")
                .short("W")
                .long("timeout")
                .takes_value(true)
                .default_value("2000"))
            .arg(Arg::with_name("interval")
                .help("Pause after a reply (in ms)")
                .short("i")
                .long("interval")
                .takes_value(true)
                .default_value("1300"))
            .get_matches_from_safe(args)?;

        let ttl = value_t!(matches, "ttl", u8)?;
        let timeout = value_t!(matches, "timeout", u64).map(Duration::from_millis)?;
        let interval = value_t!(matches, "interval", u64).map(Duration::from_millis)?;

        let host = matches
            .value_of("destination")
            .map(str::to_string)
            .ok_or_else(|| {
                clap::Error::with_description(
                    "missing destination",
                    ErrorKind::MissingRequiredArgument,
                )
            })?;

        let version = if matches.is_present("ipv6") || host.contains(':') {
            IpVersion::V6
        } else {
            IpVersion::V4
        };

        Ok(Config {
            host,
            version,
            ttl,
            timeout,
            interval,
            verbose: matches.is_present("verbose"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = App::parse_from(vec!["test_app_name", "127.0.0.1"]).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.version, IpVersion::V4);
        assert_eq!(config.ttl, 100);
        assert_eq!(config.timeout, Duration::from_millis(2000));
        assert_eq!(config.interval, Duration::from_millis(1300));
        assert!(!config.verbose);
    }

    #[test]
    fn ttl_flags() {
        let short = App::parse_from(vec!["test_app_name", "-t", "7", "example.com"]).unwrap();
        assert_eq!(short.ttl, 7);

        let long = App::parse_from(vec!["test_app_name", "--ttl", "8", "example.com"]).unwrap();
        assert_eq!(long.ttl, 8);

        let single_dash = App::parse_from(vec!["test_app_name", "-ttl", "9", "example.com"]).unwrap();
        assert_eq!(single_dash.ttl, 9);
    }

    #[test]
    fn ttl_out_of_range() {
        let err = App::parse_from(vec!["test_app_name", "-t", "300", "example.com"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValueValidation);
    }

    #[test]
    fn ipv6_selection() {
        let forced = App::parse_from(vec!["test_app_name", "-6", "example.com"]).unwrap();
        assert_eq!(forced.version, IpVersion::V6);

        let literal = App::parse_from(vec!["test_app_name", "fe80::1"]).unwrap();
        assert_eq!(literal.version, IpVersion::V6);
    }

    #[test]
    fn missing_destination() {
        let err = App::parse_from(vec!["test_app_name"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn durations() {
        let config = App::parse_from(vec!["test_app_name", "-W", "500", "--interval", "250", "-v", "::1"]).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(500));
        assert_eq!(config.interval, Duration::from_millis(250));
        assert!(config.verbose);
    }
}
