use crossbeam::channel::{self, Receiver};
use crossbeam::select;
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::dest::Destination;
use crate::error::PingError;
use crate::packet::{echo_request, timestamp, IpVersion, Message, MessageKind};
use crate::receiver::{self, Incoming};
use crate::report::{Outcome, Report};
use crate::transport::Transport;
use crate::Config;

/// How a cycle ended
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cycle {
    /// A reply, time-exceeded notice or receive error closed the cycle
    Replied,
    /// The timer fired first
    TimedOut,
    /// Shutdown was requested while waiting
    Interrupted,
}

/// A stop-and-wait ping session against a single destination
///
/// Exactly one echo request is outstanding at any time. The session sends a request, then waits
/// for whichever comes first: an attributable reply or the timeout. Replies are attributed by
/// identifier and sequence number; everything else arriving on the socket is drained and ignored.
///
/// The sequence number is the only state that changes after construction, and only the control
/// loop in [`run`](Session::run) changes it.
pub struct Session<T: Transport> {
    identifier: u16,
    sequence: u16,
    destination: Destination,
    version: IpVersion,
    timeout: Duration,
    interval: Duration,
    transport: Arc<T>,
}

impl<T: Transport> Session<T> {
    /// Create a new session with identifier and initial sequence number drawn from `rng`
    pub fn new<R: Rng>(
        config: &Config,
        destination: Destination,
        transport: Arc<T>,
        rng: &mut R,
    ) -> Self {
        let identifier = rng.gen::<u16>();
        let sequence = rng.gen::<u16>();
        Self::with_identity(config, destination, transport, identifier, sequence)
    }

    /// Create a new session with a fixed identity
    ///
    /// `sequence` is the value before the first probe; the first request goes out with
    /// `sequence + 1`.
    pub fn with_identity(
        config: &Config,
        destination: Destination,
        transport: Arc<T>,
        identifier: u16,
        sequence: u16,
    ) -> Self {
        debug!("New session with identifier {:#06x}, sequence {}", identifier, sequence);

        Self {
            identifier,
            sequence,
            version: destination.version(),
            destination,
            timeout: config.timeout,
            interval: config.interval,
            transport,
        }
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Ping until `shutdown` becomes ready or sending fails
    ///
    /// `shutdown` is typically the receiving end of a channel whose sender is dropped on Ctrl-C.
    /// A receiver thread is started for the lifetime of this call and is stopped and joined on
    /// every exit path.
    ///
    /// # Errors
    ///
    /// A failed send ends the session with `TransportSend`. Receive-side failures are reported
    /// through `reporter` and never end the session.
    pub fn run<R: Report>(
        &mut self,
        reporter: &mut R,
        shutdown: &Receiver<()>,
    ) -> Result<(), PingError> {
        let (tx, incoming) = channel::bounded::<Incoming>(1);
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let listener = receiver::spawn(self.transport.clone(), self.version, tx, stop_rx)?;

        let result = self.ping_loop(&incoming, reporter, shutdown);

        drop(stop_tx);
        drop(incoming);
        match listener.join() {
            Ok(_) => trace!("Successfully shut down listening thread"),
            Err(_) => warn!("Listening thread panicked"),
        }

        result
    }

    fn ping_loop<R: Report>(
        &mut self,
        incoming: &Receiver<Incoming>,
        reporter: &mut R,
        shutdown: &Receiver<()>,
    ) -> Result<(), PingError> {
        loop {
            self.send_probe()?;

            match self.await_reply(incoming, reporter, shutdown) {
                Cycle::Replied => {
                    // Pace after an answer. A timeout already waited long enough.
                    select! {
                        recv(shutdown) -> _ => return Ok(()),
                        default(self.interval) => (),
                    }
                }
                Cycle::TimedOut => (),
                Cycle::Interrupted => return Ok(()),
            }
        }
    }

    /// Advance the sequence number and send the next echo request
    ///
    /// # Errors
    ///
    /// Returns `TransportSend` if the transport refuses the packet.
    pub fn send_probe(&mut self) -> Result<(), PingError> {
        self.sequence = self.sequence.wrapping_add(1);
        let packet = echo_request(self.version, self.identifier, self.sequence, SystemTime::now());

        trace!("Sending echo request icmp_seq={} to {}", self.sequence, self.destination);

        self.transport
            .send_to(&packet, self.destination.socket_addr())
            .map(|_| ())
            .map_err(PingError::TransportSend)
    }

    /// Wait for the outstanding probe to be answered or to time out
    ///
    /// Every message drained from `incoming` is dispatched. Messages that do not belong to the
    /// outstanding probe leave the timer running.
    pub fn await_reply<R: Report>(
        &self,
        incoming: &Receiver<Incoming>,
        reporter: &mut R,
        shutdown: &Receiver<()>,
    ) -> Cycle {
        let timer = channel::after(self.timeout);

        loop {
            select! {
                recv(timer) -> _ => {
                    reporter.report(Outcome::Unreachable {
                        destination: self.destination.ip(),
                        sequence: self.sequence,
                    });
                    return Cycle::TimedOut;
                },
                recv(incoming) -> item => {
                    let outcome = match item {
                        Ok(Ok(message)) => self.dispatch(message),
                        Ok(Err(e)) => Some(Outcome::ReceiveError(e)),
                        Err(_) => Some(Outcome::ReceiveError(PingError::TransportReceive(
                            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "receiver stopped"),
                        ))),
                    };

                    if let Some(outcome) = outcome {
                        let terminal = outcome.is_terminal();
                        reporter.report(outcome);
                        if terminal {
                            return Cycle::Replied;
                        }
                    }
                },
                recv(shutdown) -> _ => return Cycle::Interrupted,
            }
        }
    }

    /// Map an incoming message to the outcome it causes, if any
    fn dispatch(&self, message: Message) -> Option<Outcome> {
        match message.kind {
            MessageKind::EchoReply(echo) => {
                if echo.identifier != self.identifier || echo.sequence != self.sequence {
                    trace!(
                        "Ignoring echo reply id={:#06x} icmp_seq={}, want id={:#06x} icmp_seq={}",
                        echo.identifier,
                        echo.sequence,
                        self.identifier,
                        self.sequence
                    );
                    return None;
                }

                let outcome = match echo.stamp() {
                    Some(stamp) => Outcome::Success {
                        destination: self.destination.ip(),
                        sequence: self.sequence,
                        hop_metric: message.hop_metric,
                        rtt: timestamp::elapsed_since(stamp, SystemTime::now()),
                    },
                    None => Outcome::ReceiveError(PingError::MalformedMessage(
                        "echo reply without timestamp",
                    )),
                };
                Some(outcome)
            }
            MessageKind::TimeExceeded => Some(Outcome::TtlExceeded {
                destination: self.destination.ip(),
                sequence: self.sequence,
            }),
            MessageKind::Other(icmp_type) => Some(Outcome::UnexpectedType {
                icmp_type,
                code: message.code,
            }),
        }
    }
}
