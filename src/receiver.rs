use crossbeam::channel::{Receiver, Sender, TryRecvError};
use crossbeam::select;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::PingError;
use crate::packet::{classify, IpVersion, Message};
use crate::transport::{is_poll_timeout, Transport};

/// What the receiver forwards to the control loop for every datagram
pub type Incoming = Result<Message, PingError>;

const BUFFER_LEN: usize = 1500;

/// Spawn the receiver thread
///
/// The thread owns nothing but a handle to the shared transport. It blocks on reads, classifies
/// whatever arrives and hands each result over `incoming`, which is expected to be a rendezvous or
/// capacity-1 channel. Unrelated traffic is forwarded as well; deciding what belongs to the
/// outstanding probe is up to the control loop.
///
/// The thread ends once `stop` is disconnected or the control loop hung up its end of
/// `incoming`. Reads time out regularly so a pending stop is noticed even on a silent network.
pub fn spawn<T: Transport>(
    transport: Arc<T>,
    version: IpVersion,
    incoming: Sender<Incoming>,
    stop: Receiver<()>,
) -> Result<JoinHandle<()>, PingError> {
    thread::Builder::new()
        .name("icmp-receiver".into())
        .spawn(move || listen(&*transport, version, &incoming, &stop))
        .map_err(PingError::Spawn)
}

fn listen<T: Transport>(
    transport: &T,
    version: IpVersion,
    incoming: &Sender<Incoming>,
    stop: &Receiver<()>,
) {
    trace!("Start listening thread for incoming {} packets", version);

    let mut buf = [0u8; BUFFER_LEN];
    loop {
        if let Err(TryRecvError::Disconnected) = stop.try_recv() {
            break;
        }

        let item = match transport.recv(&mut buf) {
            Ok(datagram) => classify(&buf[..datagram.len], version, datagram.hop_metric),
            Err(e) if is_poll_timeout(&e) => continue,
            Err(e) => Err(PingError::TransportReceive(e)),
        };

        // Blocks until the control loop is ready. This is what keeps a reply that lands between
        // two probes around instead of dropping it.
        select! {
            send(incoming, item) -> res => if res.is_err() {
                break;
            },
            recv(stop) -> _ => break,
        }
    }

    trace!("Shutting down listening thread");
}
