#[macro_use]
extern crate log;

use crossbeam::channel;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;

use pinger::{
    cli::App,
    dest::Destination,
    logger::StdLogger,
    report::Console,
    session::Session,
    transport::IcmpSocket,
};

fn main() {
    let config = match App::parse_args() {
        Ok(config) => config,
        // Prints usage; exits with 1 unless help or version was requested
        Err(e) => e.exit(),
    };

    StdLogger::init(config.verbose);

    let destination = match Destination::resolve(&config.host, config.version) {
        Ok(dest) => dest,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    Console::banner(&config.host, config.version, config.ttl);

    let socket = match IcmpSocket::open(config.version).and_then(|socket| {
        socket.configure_hop_limit(config.ttl)?;
        Ok(socket)
    }) {
        Ok(socket) => socket,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    // Dropping the sender disconnects the channel, which every waiting select observes
    let (interrupt, shutdown) = channel::bounded::<()>(0);
    let mut interrupt = Some(interrupt);
    if let Err(e) = ctrlc::set_handler(move || {
        trace!("Registered signal interrupt -- Signalling shut down");
        interrupt.take();
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    trace!("Start ping session");

    let mut rng = StdRng::from_entropy();
    let mut session = Session::new(&config, destination, Arc::new(socket), &mut rng);
    if let Err(e) = session.run(&mut Console, &shutdown) {
        error!("{}", e);
        std::process::exit(1);
    }

    trace!("Shutting down...");
}
