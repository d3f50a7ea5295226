use std::fs::File;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::err::{Error, Result};
use crate::phase::ConnectionPhase;
use crate::send::ack_manager::run_ack_manager;
use crate::send::filler::run_filler;
use crate::send::handshake::{do_handshake, do_teardown};
use crate::send::ring::SendRing;
use crate::send::transmitter::run_transmitter;

/// A connected sender: owns the bound socket and the negotiated peer
/// address, ready to push one file per call to `send_file`.
pub struct Sender {
    socket: UdpSocket,
    peer: SocketAddr,
    config: Config,
    initial_rtt: Duration,
    phase: Mutex<ConnectionPhase>,
}

impl Sender {
    fn set_phase(&self, phase: ConnectionPhase) {
        let mut current = self.phase.lock().unwrap();
        log::debug!("sender: {:?} -> {phase:?}", *current);
        *current = phase;
    }

    /// Resolves `host:port`, binds an ephemeral local socket, and runs the
    /// three-way start handshake.
    pub fn connect(host: &str, port: u16, config: Config) -> Result<Sender> {
        let peer = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::Resolve(format!("{host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| Error::Resolve(format!("{host}:{port}")))?;

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(peer)?;
        log::info!("connecting to {peer}");

        log::debug!("sender: {:?} -> {:?}", ConnectionPhase::Closed, ConnectionPhase::SynSent);
        let initial_rtt = do_handshake(&socket, peer, &config)?;
        log::debug!("sender: {:?} -> {:?}", ConnectionPhase::SynSent, ConnectionPhase::Established);

        Ok(Sender {
            socket,
            peer,
            config,
            initial_rtt,
            phase: Mutex::new(ConnectionPhase::Established),
        })
    }

    /// Transfers the first `bytes_to_transfer` bytes of `path` to the peer,
    /// then tears the connection down.
    pub fn send_file(&self, path: &Path, bytes_to_transfer: u64) -> Result<()> {
        let file = File::open(path)?;
        let ring = Arc::new(SendRing::new(self.config.buffer_size, self.config.init_sws));

        let filler_ring = ring.clone();
        let payload_size = self.config.payload;
        let filler_handle = {
            let file = file.try_clone()?;
            thread::spawn(move || run_filler(filler_ring, file, bytes_to_transfer, payload_size))
        };

        let transmitter_ring = ring.clone();
        let transmitter_socket = self.socket.try_clone()?;
        let peer = self.peer;
        let transmitter_handle =
            thread::spawn(move || run_transmitter(transmitter_ring, transmitter_socket, peer));

        let ack_socket = self.socket.try_clone()?;
        let ack_result =
            run_ack_manager(ring, ack_socket, peer, self.config.clone(), self.initial_rtt);

        let transmitter_result = transmitter_handle.join().expect("transmitter panicked");
        let filler_result = filler_handle.join().expect("filler panicked");

        ack_result?;
        transmitter_result?;
        filler_result?;

        self.set_phase(ConnectionPhase::Closing);
        do_teardown(&self.socket, self.peer, &self.config)?;
        self.set_phase(ConnectionPhase::Closed);
        log::info!("transfer complete");
        Ok(())
    }
}
