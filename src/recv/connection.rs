use std::fs::OpenOptions;
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::sync::Mutex;

use crate::config::Config;
use crate::err::{Error, Result};
use crate::phase::ConnectionPhase;
use crate::recv::handshake::do_handshake;
use crate::recv::ring::{AckSink, RecvRing, UdpAckSink};
use crate::wire::{self, Control, DataPacket, PacketType};

/// A listening receiver: owns the bound socket, ready to accept one
/// connection and write one file per call to `receive_file`.
pub struct Receiver {
    socket: UdpSocket,
    config: Config,
    phase: Mutex<ConnectionPhase>,
}

impl Receiver {
    pub fn listen(port: u16, config: Config) -> Result<Receiver> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                Error::PortInUse(port)
            } else {
                Error::Io(e)
            }
        })?;
        log::info!("listening on port {port}");
        Ok(Receiver { socket, config, phase: Mutex::new(ConnectionPhase::Listen) })
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        let mut current = self.phase.lock().unwrap();
        log::debug!("receiver: {:?} -> {phase:?}", *current);
        *current = phase;
    }

    /// Runs the start handshake, reassembles the incoming stream into
    /// `path`, then runs FIN teardown with TIME_WAIT.
    pub fn receive_file(&self, path: &Path) -> Result<()> {
        self.set_phase(ConnectionPhase::SynRecvd);
        let (peer, pending) = do_handshake(&self.socket)?;
        self.socket.connect(peer)?;
        self.set_phase(ConnectionPhase::Established);

        let file = OpenOptions::new().write(true).create(true).truncate(true).open(path)?;
        let ack_sink = UdpAckSink::new(self.socket.try_clone()?, peer);
        let mut ring =
            RecvRing::new(self.config.buffer_size, file, self.config.cs_ack_threshold, self.config.flag_size);

        if let Some(first) = pending {
            self.handle_datagram(&mut ring, &ack_sink, &first)?;
        }

        let mut buf = [0u8; 65536];
        loop {
            let (n, src) = self.socket.recv_from(&mut buf)?;
            if src != peer {
                continue;
            }
            if self.handle_datagram(&mut ring, &ack_sink, &buf[..n])? {
                break;
            }
        }

        self.set_phase(ConnectionPhase::Closing);
        self.time_wait(peer)?;
        self.set_phase(ConnectionPhase::Closed);
        log::info!("transfer complete, wrote {}", path.display());
        Ok(())
    }

    /// Returns `true` once a FIN has been seen and acknowledged.
    fn handle_datagram(&self, ring: &mut RecvRing, ack_sink: &UdpAckSink, bytes: &[u8]) -> Result<bool> {
        match wire::peek_type(bytes) {
            Some(PacketType::Data) => {
                let packet = DataPacket::decode(bytes)?;
                if let Some(ack) = ring.store_received_packet(packet.seq, packet.payload)? {
                    ack_sink.send_ack(ack)?;
                }
                Ok(false)
            }
            Some(PacketType::Fin) => {
                let mut out = Vec::new();
                Control { kind: PacketType::FinAck, seq: 0 }.encode(&mut out);
                self.socket.send(&out)?;
                log::debug!("recv: FIN acknowledged");
                Ok(true)
            }
            _ => {
                log::trace!("recv: discarding unexpected datagram");
                Ok(false)
            }
        }
    }

    /// TIME_WAIT: re-sends FIN-ACK for any retransmitted FIN until the peer
    /// falls silent for `fin_timeout`.
    fn time_wait(&self, peer: SocketAddr) -> Result<()> {
        self.set_phase(ConnectionPhase::TimeWait);
        self.socket.set_read_timeout(Some(self.config.fin_timeout))?;
        let mut buf = [0u8; 64];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, src)) if src == peer => {
                    if let Ok(ctrl) = Control::decode(&buf[..n]) {
                        if ctrl.kind == PacketType::Fin {
                            let mut out = Vec::new();
                            Control { kind: PacketType::FinAck, seq: 0 }.encode(&mut out);
                            self.socket.send_to(&out, peer)?;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        log::debug!("recv: time_wait elapsed, closing");
        Ok(())
    }
}
