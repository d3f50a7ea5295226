use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::err::Result;
use crate::wire::{Ack, Control, PacketType};

/// Three-way start. Retries the SYN indefinitely on timeout (matching the
/// reference implementation's behavior rather than surfacing a
/// connection-failure error, per the protocol's explicit allowance). Each
/// attempt's send timestamp is kept in a ring of `start_time_vec_size`
/// slots, keyed by attempt index modulo that size; the matching SYN-ACK
/// echoes the attempt index so the initial RTT can be measured even if
/// earlier SYNs were lost.
pub fn do_handshake(socket: &UdpSocket, peer: SocketAddr, config: &Config) -> Result<Duration> {
    let mut send_times: Vec<Option<Instant>> = vec![None; config.start_time_vec_size];
    let mut attempt: u32 = 0;

    loop {
        let idx = attempt as usize % config.start_time_vec_size;
        send_times[idx] = Some(Instant::now());

        let mut buf = Vec::new();
        Control { kind: PacketType::Syn, seq: idx as u32 }.encode(&mut buf);
        socket.send_to(&buf, peer)?;
        log::debug!("handshake: sent SYN attempt {attempt} (slot {idx})");

        socket.set_read_timeout(Some(config.init_rto))?;
        let mut rbuf = [0u8; 16];
        match socket.recv_from(&mut rbuf) {
            Ok((n, _)) => {
                if let Ok(ctrl) = Control::decode(&rbuf[..n]) {
                    if ctrl.kind == PacketType::SynAck {
                        let sent_idx = ctrl.seq as usize % config.start_time_vec_size;
                        let rtt = send_times[sent_idx]
                            .map(|t| t.elapsed())
                            .unwrap_or(config.init_rto);

                        let mut ack_buf = Vec::new();
                        Ack::Cumulative { seq: 0 }.encode(&mut ack_buf);
                        socket.send_to(&ack_buf, peer)?;

                        log::info!("handshake: established, initial rtt {rtt:?}");
                        return Ok(rtt);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                attempt = attempt.wrapping_add(1);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Symmetric FIN teardown. Like the start handshake, retries indefinitely
/// on timeout.
pub fn do_teardown(socket: &UdpSocket, peer: SocketAddr, config: &Config) -> Result<()> {
    let mut seq: u32 = 0;
    loop {
        let mut buf = Vec::new();
        Control { kind: PacketType::Fin, seq }.encode(&mut buf);
        socket.send_to(&buf, peer)?;
        log::debug!("teardown: sent FIN {seq}");

        socket.set_read_timeout(Some(config.init_rto))?;
        let mut rbuf = [0u8; 16];
        match socket.recv_from(&mut rbuf) {
            Ok((n, _)) => {
                if let Ok(ctrl) = Control::decode(&rbuf[..n]) {
                    if ctrl.kind == PacketType::FinAck {
                        let mut ack_buf = Vec::new();
                        Ack::Cumulative { seq: 0 }.encode(&mut ack_buf);
                        socket.send_to(&ack_buf, peer)?;
                        log::info!("teardown: complete");
                        return Ok(());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                seq = seq.wrapping_add(1);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
