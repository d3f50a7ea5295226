use std::net::{SocketAddr, UdpSocket};

use crate::err::Result;
use crate::wire::{self, Ack, Control, PacketType};

/// Waits for a SYN, replies SYN-ACK (echoing the sender's attempt index),
/// and waits for the closing ACK. The wait for that final ACK must also
/// accept an early DATA datagram — if the sender's view of the handshake
/// completed before our ACK reply arrived, it may already have started
/// sending. When that happens the leading datagram is handed back to the
/// caller so the normal receive loop can process it instead of being lost.
pub fn do_handshake(socket: &UdpSocket) -> Result<(SocketAddr, Option<Vec<u8>>)> {
    let mut buf = [0u8; 65536];
    loop {
        let (n, src) = socket.recv_from(&mut buf)?;
        let ctrl = match Control::decode(&buf[..n]) {
            Ok(c) => c,
            Err(_) => continue,
        };
        if ctrl.kind != PacketType::Syn {
            continue;
        }

        log::debug!("handshake: SYN from {src} (attempt {})", ctrl.seq);
        reply_syn_ack(socket, src, ctrl.seq)?;

        loop {
            let (n2, src2) = socket.recv_from(&mut buf)?;
            if src2 != src {
                continue;
            }
            if let Ok(ack) = Ack::decode(&buf[..n2]) {
                let _ = ack;
                log::info!("handshake: established with {src}");
                return Ok((src, None));
            }
            if wire::peek_type(&buf[..n2]) == Some(PacketType::Data) {
                log::debug!("handshake: closing ack lost, accepting early data from {src}");
                return Ok((src, Some(buf[..n2].to_vec())));
            }
            if let Ok(ctrl2) = Control::decode(&buf[..n2]) {
                if ctrl2.kind == PacketType::Syn {
                    reply_syn_ack(socket, src, ctrl2.seq)?;
                    continue;
                }
            }
        }
    }
}

fn reply_syn_ack(socket: &UdpSocket, peer: SocketAddr, attempt_seq: u32) -> Result<()> {
    let mut buf = Vec::new();
    Control { kind: PacketType::SynAck, seq: attempt_seq }.encode(&mut buf);
    socket.send_to(&buf, peer)?;
    Ok(())
}
