use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::err::Result;
use crate::send::ring::{SendRing, SlotState};

/// Blocks until the window has room, then sends every FILLED slot from just
/// past the last sequence number it sent up through the current window end,
/// transitioning each to SENT. Never reads the file, never retires slots.
///
/// Walks by sequence number rather than by raw ring index: since a slot's
/// ring index is always `seq % capacity`, the two are equivalent, and
/// sequence-number arithmetic avoids conflating the (possibly many times
/// wrapped) absolute sequence space with the ring's fixed capacity.
pub fn run_transmitter(ring: Arc<SendRing>, socket: UdpSocket, peer: SocketAddr) -> Result<()> {
    let mut last_sent: Option<u32> = None;

    loop {
        let (start_seq, end_seq) = {
            let mut indices = ring.indices.lock().unwrap();
            loop {
                if indices.shutdown {
                    return Ok(());
                }
                let outstanding = match last_sent {
                    Some(ls) => ls.wrapping_sub(indices.expected_ack).wrapping_add(1),
                    None => 0,
                };
                if (outstanding as usize) < indices.window_size {
                    break;
                }
                indices = ring.room.wait(indices).unwrap();
            }
            let start = last_sent.map(|x| x.wrapping_add(1)).unwrap_or(indices.expected_ack);
            let end = indices.expected_ack.wrapping_add(indices.window_size as u32).wrapping_sub(1);
            (start, end)
        };

        let span = end_seq.wrapping_sub(start_seq).wrapping_add(1);
        let mut sent_any = false;
        for i in 0..span {
            let seq = start_seq.wrapping_add(i);
            let slot_mutex = ring.slot(seq);
            let mut slot = slot_mutex.lock().unwrap();
            if slot.seq == seq && slot.state == SlotState::Filled {
                socket.send_to(&slot.datagram, peer)?;
                slot.sent_at = Some(Instant::now());
                slot.state = SlotState::Sent;
                last_sent = Some(seq);
                sent_any = true;
                log::trace!("transmitter: sent seq {seq}");
            } else {
                break;
            }
        }

        if !sent_any {
            if ring.file_load_completed.load(Ordering::SeqCst) {
                let indices = ring.indices.lock().unwrap();
                if indices.shutdown {
                    return Ok(());
                }
                drop(indices);
            }
            std::thread::yield_now();
        }
    }
}
