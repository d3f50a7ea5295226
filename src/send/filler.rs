use std::fs::File;
use std::io::Read;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use crate::err::Result;
use crate::send::ring::{SendRing, SlotState};
use crate::wire::DataPacket;

/// Reads the source file into AVAILABLE slots in sequence order, turning
/// each into a FILLED datagram. Stops once `bytes_to_transfer` bytes have
/// been consumed. Never transmits and never retires slots.
///
/// If the next slot to fill is not AVAILABLE (the transmitter/ACK manager
/// haven't retired it yet), the filler yields and retries rather than
/// blocking or giving up.
///
/// `file_load_completed` is set whether `fill` succeeds or fails. A short
/// read (`bytes_to_transfer` exceeding the source file's length) must still
/// unblock the ACK manager's termination check — otherwise it spins on
/// timeouts forever with nothing left to retransmit, and the `Err` this
/// function returns is never observed by the caller.
pub fn run_filler(
    ring: Arc<SendRing>,
    mut source: File,
    bytes_to_transfer: u64,
    payload_size: usize,
) -> Result<()> {
    let result = fill(&ring, &mut source, bytes_to_transfer, payload_size);
    ring.file_load_completed.store(true, Ordering::SeqCst);
    result
}

fn fill(ring: &SendRing, source: &mut File, bytes_to_transfer: u64, payload_size: usize) -> Result<()> {
    let mut remaining = bytes_to_transfer;
    let mut seq: u32 = 0;

    while remaining > 0 {
        let chunk_len = payload_size.min(remaining as usize);
        let idx = seq as usize % ring.capacity;

        loop {
            let mut slot = ring.slots[idx].lock().unwrap();
            if slot.state == SlotState::Available {
                let mut buf = vec![0u8; chunk_len];
                source.read_exact(&mut buf)?;

                let packet = DataPacket { seq, payload: buf };
                let mut datagram = Vec::with_capacity(chunk_len + 5);
                packet.encode(&mut datagram);

                slot.seq = seq;
                slot.datagram = datagram;
                slot.state = SlotState::Filled;
                log::trace!("filler: slot {idx} filled with seq {seq} ({chunk_len} bytes)");
                break;
            }
            drop(slot);
            thread::yield_now();
        }

        remaining -= chunk_len as u64;
        seq = seq.wrapping_add(1);
        ring.next_seq.store(seq, Ordering::SeqCst);
    }

    log::debug!("filler: done, {seq} packets queued");
    Ok(())
}
