use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::err::Result;
use crate::phase::CongestionPhase;
use crate::rtt::RttEstimator;
use crate::send::ring::{SendRing, SlotState};
use crate::util::wrapping_lt;
use crate::wire::Ack;

struct DupState {
    seq: Option<u32>,
    count: u32,
    extra_triggers: u32,
}

impl DupState {
    fn new() -> Self {
        DupState { seq: None, count: 0, extra_triggers: 0 }
    }

    /// Registers one more duplicate of `seq`. Returns `true` if this
    /// duplicate should trigger (another) fast retransmit.
    fn register(&mut self, seq: u32, dup_max: u32, window_size: usize) -> bool {
        if self.seq != Some(seq) {
            self.seq = Some(seq);
            self.count = 1;
            self.extra_triggers = 0;
            return false;
        }
        self.count += 1;
        if self.count == dup_max {
            return true;
        }
        if self.count > dup_max {
            let step = (window_size / 3).max(1) as u32;
            let since = self.count - dup_max;
            if since % step == 0 {
                self.extra_triggers += 1;
                return true;
            }
        }
        false
    }
}

/// Retires every slot in `[from, to]` (inclusive, wrapping) to AVAILABLE.
/// Samples RTT only for the slot at `to`, matching the rule that an
/// out-of-order-ahead ACK cumulatively retires the skipped range but the
/// round-trip sample is only meaningful for the packet actually
/// acknowledged by this datagram.
fn retire_range(ring: &SendRing, rtt: &mut RttEstimator, from: u32, to: u32) {
    let span = to.wrapping_sub(from).wrapping_add(1);
    for i in 0..span {
        let seq = from.wrapping_add(i);
        let mut slot = ring.slot(seq).lock().unwrap();
        if slot.seq == seq && slot.state == SlotState::Sent {
            if seq == to {
                if let Some(sent_at) = slot.sent_at {
                    rtt.sample(sent_at.elapsed());
                }
            }
            slot.state = SlotState::Available;
        }
    }
}

fn fast_retransmit(ring: &SendRing, socket: &UdpSocket, peer: SocketAddr, expected_ack: u32, window_size: usize) -> Result<()> {
    let count = (window_size / 2).max(1);
    for i in 0..count {
        let seq = expected_ack.wrapping_add(i as u32);
        let mut slot = ring.slot(seq).lock().unwrap();
        if slot.seq == seq && slot.state == SlotState::Sent {
            socket.send_to(&slot.datagram, peer)?;
            slot.sent_at = Some(Instant::now());
            log::debug!("fast retransmit: reseq {seq}");
        }
    }
    Ok(())
}

/// Window-advance rule applied once per expected/out-of-order-ahead ACK:
/// slow start grows by one per ACK; AIMD grows only when the acknowledged
/// sequence lands on the final slot of a full window.
fn grow_window(indices: &mut super::ring::SendIndices, acked_seq: u32, config: &Config) {
    match indices.phase {
        CongestionPhase::WaitingToSend | CongestionPhase::SlowStart => {
            indices.window_size = (indices.window_size + 1).min(config.max_window_size);
        }
        CongestionPhase::Aimd => {
            let ws = indices.window_size as u32;
            if ws > 0 && acked_seq % ws == ws - 1 {
                indices.window_size = (indices.window_size + 1).min(config.max_window_size);
            }
        }
    }
}

enum AckOutcome {
    Advanced,
    Duplicate { should_retransmit: bool },
    Spurious,
}

fn handle_ack(
    ring: &SendRing,
    rtt: &mut RttEstimator,
    dup: &mut DupState,
    config: &Config,
    ack: Ack,
) -> AckOutcome {
    let a = ack.seq();
    let mut indices = ring.indices.lock().unwrap();
    let expected = indices.expected_ack;

    if a == expected || wrapping_lt(expected, a) {
        retire_range(ring, rtt, expected, a);
        grow_window(&mut indices, a, config);
        indices.expected_ack = a.wrapping_add(1);
        indices.s_idx = indices.expected_ack as usize % ring.capacity;
        indices.e_idx = indices.expected_ack.wrapping_add(indices.window_size as u32 - 1) as usize % ring.capacity;
        drop(indices);
        ring.notify_room();
        AckOutcome::Advanced
    } else if expected == a.wrapping_add(1) {
        let window_size = indices.window_size;
        drop(indices);
        let should_retransmit = dup.register(a, config.dup_max_counter, window_size);
        AckOutcome::Duplicate { should_retransmit }
    } else {
        AckOutcome::Spurious
    }
}

fn retransmit_window(ring: &SendRing, socket: &UdpSocket, peer: SocketAddr, config: &Config) -> Result<Option<Ack>> {
    socket.set_read_timeout(Some(config.retrans_check_time))?;
    let start = {
        let indices = ring.indices.lock().unwrap();
        indices.expected_ack
    };
    // Walk the whole ring capacity from sIdx, not just the current (possibly
    // already-halved) window: outstanding SENT slots can still number up to
    // the pre-halving window, and every one of them must be replayed.
    for i in 0..ring.capacity as u32 {
        let seq = start.wrapping_add(i);
        {
            let mut slot = ring.slot(seq).lock().unwrap();
            if slot.seq == seq && slot.state == SlotState::Sent {
                socket.send_to(&slot.datagram, peer)?;
                slot.sent_at = Some(Instant::now());
            }
        }

        let mut buf = [0u8; 65536];
        match socket.recv_from(&mut buf) {
            Ok((n, _)) => {
                if let Ok(ack) = Ack::decode(&buf[..n]) {
                    log::debug!("retransmit walk interrupted by ack {}", ack.seq());
                    return Ok(Some(ack));
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

/// Single-threaded ACK-processing loop: reads one ACK at a time with a
/// receive timeout equal to the current RTO; on timeout, shrinks the
/// window, inflates the RTO, and replays the outstanding window; on
/// receipt, classifies and retires, growing the window and feeding the
/// RTT estimator. Terminates once every assigned sequence number has been
/// acknowledged and the filler has finished reading the file.
pub fn run_ack_manager(
    ring: Arc<SendRing>,
    socket: UdpSocket,
    peer: SocketAddr,
    config: Config,
    initial_rtt: std::time::Duration,
) -> Result<()> {
    let mut rtt = RttEstimator::new(&config);
    rtt.seed_initial_rto(initial_rtt, config.init_rto);
    let mut dup = DupState::new();

    loop {
        if is_done(&ring) {
            break;
        }

        socket.set_read_timeout(Some(rtt.rto()))?;
        let mut buf = [0u8; 65536];
        let ack = match socket.recv_from(&mut buf) {
            Ok((n, _)) => match Ack::decode(&buf[..n]) {
                Ok(ack) => Some(ack),
                Err(_) => {
                    log::trace!("ack manager: discarding malformed datagram");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                log::debug!("ack manager: timeout, entering recovery");
                {
                    let mut indices = ring.indices.lock().unwrap();
                    indices.window_size = (indices.window_size / 2).max(config.min_window_size);
                    indices.phase = CongestionPhase::Aimd;
                }
                rtt.on_timeout();
                retransmit_window(&ring, &socket, peer, &config)?
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(ack) = ack {
            match handle_ack(&ring, &mut rtt, &mut dup, &config, ack) {
                AckOutcome::Advanced => {}
                AckOutcome::Duplicate { should_retransmit } => {
                    if should_retransmit {
                        let (expected_ack, window_size) = {
                            let indices = ring.indices.lock().unwrap();
                            (indices.expected_ack, indices.window_size)
                        };
                        fast_retransmit(&ring, &socket, peer, expected_ack, window_size)?;
                    }
                }
                AckOutcome::Spurious => {
                    log::trace!("ack manager: spurious ack {}", ack.seq());
                }
            }
            rtt.decay_retransmissions();
        }
    }

    {
        let mut indices = ring.indices.lock().unwrap();
        indices.shutdown = true;
    }
    ring.notify_room();
    log::debug!("ack manager: transfer complete");
    Ok(())
}

fn is_done(ring: &SendRing) -> bool {
    if !ring.file_load_completed.load(Ordering::SeqCst) {
        return false;
    }
    let next_seq = ring.next_seq.load(Ordering::SeqCst);
    let indices = ring.indices.lock().unwrap();
    !wrapping_lt(indices.expected_ack, next_seq)
}
