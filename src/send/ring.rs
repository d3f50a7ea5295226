use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Instant;

use crate::phase::CongestionPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Available,
    Filled,
    Sent,
}

/// One ring slot: an encoded outbound datagram plus its state and last-send
/// timestamp. Guarded by its own lock so the filler, transmitter, and ACK
/// manager never block each other on unrelated slots.
pub struct SendSlot {
    pub state: SlotState,
    pub seq: u32,
    pub datagram: Vec<u8>,
    pub sent_at: Option<Instant>,
}

impl SendSlot {
    fn new() -> Self {
        SendSlot { state: SlotState::Available, seq: 0, datagram: Vec::new(), sent_at: None }
    }
}

/// The coarse index state guarded by one lock: window bounds, congestion
/// phase, and the cumulative ACK pointer. `lastSent` is deliberately not
/// here — it is the transmitter thread's own loop-local state, read by
/// nobody else.
pub struct SendIndices {
    pub s_idx: usize,
    pub e_idx: usize,
    pub window_size: usize,
    pub expected_ack: u32,
    pub phase: CongestionPhase,
    pub shutdown: bool,
}

pub struct SendRing {
    pub slots: Vec<Mutex<SendSlot>>,
    pub capacity: usize,
    pub indices: Mutex<SendIndices>,
    /// Notified whenever the window gains room (a slot is retired) or the
    /// connection is shutting down.
    pub room: Condvar,
    /// Next sequence number the filler will assign.
    pub next_seq: AtomicU32,
    /// Set once the filler has consumed `bytes_to_transfer` bytes.
    pub file_load_completed: AtomicBool,
}

impl SendRing {
    pub fn new(capacity: usize, init_sws: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(Mutex::new(SendSlot::new()));
        }
        let window_size = init_sws.min(capacity).max(1);
        SendRing {
            slots,
            capacity,
            indices: Mutex::new(SendIndices {
                s_idx: 0,
                e_idx: window_size - 1,
                window_size,
                expected_ack: 0,
                phase: CongestionPhase::SlowStart,
                shutdown: false,
            }),
            room: Condvar::new(),
            next_seq: AtomicU32::new(0),
            file_load_completed: AtomicBool::new(false),
        }
    }

    pub fn slot(&self, seq: u32) -> &Mutex<SendSlot> {
        &self.slots[seq as usize % self.capacity]
    }

    /// Wakes every thread blocked on the window-room condvar; used both when
    /// a slot is retired and at shutdown.
    pub fn notify_room(&self) {
        self.room.notify_all();
    }
}
