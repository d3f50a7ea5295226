/// Congestion-control phase of the send window. See `Config` for the
/// growth parameters each phase uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionPhase {
    WaitingToSend,
    SlowStart,
    Aimd,
}

/// Connection lifecycle phase, shared by sender and receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Closed,
    Listen,
    SynSent,
    SynRecvd,
    Established,
    Closing,
    FinSent,
    TimeWait,
}
