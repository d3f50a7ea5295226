use std::time::Duration;

/// Every tunable of the reliability engine, gathered on one value instead of
/// the compile-time `#define` table the original protocol was measured
/// against. Callers may override any subset before constructing a `Sender`
/// or `Receiver`; `Default` reproduces the reference implementation's
/// shipped constants.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum payload bytes carried by a single data datagram.
    pub payload: usize,
    /// Ring buffer capacity, in slots, on both sender and receiver.
    pub buffer_size: usize,
    /// Initial window size (slots) before slow start has measured anything.
    pub init_sws: usize,
    pub min_window_size: usize,
    pub max_window_size: usize,

    /// Initial retransmission timeout, used before the first RTT sample.
    pub init_rto: Duration,
    pub max_rto: Duration,

    pub alpha: f64,
    pub alpha_max: f64,
    pub alpha_to_scalar: f64,
    pub srtt_slope: f64,
    pub std_slope: f64,
    pub max_srtt_weight: f64,
    pub max_rtt_history: usize,
    pub drop_hist_weight: usize,

    /// Duplicate-ACK count that first triggers fast retransmit.
    pub dup_max_counter: u32,
    /// Popcount of the selective-ACK bitmap at which the receiver switches
    /// from a plain cumulative ACK to the flagged form.
    pub cs_ack_threshold: u32,
    /// Width, in bits, of the selective-ACK bitmap.
    pub flag_size: u32,

    /// Socket timeout used while walking the window during timeout recovery.
    pub retrans_check_time: Duration,
    /// Receiver TIME_WAIT duration after replying FIN_ACK.
    pub fin_timeout: Duration,
    /// Number of SYN attempts whose send timestamps are retained to measure
    /// the initial RTT once a matching SYN_ACK arrives.
    pub start_time_vec_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            payload: 1024,
            buffer_size: 4096,
            init_sws: 10,
            min_window_size: 2,
            max_window_size: 2048,

            init_rto: Duration::from_millis(3000),
            max_rto: Duration::from_millis(240_000),

            alpha: 0.125,
            alpha_max: 0.5,
            alpha_to_scalar: 0.05,
            srtt_slope: -0.05,
            std_slope: 0.4,
            max_srtt_weight: 1.5,
            max_rtt_history: 64,
            drop_hist_weight: 4,

            dup_max_counter: 3,
            cs_ack_threshold: 4,
            flag_size: 64,

            retrans_check_time: Duration::from_millis(200),
            fin_timeout: Duration::from_millis(2000),
            start_time_vec_size: 8,
        }
    }
}
