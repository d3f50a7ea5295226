use std::collections::VecDeque;
use std::time::Duration;

use crate::config::Config;

/// Smoothed-RTT / adaptive-RTO estimator.
///
/// Mirrors the reference implementation's `updateTimingConstraints`: a
/// bounded history of raw samples feeds both a smoothed RTT (`srtt`, with a
/// smoothing coefficient that grows as retransmissions pile up) and a
/// standard-deviation term; the next RTO is a weighted sum of the two,
/// capped at `Config::max_rto`.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    history: VecDeque<f64>,
    max_history: usize,
    drop_hist_weight: usize,
    srtt: f64,
    rto_next_us: f64,
    num_retransmissions: u32,
    alpha: f64,
    alpha_max: f64,
    alpha_to_scalar: f64,
    srtt_slope: f64,
    std_slope: f64,
    max_srtt_weight: f64,
    max_rto_us: f64,
}

impl RttEstimator {
    pub fn new(config: &Config) -> Self {
        RttEstimator {
            history: VecDeque::with_capacity(config.max_rtt_history),
            max_history: config.max_rtt_history,
            drop_hist_weight: config.drop_hist_weight,
            srtt: 0.0,
            rto_next_us: config.init_rto.as_secs_f64() * 1_000_000.0,
            num_retransmissions: 0,
            alpha: config.alpha,
            alpha_max: config.alpha_max,
            alpha_to_scalar: config.alpha_to_scalar,
            srtt_slope: config.srtt_slope,
            std_slope: config.std_slope,
            max_srtt_weight: config.max_srtt_weight,
            max_rto_us: config.max_rto.as_secs_f64() * 1_000_000.0,
        }
    }

    /// Initial RTO measured from the handshake round-trip: `min(2*rtt, init_rto)`.
    pub fn seed_initial_rto(&mut self, initial_rtt: Duration, init_rto: Duration) {
        let doubled = initial_rtt.as_secs_f64() * 2.0 * 1_000_000.0;
        let cap = init_rto.as_secs_f64() * 1_000_000.0;
        self.rto_next_us = doubled.min(cap);
    }

    fn alpha(&self) -> f64 {
        (self.alpha_to_scalar * self.num_retransmissions as f64 + self.alpha).min(self.alpha_max)
    }

    fn mean(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }

    fn std_dev(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.history.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / self.history.len() as f64;
        var.sqrt()
    }

    /// Feed one retired ACK's measured round-trip sample.
    pub fn sample(&mut self, rtt: Duration) {
        let r = rtt.as_secs_f64() * 1_000_000.0;
        if self.history.len() == self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(r);

        let a = self.alpha();
        self.srtt = (1.0 - a) * self.srtt + a * r;

        let hist_len = self.history.len() as f64;
        let w_srtt = self.srtt_slope * hist_len + self.max_srtt_weight;
        let w_std = self.std_slope * hist_len;
        self.rto_next_us = (w_srtt * self.srtt + w_std * self.std_dev()).min(self.max_rto_us);
    }

    /// Called once per processed ACK, regardless of classification: slowly
    /// decays the retransmission penalty so RTO shrinks as the network
    /// recovers.
    pub fn decay_retransmissions(&mut self) {
        self.num_retransmissions /= 2;
    }

    /// Timeout recovery: inflate RTO, bump the retransmission counter, and
    /// prune the oldest history entries (biasing away from possibly-stale
    /// samples).
    pub fn on_timeout(&mut self) {
        self.num_retransmissions += 1;
        self.rto_next_us = (self.rto_next_us * 1.5).min(self.max_rto_us);
        let drop_n = (self.num_retransmissions as usize * self.drop_hist_weight)
            .min(self.history.len().saturating_sub(1));
        for _ in 0..drop_n {
            self.history.pop_front();
        }
    }

    pub fn num_retransmissions(&self) -> u32 {
        self.num_retransmissions
    }

    pub fn rto(&self) -> Duration {
        Duration::from_secs_f64((self.rto_next_us / 1_000_000.0).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rto_never_exceeds_cap() {
        let mut cfg = Config::default();
        cfg.max_rto = Duration::from_millis(500);
        let mut est = RttEstimator::new(&cfg);
        for _ in 0..50 {
            est.on_timeout();
        }
        assert!(est.rto() <= cfg.max_rto);
    }

    #[test]
    fn sampling_converges_toward_constant_rtt() {
        let cfg = Config::default();
        let mut est = RttEstimator::new(&cfg);
        for _ in 0..40 {
            est.sample(Duration::from_millis(100));
        }
        let rto_us = est.rto().as_secs_f64() * 1_000_000.0;
        assert!(rto_us < cfg.init_rto.as_secs_f64() * 1_000_000.0 * 2.0);
        assert!(rto_us > 0.0);
    }

    #[test]
    fn decay_halves_retransmission_counter() {
        let cfg = Config::default();
        let mut est = RttEstimator::new(&cfg);
        est.on_timeout();
        est.on_timeout();
        est.on_timeout();
        assert_eq!(est.num_retransmissions(), 3);
        est.decay_retransmissions();
        assert_eq!(est.num_retransmissions(), 1);
    }

    #[test]
    fn seed_initial_rto_caps_at_init_rto() {
        let cfg = Config::default();
        let mut est = RttEstimator::new(&cfg);
        est.seed_initial_rto(Duration::from_secs(10), cfg.init_rto);
        assert_eq!(est.rto(), cfg.init_rto);
    }
}
