// Per-second rates from monotonically increasing counters.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

pub const CONTEXT_SWITCHES: &str = "context_switches";
pub const MINOR_FAULTS: &str = "minor_faults";
pub const MAJOR_FAULTS: &str = "major_faults";
pub const TOTAL_FAULTS: &str = "total_faults";
pub const SWAP_IN: &str = "swap_in";
pub const SWAP_OUT: &str = "swap_out";
pub const DISK_READ_MB: &str = "disk_read_mb";
pub const DISK_WRITE_MB: &str = "disk_write_mb";
pub const DISK_READ_OPS: &str = "disk_read_ops";
pub const DISK_WRITE_OPS: &str = "disk_write_ops";
pub const NET_RECV_MB: &str = "net_recv_mb";
pub const NET_SENT_MB: &str = "net_sent_mb";
pub const NET_PACKETS_RECV: &str = "net_packets_recv";
pub const NET_PACKETS_SENT: &str = "net_packets_sent";

const DEFAULT_CEILINGS: &[(&str, f64)] = &[
    (CONTEXT_SWITCHES, 10_000_000.0),
    (MINOR_FAULTS, 1_000_000.0),
    (MAJOR_FAULTS, 100_000.0),
    (TOTAL_FAULTS, 1_100_000.0),
    (DISK_READ_MB, 10_000.0),
    (DISK_WRITE_MB, 10_000.0),
    (DISK_READ_OPS, 1_000_000.0),
    (DISK_WRITE_OPS, 1_000_000.0),
    (NET_RECV_MB, 10_000.0),
    (NET_SENT_MB, 10_000.0),
    (NET_PACKETS_RECV, 10_000_000.0),
    (NET_PACKETS_SENT, 10_000_000.0),
];

#[derive(Debug, Clone, Copy)]
struct Observation {
    value: f64,
    at: Instant,
}

/// Last observation per metric name plus an optional plausible maximum.
/// Metrics without a ceiling (swap) are only floored at 0.
#[derive(Debug, Clone)]
pub struct RateTracker {
    last: HashMap<String, Observation>,
    ceilings: HashMap<String, f64>,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RateTracker {
    pub fn new() -> Self {
        Self {
            last: HashMap::new(),
            ceilings: DEFAULT_CEILINGS
                .iter()
                .map(|(name, max)| (name.to_string(), *max))
                .collect(),
        }
    }

    /// Tracker with no ceilings at all.
    pub fn unbounded() -> Self {
        Self {
            last: HashMap::new(),
            ceilings: HashMap::new(),
        }
    }

    pub fn with_ceiling(mut self, metric: &str, max: f64) -> Self {
        self.ceilings.insert(metric.to_string(), max);
        self
    }

    pub fn ceiling(&self, metric: &str) -> Option<f64> {
        self.ceilings.get(metric).copied()
    }

    /// `(current - previous) / elapsed_secs`, clamped to `[0, ceiling]`.
    ///
    /// The first observation of a metric only seeds state and returns 0.
    /// A non-advancing clock returns 0 and leaves state alone. A counter that
    /// went backwards returns 0 and re-seeds from the new value.
    pub fn rate(&mut self, metric: &str, current: f64, now: Instant) -> f64 {
        let Some(prev) = self.last.get(metric).copied() else {
            self.last
                .insert(metric.to_string(), Observation { value: current, at: now });
            return 0.0;
        };

        let elapsed = match now.checked_duration_since(prev.at) {
            Some(d) if !d.is_zero() => d.as_secs_f64(),
            _ => return 0.0,
        };

        self.last
            .insert(metric.to_string(), Observation { value: current, at: now });

        let delta = current - prev.value;
        if !delta.is_finite() || delta < 0.0 {
            debug!(metric, previous = prev.value, current, "counter reset; re-seeding");
            return 0.0;
        }

        let rate = delta / elapsed;
        match self.ceilings.get(metric) {
            Some(&max) if rate > max => {
                debug!(metric, rate, max, "rate clamped to ceiling");
                max
            }
            _ => rate,
        }
    }

    /// Forget every observation; the next call per metric is a cold start again.
    pub fn reset(&mut self) {
        self.last.clear();
    }

    pub fn tracked(&self) -> usize {
        self.last.len()
    }
}
