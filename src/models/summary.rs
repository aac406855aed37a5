// Reduction outputs: per-device baseline, stress summary, per-host report

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Throughput parsed from one benchmark log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputEntry {
    /// Log file name; matched against device ids.
    pub name: String,
    /// Sum of all values on the last matching line.
    pub total: f64,
    pub unit: String,
    /// Number of values on that line (one per device for multi-device runs).
    pub device_count: usize,
}

/// Baseline-phase statistics for one logical device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaselineStats {
    pub avg_utilization: f64,
    pub avg_memory_utilization: f64,
    pub avg_temperature: f64,
    pub max_temperature: f64,
    pub avg_power: f64,
    pub max_power: f64,
    pub avg_frame_buffer_util: f64,
    pub throughput: f64,
    pub sample_count: usize,
}

/// Statistics over every device record of the stress phase.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FullStats {
    pub total_samples: usize,
    pub max_temp_observed: f64,
    pub data_available: bool,
    pub avg_utilization: f64,
    pub avg_power_per_device: f64,
}

/// Stress-phase summary. All zeros with `device_count == 0` means "no data".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StressSummary {
    pub total_throughput: f64,
    pub device_count: usize,
    pub avg_total_power: f64,
    pub max_temperature: f64,
    pub temperature_spread: f64,
    pub baseline_throughput_sum: f64,
    pub scaling_efficiency: f64,
    pub full_stats: FullStats,
}

/// Both phases reduced for one benchmarked host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostReport {
    pub host: String,
    pub baseline: BTreeMap<u32, BaselineStats>,
    pub stress: StressSummary,
}
