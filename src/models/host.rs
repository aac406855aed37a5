// Host-side metrics captured alongside each device sample

use serde::{Deserialize, Serialize};

/// Flat host metric snapshot. Every field is independent: `None` means that
/// source was unavailable for this tick (read it as 0 downstream).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_utilization_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_utilization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_total_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_used_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_available_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_available_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_average_1m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_average_5m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_average_15m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_queue_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_queue_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_psi_some_avg60: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_switches_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minor_faults_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub major_faults_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_faults_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_in_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_out_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_total_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap_used_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub io_wait_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_read_mbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_write_mbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_read_iops: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_write_iops: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_recv_mbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_sent_mbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_packets_recv_per_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_packets_sent_per_sec: Option<f64>,
}

impl HostSnapshot {
    /// Number of metrics that were actually collected this tick.
    pub fn populated(&self) -> usize {
        [
            self.cpu_utilization_total,
            self.cpu_cores,
            self.memory_utilization,
            self.memory_total_gb,
            self.memory_used_gb,
            self.memory_available_gb,
            self.memory_available_pct,
            self.load_average_1m,
            self.load_average_5m,
            self.load_average_15m,
            self.run_queue_length,
            self.run_queue_ratio,
            self.cpu_psi_some_avg60,
            self.context_switches_per_sec,
            self.minor_faults_per_sec,
            self.major_faults_per_sec,
            self.total_faults_per_sec,
            self.swap_in_per_sec,
            self.swap_out_per_sec,
            self.swap_total_mb,
            self.swap_used_pct,
            self.io_wait_pct,
            self.disk_read_mbps,
            self.disk_write_mbps,
            self.disk_read_iops,
            self.disk_write_iops,
            self.network_recv_mbps,
            self.network_sent_mbps,
            self.network_packets_recv_per_sec,
            self.network_packets_sent_per_sec,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }
}
