// Per-device reading as merged from the utilization and detail queries

use serde::{Deserialize, Serialize};

/// One accelerator's reading within a sample.
///
/// `frame_buffer_util_pct` is always recomputed from used/total; the upstream
/// tool's own percentage is never trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReading {
    #[serde(alias = "gpu_id")]
    pub logical_id: u32,
    pub sm_utilization: f64,
    pub memory_utilization: f64,
    pub temperature: f64,
    pub power: f64,
    #[serde(default, alias = "fb_mem_used_mib")]
    pub frame_buffer_used_mib: f64,
    #[serde(default = "default_total_mib", alias = "fb_mem_total_mib")]
    pub frame_buffer_total_mib: f64,
    #[serde(default, alias = "fb_mem_util_pct")]
    pub frame_buffer_util_pct: f64,
    /// Set when any part of the reading is a sentinel substituted after a failed query.
    #[serde(default)]
    pub degraded: bool,
}

fn default_total_mib() -> f64 {
    1.0
}

impl DeviceReading {
    /// Builds a reading and derives the frame-buffer percentage.
    /// A zero, negative or non-finite total is treated as 1 MiB; invalid values clamp to 0.
    pub fn new(
        logical_id: u32,
        utilization: Utilization,
        temperature: f64,
        power: f64,
        used_mib: f64,
        total_mib: f64,
    ) -> Self {
        let used = sanitize(used_mib);
        let total = if total_mib.is_finite() && total_mib > 0.0 {
            total_mib
        } else {
            1.0
        };
        Self {
            logical_id,
            sm_utilization: utilization.sm,
            memory_utilization: utilization.mem,
            temperature: sanitize(temperature),
            power: sanitize(power),
            frame_buffer_used_mib: used,
            frame_buffer_total_mib: total,
            frame_buffer_util_pct: used / total * 100.0,
            degraded: utilization.degraded,
        }
    }

    /// Sentinel reading for a device whose queries all failed: temperature 0, power 0, fb util 0.
    pub fn degraded(logical_id: u32) -> Self {
        let mut r = Self::new(logical_id, Utilization::degraded(), 0.0, 0.0, 0.0, 1.0);
        r.degraded = true;
        r
    }
}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() && v >= 0.0 { v } else { 0.0 }
}

/// SM / memory-controller utilization averaged over the lines reported for one device.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Utilization {
    pub sm: f64,
    pub mem: f64,
    #[serde(default)]
    pub degraded: bool,
}

impl Utilization {
    pub fn degraded() -> Self {
        Self {
            sm: 0.0,
            mem: 0.0,
            degraded: true,
        }
    }
}
