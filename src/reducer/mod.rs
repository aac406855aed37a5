// Offline reduction: baseline (one device at a time) and stress (all devices) summaries.
// Pure aggregation here; file access lives in `phase`.

mod phase;
mod throughput;

pub use phase::{PhaseData, PhaseKind, analyze_host, discover_hosts, is_valid_hostname, load_phase};
pub use throughput::{names_device, parse_throughput_log, throughput_for_device};

use crate::models::{
    BaselineStats, DeviceReading, FullStats, StressSummary, TelemetrySample, ThroughputEntry,
};
use crate::validator::Validator;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Per-device statistics over the baseline phase. Empty input gives an empty map.
pub fn baseline(
    samples: &[TelemetrySample],
    throughput: &[ThroughputEntry],
    validator: &Validator,
) -> BTreeMap<u32, BaselineStats> {
    let mut by_device: BTreeMap<u32, Vec<&DeviceReading>> = BTreeMap::new();
    for reading in valid_readings(samples, validator) {
        by_device.entry(reading.logical_id).or_default().push(reading);
    }
    if by_device.is_empty() {
        tracing::warn!(operation = "baseline", "no valid device records");
    }

    by_device
        .into_iter()
        .map(|(id, readings)| {
            let throughput = throughput_for_device(throughput, id)
                .map(|e| e.total)
                .unwrap_or(0.0);
            let stats = BaselineStats {
                avg_utilization: mean_by(&readings, |r| r.sm_utilization),
                avg_memory_utilization: mean_by(&readings, |r| r.memory_utilization),
                avg_temperature: mean_by(&readings, |r| r.temperature),
                max_temperature: max_by(&readings, |r| r.temperature),
                avg_power: mean_by(&readings, |r| r.power),
                max_power: max_by(&readings, |r| r.power),
                avg_frame_buffer_util: mean_by(&readings, |r| r.frame_buffer_util_pct),
                throughput,
                sample_count: readings.len(),
            };
            tracing::info!(
                operation = "baseline",
                logical_id = id,
                avg_utilization = stats.avg_utilization,
                avg_temperature = stats.avg_temperature,
                avg_power = stats.avg_power,
                throughput,
                "device baseline"
            );
            (id, stats)
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct TickAggregate {
    power_sum: f64,
    temp_max: f64,
    temp_min: f64,
}

/// Stress-phase summary. Readings are first combined per timestamp (power summed,
/// temperature max/min across devices), then reduced over time. No valid records
/// gives the all-zero summary with `device_count == 0`.
pub fn stress(
    samples: &[TelemetrySample],
    baseline: &BTreeMap<u32, BaselineStats>,
    throughput: &[ThroughputEntry],
    stress_log_marker: &str,
    validator: &Validator,
) -> StressSummary {
    let readings: Vec<(DateTime<Utc>, &DeviceReading)> = samples
        .iter()
        .flat_map(|s| {
            s.devices
                .iter()
                .filter(move |r| validator.validate_device_reading(r))
                .map(move |r| (s.timestamp, r))
        })
        .collect();
    if readings.is_empty() {
        tracing::warn!(operation = "stress", "no valid device records");
        return StressSummary::default();
    }

    let mut per_tick: BTreeMap<DateTime<Utc>, TickAggregate> = BTreeMap::new();
    for (ts, r) in &readings {
        per_tick
            .entry(*ts)
            .and_modify(|i| {
                i.power_sum += r.power;
                i.temp_max = i.temp_max.max(r.temperature);
                i.temp_min = i.temp_min.min(r.temperature);
            })
            .or_insert(TickAggregate {
                power_sum: r.power,
                temp_max: r.temperature,
                temp_min: r.temperature,
            });
    }
    let ticks: Vec<TickAggregate> = per_tick.into_values().collect();
    let max_temperature = ticks.iter().map(|i| i.temp_max).fold(f64::NEG_INFINITY, f64::max);
    let min_temperature = ticks.iter().map(|i| i.temp_min).fold(f64::INFINITY, f64::min);
    let avg_total_power = mean_f64(&ticks.iter().map(|i| i.power_sum).collect::<Vec<_>>());

    let all: Vec<&DeviceReading> = readings.iter().map(|(_, r)| *r).collect();
    let full_stats = FullStats {
        total_samples: all.len(),
        max_temp_observed: max_by(&all, |r| r.temperature),
        data_available: true,
        avg_utilization: mean_by(&all, |r| r.sm_utilization),
        avg_power_per_device: mean_by(&all, |r| r.power),
    };

    let stress_log = throughput.iter().find(|e| e.name.contains(stress_log_marker));
    let distinct: BTreeSet<u32> = all.iter().map(|r| r.logical_id).collect();
    let (total_throughput, device_count) = match stress_log {
        Some(e) => (e.total, e.device_count),
        None => {
            tracing::warn!(
                operation = "stress",
                marker = stress_log_marker,
                "no stress throughput log; counting observed devices"
            );
            (0.0, distinct.len())
        }
    };

    let baseline_throughput_sum: f64 = baseline.values().map(|b| b.throughput).sum();
    let scaling_efficiency = if baseline_throughput_sum > 0.0 {
        total_throughput / baseline_throughput_sum
    } else {
        0.0
    };

    let summary = StressSummary {
        total_throughput,
        device_count,
        avg_total_power,
        max_temperature,
        temperature_spread: max_temperature - min_temperature,
        baseline_throughput_sum,
        scaling_efficiency,
        full_stats,
    };
    tracing::info!(
        operation = "stress",
        total_throughput,
        device_count,
        max_temperature,
        scaling_efficiency,
        "stress summary"
    );
    summary
}

fn valid_readings<'a>(
    samples: &'a [TelemetrySample],
    validator: &'a Validator,
) -> impl Iterator<Item = &'a DeviceReading> + 'a {
    samples
        .iter()
        .flat_map(|s| s.devices.iter())
        .filter(|r| validator.validate_device_reading(r))
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_by(readings: &[&DeviceReading], field: impl Fn(&DeviceReading) -> f64) -> f64 {
    mean_f64(&readings.iter().map(|&r| field(r)).collect::<Vec<_>>())
}

fn max_by(readings: &[&DeviceReading], field: impl Fn(&DeviceReading) -> f64) -> f64 {
    if readings.is_empty() {
        return 0.0;
    }
    readings
        .iter()
        .map(|&r| field(r))
        .fold(f64::NEG_INFINITY, f64::max)
}
