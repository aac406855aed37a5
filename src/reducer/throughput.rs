// Benchmark throughput logs: `... (12345 Gflop/s) ... (12001 Gflop/s)`

use crate::models::ThroughputEntry;
use regex::Regex;
use std::sync::LazyLock;

static THROUGHPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+(?:\.\d+)?)\s+([A-Za-z]+)/s\)").expect("valid regex"));

const TERMINATION_MARKERS: [(&str, &str); 2] = [
    ("Killing processes with SIGTERM", "benchmark was terminated"),
    ("Killing processes with SIGKILL", "benchmark was force killed"),
];

/// Parses one log. Only the last line carrying throughput figures counts; its
/// values are summed (one per device on multi-device runs). `None` when no
/// line has a figure or the sum is not positive.
pub fn parse_throughput_log(name: &str, content: &str) -> Option<ThroughputEntry> {
    for (marker, message) in TERMINATION_MARKERS {
        if content.contains(marker) {
            tracing::warn!(log = name, "{}", message);
        }
    }

    let line = content
        .lines()
        .rev()
        .find(|line| THROUGHPUT.is_match(line));
    let Some(line) = line else {
        tracing::warn!(log = name, "no throughput figures found");
        return None;
    };

    let mut total = 0.0;
    let mut device_count = 0;
    let mut unit = String::new();
    for caps in THROUGHPUT.captures_iter(line) {
        let Ok(value) = caps[1].parse::<f64>() else {
            continue;
        };
        if unit.is_empty() {
            unit = caps[2].to_string();
        }
        total += value;
        device_count += 1;
    }

    if total <= 0.0 {
        tracing::warn!(log = name, "throughput sum is not positive; ignoring log");
        return None;
    }
    tracing::info!(log = name, total, unit = %unit, device_count, "throughput parsed");
    Some(ThroughputEntry {
        name: name.to_string(),
        total,
        unit,
        device_count,
    })
}

/// True when `name` contains `gpu<id>` not followed by another digit.
pub fn names_device(name: &str, logical_id: u32) -> bool {
    let needle = format!("gpu{}", logical_id);
    name.match_indices(&needle).any(|(at, _)| {
        !name[at + needle.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

/// First entry, in the given order, whose name refers to `logical_id`.
pub fn throughput_for_device(entries: &[ThroughputEntry], logical_id: u32) -> Option<&ThroughputEntry> {
    entries.iter().find(|e| names_device(&e.name, logical_id))
}
