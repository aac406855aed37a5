// Line-oriented parsers for the telemetry tool's output. Lines that do not
// tokenize as expected are noise and are skipped.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::Utilization;

/// Physical-index detail row from the `--query-gpu` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DetailRow {
    pub temperature: f64,
    pub power: f64,
    pub used_mib: f64,
    pub total_mib: f64,
}

/// `index, uuid` rows, in output order.
pub(crate) fn parse_listing(output: &str) -> Vec<(u32, String)> {
    let mut out = Vec::new();
    for line in output.lines() {
        let mut parts = line.split(',').map(str::trim);
        let (Some(idx), Some(id)) = (parts.next(), parts.next()) else {
            continue;
        };
        match idx.parse::<u32>() {
            Ok(idx) if !id.is_empty() => out.push((idx, id.to_string())),
            _ => debug!(line, "skipping listing line"),
        }
    }
    out
}

/// `dmon -s u` output averaged per physical index over however many lines it printed.
pub(crate) fn parse_dmon(output: &str) -> BTreeMap<u32, Utilization> {
    let mut acc: BTreeMap<u32, (f64, f64, u32)> = BTreeMap::new();
    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 || tokens[0].starts_with('#') {
            continue;
        }
        let (Ok(idx), Ok(sm), Ok(mem)) = (
            tokens[0].parse::<u32>(),
            tokens[1].parse::<f64>(),
            tokens[2].parse::<f64>(),
        ) else {
            debug!(line, "skipping dmon line");
            continue;
        };
        let entry = acc.entry(idx).or_insert((0.0, 0.0, 0));
        entry.0 += sm;
        entry.1 += mem;
        entry.2 += 1;
    }
    acc.into_iter()
        .map(|(idx, (sm, mem, n))| {
            let n = f64::from(n.max(1));
            (
                idx,
                Utilization {
                    sm: sm / n,
                    mem: mem / n,
                    degraded: false,
                },
            )
        })
        .collect()
}

/// `index,temperature.gpu,power.draw,memory.used,memory.total` rows keyed by physical index.
/// Unavailable fields (`[N/A]` and friends) fall back to 0, or 1 for the total.
pub(crate) fn parse_details(output: &str) -> BTreeMap<u32, DetailRow> {
    let mut out = BTreeMap::new();
    for line in output.lines() {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < 5 {
            continue;
        }
        let Ok(idx) = parts[0].parse::<u32>() else {
            debug!(line, "skipping detail line");
            continue;
        };
        out.insert(
            idx,
            DetailRow {
                temperature: field(parts[1]).unwrap_or(0.0),
                power: field(parts[2]).unwrap_or(0.0),
                used_mib: field(parts[3]).unwrap_or(0.0),
                total_mib: field(parts[4]).unwrap_or(1.0),
            },
        );
    }
    out
}

fn field(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
