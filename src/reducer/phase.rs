// Reading one host's phase directories from disk.

use super::throughput::parse_throughput_log;
use crate::config::AnalysisConfig;
use crate::models::{HostReport, TelemetrySample, ThroughputEntry};
use crate::validator::Validator;
use anyhow::Context;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static BASELINE_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^gpu(\d+)_").expect("valid regex"));
static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").expect("valid regex"));
static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    /// One device benchmarked at a time; each telemetry file is named after its device.
    Baseline,
    /// All devices at once.
    Stress,
}

#[derive(Debug, Clone, Default)]
pub struct PhaseData {
    pub samples: Vec<TelemetrySample>,
    /// In lexical file-name order.
    pub throughput: Vec<ThroughputEntry>,
}

/// Loads the telemetry files and throughput logs of one phase directory.
/// Unreadable or invalid files are skipped with a warning; a missing directory is an error.
pub fn load_phase(
    dir: &Path,
    kind: PhaseKind,
    config: &AnalysisConfig,
    validator: &Validator,
) -> anyhow::Result<PhaseData> {
    anyhow::ensure!(dir.is_dir(), "phase directory not found: {}", dir.display());
    let files = sorted_files(dir)?;
    let mut data = PhaseData::default();

    for path in &files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                let target = match kind {
                    PhaseKind::Baseline => match baseline_device(name) {
                        Some(id) => Some(id),
                        None => continue,
                    },
                    PhaseKind::Stress => None,
                };
                match load_samples(path, target, validator) {
                    Ok(samples) => {
                        tracing::info!(file = name, samples = samples.len(), "telemetry loaded");
                        data.samples.extend(samples);
                    }
                    Err(e) => tracing::warn!(file = name, error = %e, "skipping telemetry file"),
                }
            }
            Some("log") if name.contains(&config.throughput_log_marker) => {
                match std::fs::read_to_string(path) {
                    Ok(content) => data.throughput.extend(parse_throughput_log(name, &content)),
                    Err(e) => tracing::warn!(file = name, error = %e, "skipping throughput log"),
                }
            }
            _ => {}
        }
    }

    tracing::info!(
        dir = %dir.display(),
        ?kind,
        samples = data.samples.len(),
        throughput_logs = data.throughput.len(),
        "phase loaded"
    );
    Ok(data)
}

/// `gpu<N>_..._monitor_...json` names the device it was recorded for.
fn baseline_device(name: &str) -> Option<u32> {
    if !name.contains("_monitor_") {
        return None;
    }
    BASELINE_FILE.captures(name)?[1].parse().ok()
}

fn load_samples(
    path: &Path,
    target: Option<u32>,
    validator: &Validator,
) -> anyhow::Result<Vec<TelemetrySample>> {
    let content = std::fs::read_to_string(path)?;
    let doc: Value = serde_json::from_str(&content)?;
    let records = match doc {
        Value::Array(records) => records,
        Value::Object(mut obj) => match obj.remove("samples") {
            Some(Value::Array(records)) => records,
            _ => anyhow::bail!("document has no samples array"),
        },
        _ => anyhow::bail!("document is neither a batch nor a sample array"),
    };
    anyhow::ensure!(
        validator.validate_sample_batch(&records),
        "batch failed schema check"
    );

    let mut samples = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let mut sample: TelemetrySample = match serde_json::from_value(record) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(file = %path.display(), index, error = %e, "skipping malformed sample");
                continue;
            }
        };
        if let Some(id) = target {
            sample.devices.retain(|d| d.logical_id == id);
            if sample.devices.is_empty() {
                continue;
            }
        }
        samples.push(sample);
    }
    Ok(samples)
}

fn sorted_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("read dir {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

pub fn is_valid_hostname(name: &str) -> bool {
    !name.is_empty() && name.len() <= 253 && (IPV4.is_match(name) || HOSTNAME.is_match(name))
}

/// Host subdirectories of `root` in lexical order, restricted to `filter` when it is
/// non-empty. Filter entries that are not valid host names are ignored; names that
/// do not exist under `root` are reported.
pub fn discover_hosts(root: &Path, filter: &[String]) -> anyhow::Result<Vec<String>> {
    let mut hosts: Vec<String> = std::fs::read_dir(root)
        .with_context(|| format!("read input dir {}", root.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    hosts.sort();
    anyhow::ensure!(!hosts.is_empty(), "no host directories under {}", root.display());

    if filter.is_empty() {
        tracing::info!(hosts = ?hosts, "hosts discovered");
        return Ok(hosts);
    }

    let mut wanted = BTreeSet::new();
    for name in filter {
        if is_valid_hostname(name) {
            wanted.insert(name.as_str());
        } else {
            tracing::warn!(host = %name, "invalid host name in filter; ignoring");
        }
    }
    anyhow::ensure!(!wanted.is_empty(), "host filter has no valid names");

    let missing: Vec<&str> = wanted
        .iter()
        .copied()
        .filter(|w| !hosts.iter().any(|h| h == w))
        .collect();
    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "requested hosts not found");
    }
    hosts.retain(|h| wanted.contains(h.as_str()));
    anyhow::ensure!(!hosts.is_empty(), "no hosts left after filtering");
    tracing::info!(hosts = ?hosts, "hosts selected");
    Ok(hosts)
}

/// Loads both phases of `root/host` and reduces them.
#[tracing::instrument(skip(root, config, validator), fields(operation = "analyze_host"))]
pub fn analyze_host(
    root: &Path,
    host: &str,
    config: &AnalysisConfig,
    validator: &Validator,
) -> anyhow::Result<HostReport> {
    let host_dir = root.join(host);
    let baseline_phase = load_phase(
        &host_dir.join(&config.baseline_dir),
        PhaseKind::Baseline,
        config,
        validator,
    )?;
    let stress_phase = load_phase(
        &host_dir.join(&config.stress_dir),
        PhaseKind::Stress,
        config,
        validator,
    )?;
    anyhow::ensure!(
        !baseline_phase.samples.is_empty() || !stress_phase.samples.is_empty(),
        "no telemetry found for host {}",
        host
    );

    let baseline = super::baseline(&baseline_phase.samples, &baseline_phase.throughput, validator);
    let stress = super::stress(
        &stress_phase.samples,
        &baseline,
        &stress_phase.throughput,
        &config.stress_log_marker,
        validator,
    );
    Ok(HostReport {
        host: host.to_string(),
        baseline,
        stress,
    })
}
