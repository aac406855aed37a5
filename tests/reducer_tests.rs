// Baseline/stress reduction and phase loading tests

mod common;

use common::*;
use gpumon::config::AnalysisConfig;
use gpumon::models::{BatchMetadata, StressSummary, TelemetryBatch};
use gpumon::reducer::{self, PhaseKind};
use gpumon::validator::Validator;
use std::path::Path;

#[test]
fn test_baseline_averages_and_throughput() {
    let samples = vec![
        sample(0, vec![reading(0, 90.0, 60.0, 300.0), reading(1, 10.0, 40.0, 80.0)]),
        sample(1, vec![reading(0, 92.0, 64.0, 310.0), reading(1, 12.0, 42.0, 90.0)]),
    ];
    let logs = vec![entry("gpu0_gpu_burn.log", 500.0, 1)];
    let stats = reducer::baseline(&samples, &logs, &Validator::default());

    assert_eq!(stats.len(), 2);
    let d0 = &stats[&0];
    assert_eq!(d0.avg_utilization, 91.0);
    assert_eq!(d0.avg_memory_utilization, 45.5);
    assert_eq!(d0.avg_temperature, 62.0);
    assert_eq!(d0.max_temperature, 64.0);
    assert_eq!(d0.max_power, 310.0);
    assert_eq!(d0.avg_frame_buffer_util, 25.0);
    assert_eq!(d0.throughput, 500.0);
    assert_eq!(d0.sample_count, 2);
    assert_eq!(stats[&1].avg_utilization, 11.0);
    assert_eq!(stats[&1].throughput, 0.0);
}

#[test]
fn test_baseline_throughput_needs_digit_boundary() {
    let samples = vec![sample(0, vec![reading(1, 50.0, 50.0, 100.0)])];
    let logs = vec![entry("gpu10_gpu_burn.log", 900.0, 1), entry("gpu1_gpu_burn.log", 400.0, 1)];
    let stats = reducer::baseline(&samples, &logs, &Validator::default());
    assert_eq!(stats[&1].throughput, 400.0);
}

#[test]
fn test_baseline_skips_invalid_readings() {
    let mut bad = reading(0, 50.0, 50.0, 100.0);
    bad.power = f64::NAN;
    let samples = vec![sample(0, vec![bad, reading(0, 70.0, 50.0, 100.0)])];
    let stats = reducer::baseline(&samples, &[], &Validator::default());
    assert_eq!(stats[&0].sample_count, 1);
    assert_eq!(stats[&0].avg_utilization, 70.0);
}

#[test]
fn test_empty_inputs() {
    let v = Validator::default();
    assert!(reducer::baseline(&[], &[], &v).is_empty());
    let summary = reducer::stress(&[], &Default::default(), &[], "all_gpu", &v);
    assert_eq!(summary, StressSummary::default());
    assert_eq!(summary.device_count, 0);
    assert!(!summary.full_stats.data_available);
}

#[test]
fn test_stress_combines_readings_per_timestamp() {
    let samples = vec![
        sample(0, vec![reading(0, 100.0, 70.0, 300.0), reading(1, 100.0, 60.0, 280.0)]),
        sample(1, vec![reading(0, 100.0, 80.0, 320.0), reading(1, 100.0, 66.0, 300.0)]),
    ];
    let s = reducer::stress(&samples, &Default::default(), &[], "all_gpu", &Validator::default());

    assert_eq!(s.avg_total_power, 600.0);
    assert_eq!(s.max_temperature, 80.0);
    assert_eq!(s.temperature_spread, 20.0);
    assert_eq!(s.device_count, 2);
    assert_eq!(s.total_throughput, 0.0);
    assert_eq!(s.full_stats.total_samples, 4);
    assert_eq!(s.full_stats.max_temp_observed, 80.0);
    assert_eq!(s.full_stats.avg_power_per_device, 300.0);
    assert!(s.full_stats.data_available);
}

#[test]
fn test_stress_readings_split_across_samples_share_a_tick() {
    let samples = vec![
        sample(0, vec![reading(0, 100.0, 70.0, 300.0)]),
        sample(0, vec![reading(1, 100.0, 60.0, 200.0)]),
    ];
    let s = reducer::stress(&samples, &Default::default(), &[], "all_gpu", &Validator::default());
    assert_eq!(s.avg_total_power, 500.0);
    assert_eq!(s.temperature_spread, 10.0);
}

#[test]
fn test_stress_scaling_efficiency() {
    let v = Validator::default();
    let baseline_samples = vec![
        sample(0, vec![reading(0, 99.0, 60.0, 300.0)]),
        sample(1, vec![reading(1, 99.0, 60.0, 300.0)]),
    ];
    let baseline_logs = vec![entry("gpu0_gpu_burn.log", 500.0, 1), entry("gpu1_gpu_burn.log", 500.0, 1)];
    let baseline = reducer::baseline(&baseline_samples, &baseline_logs, &v);

    let stress_samples = vec![sample(0, vec![reading(0, 99.0, 70.0, 300.0), reading(1, 99.0, 72.0, 300.0)])];
    let stress_logs = vec![entry("all_gpu_burn.log", 900.0, 4)];
    let s = reducer::stress(&stress_samples, &baseline, &stress_logs, "all_gpu", &v);

    assert_eq!(s.total_throughput, 900.0);
    assert_eq!(s.device_count, 4);
    assert_eq!(s.baseline_throughput_sum, 1000.0);
    assert_eq!(s.scaling_efficiency, 0.9);
}

#[test]
fn test_hostname_validation() {
    assert!(reducer::is_valid_hostname("node-01"));
    assert!(reducer::is_valid_hostname("gpu.cluster.example"));
    assert!(reducer::is_valid_hostname("10.0.0.12"));
    assert!(!reducer::is_valid_hostname(""));
    assert!(!reducer::is_valid_hostname("-bad"));
    assert!(!reducer::is_valid_hostname("../etc"));
    assert!(!reducer::is_valid_hostname("has space"));
}

fn batch_json(samples: Vec<gpumon::models::TelemetrySample>) -> String {
    let batch = TelemetryBatch {
        metadata: BatchMetadata {
            total_samples: samples.len() as u64,
            batch_samples: samples.len(),
            collection_start: None,
            collection_end: None,
            is_final: true,
            segment: 1,
            data_collection_version: String::new(),
        },
        samples,
    };
    serde_json::to_string(&batch).unwrap()
}

fn write_host(root: &Path, host: &str) {
    let baseline = root.join(host).join("phase1_single_gpu");
    let stress = root.join(host).join("phase2_all_gpu");
    std::fs::create_dir_all(&baseline).unwrap();
    std::fs::create_dir_all(&stress).unwrap();

    // The gpu0 run also recorded gpu1 idling; only gpu0 counts.
    std::fs::write(
        baseline.join("gpu0_monitor_run.json"),
        batch_json(vec![
            sample(0, vec![reading(0, 90.0, 60.0, 300.0), reading(1, 0.0, 30.0, 50.0)]),
            sample(1, vec![reading(0, 92.0, 62.0, 300.0), reading(1, 0.0, 30.0, 50.0)]),
        ]),
    )
    .unwrap();
    std::fs::write(
        baseline.join("gpu1_monitor_run.json"),
        serde_json::to_string(&vec![sample(2, vec![reading(1, 80.0, 55.0, 250.0)])]).unwrap(),
    )
    .unwrap();
    std::fs::write(baseline.join("notes.json"), "{}").unwrap();
    std::fs::write(baseline.join("gpu0_gpu_burn.log"), "10.0%  proc'd: 1 (480 Gflop/s)\n100.0%  proc'd: 9 (500 Gflop/s)\n").unwrap();
    std::fs::write(baseline.join("gpu1_gpu_burn.log"), "100.0%  proc'd: 9 (450 Gflop/s)\n").unwrap();

    std::fs::write(
        stress.join("all_monitor.json"),
        batch_json(vec![sample(10, vec![reading(0, 100.0, 75.0, 320.0), reading(1, 100.0, 70.0, 300.0)])]),
    )
    .unwrap();
    std::fs::write(stress.join("broken.json"), "{not json").unwrap();
    std::fs::write(
        stress.join("all_gpu_burn.log"),
        "100.0%  proc'd: 9 (470 Gflop/s) - 9 (460 Gflop/s)\n",
    )
    .unwrap();
}

#[test]
fn test_load_baseline_phase_keeps_only_named_device() {
    let dir = tempfile::TempDir::new().unwrap();
    write_host(dir.path(), "node-a");
    let data = reducer::load_phase(
        &dir.path().join("node-a/phase1_single_gpu"),
        PhaseKind::Baseline,
        &AnalysisConfig::default(),
        &Validator::default(),
    )
    .unwrap();

    assert_eq!(data.samples.len(), 3);
    assert!(data.samples[..2].iter().all(|s| s.devices.len() == 1 && s.devices[0].logical_id == 0));
    assert_eq!(data.samples[2].devices[0].logical_id, 1);
    let names: Vec<&str> = data.throughput.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["gpu0_gpu_burn.log", "gpu1_gpu_burn.log"]);
    assert_eq!(data.throughput[0].total, 500.0);
}

#[test]
fn test_load_phase_missing_dir_is_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let result = reducer::load_phase(
        &dir.path().join("absent"),
        PhaseKind::Stress,
        &AnalysisConfig::default(),
        &Validator::default(),
    );
    assert!(result.is_err());
}

#[test]
fn test_analyze_host_end_to_end() {
    let dir = tempfile::TempDir::new().unwrap();
    write_host(dir.path(), "node-a");
    let report = reducer::analyze_host(
        dir.path(),
        "node-a",
        &AnalysisConfig::default(),
        &Validator::default(),
    )
    .unwrap();

    assert_eq!(report.host, "node-a");
    assert_eq!(report.baseline[&0].avg_utilization, 91.0);
    assert_eq!(report.baseline[&0].throughput, 500.0);
    assert_eq!(report.baseline[&1].throughput, 450.0);
    assert_eq!(report.stress.total_throughput, 930.0);
    assert_eq!(report.stress.device_count, 2);
    assert_eq!(report.stress.avg_total_power, 620.0);
    assert_eq!(report.stress.temperature_spread, 5.0);
    assert_eq!(report.stress.baseline_throughput_sum, 950.0);
}

#[test]
fn test_analyze_host_without_telemetry_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("node-b/phase1_single_gpu")).unwrap();
    std::fs::create_dir_all(dir.path().join("node-b/phase2_all_gpu")).unwrap();
    let result = reducer::analyze_host(
        dir.path(),
        "node-b",
        &AnalysisConfig::default(),
        &Validator::default(),
    );
    assert!(result.is_err());
}

#[test]
fn test_discover_hosts() {
    let dir = tempfile::TempDir::new().unwrap();
    for host in ["node-b", "node-a", "10.0.0.5"] {
        std::fs::create_dir_all(dir.path().join(host)).unwrap();
    }
    std::fs::write(dir.path().join("README"), "").unwrap();

    let all = reducer::discover_hosts(dir.path(), &[]).unwrap();
    assert_eq!(all, vec!["10.0.0.5", "node-a", "node-b"]);

    let filter = vec!["node-b".to_string(), "bad host".to_string(), "node-z".to_string()];
    assert_eq!(reducer::discover_hosts(dir.path(), &filter).unwrap(), vec!["node-b"]);

    assert!(reducer::discover_hosts(dir.path(), &["bad host".to_string()]).is_err());
    assert!(reducer::discover_hosts(dir.path(), &["node-z".to_string()]).is_err());
}

#[test]
fn test_discover_hosts_empty_root() {
    let dir = tempfile::TempDir::new().unwrap();
    assert!(reducer::discover_hosts(dir.path(), &[]).is_err());
}
