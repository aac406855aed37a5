// Collection loop lifecycle tests

mod common;

use common::*;
use gpumon::collector::{CollectionError, CollectionLoop, LoopState};
use gpumon::config::AppConfig;
use gpumon::device_query::{DeviceIdentityMap, DeviceQueryClient};
use gpumon::host_repo::HostRepo;
use gpumon::sampler::Sampler;
use gpumon::validator::Validator;
use std::time::Duration;

const DMON: &str = "    0    90    40     0     0\n    1    50    20     0     0\n";
const DETAILS: &str = "0, 65, 300, 1024, 4096\n1, 70, 250, 2048, 4096\n";

fn app_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.monitoring.interval_ms = 10;
    config.monitoring.save_interval = 5;
    config.monitoring.max_samples = 50;
    config.device_query.retry_delay_ms = 1;
    config
}

fn runner() -> FakeRunner {
    FakeRunner::new()
        .answer(Call::Listing, LISTING)
        .answer(Call::Utilization, DMON)
        .answer(Call::Details, DETAILS)
}

fn build_loop(
    runner: FakeRunner,
    sink: MemorySink,
    proc_root: &std::path::Path,
) -> CollectionLoop<FakeRunner, MemorySink> {
    let config = app_config();
    let client = DeviceQueryClient::new(
        runner,
        &config.device_query,
        DeviceIdentityMap::identity([0, 1]),
    );
    let sampler = Sampler::new(client, HostRepo::with_proc_root(proc_root), Validator::default());
    CollectionLoop::new(sampler, sink, &config.monitoring)
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_stops_with_single_final_flush() {
    let dir = tempfile::TempDir::new().unwrap();
    let sink = MemorySink::new();
    let mut collection = build_loop(runner(), sink.clone(), dir.path());
    assert_eq!(collection.state(), LoopState::Idle);

    let handle = collection.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(95)).await;
        handle.interrupt();
    });
    let report = collection.run().await;

    // Ticks at 0, 10, ..., 90 ms; the interrupt cuts the sleep after the tenth.
    assert_eq!(collection.state(), LoopState::Stopped);
    assert_eq!(report.iterations, 10);
    assert_eq!(report.total_samples, report.iterations);
    assert!(report.final_flush_ok);
    assert_eq!(sink.final_batches(), 1);
    assert_eq!(sink.persisted_samples() as u64, report.total_samples);
    assert_eq!(report.flushes as usize, sink.batches().len());

    let last = sink.batches().pop().unwrap();
    assert!(last.metadata.is_final);
    assert_eq!(last.metadata.total_samples, report.total_samples);
}

#[tokio::test(start_paused = true)]
async fn test_samples_carry_merged_device_readings() {
    let dir = tempfile::TempDir::new().unwrap();
    let sink = MemorySink::new();
    let mut collection = build_loop(runner(), sink.clone(), dir.path());

    let handle = collection.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.interrupt();
    });
    collection.run().await;

    let batches = sink.batches();
    let first = &batches[0].samples[0];
    assert_eq!(first.iteration, 1);
    assert_eq!(first.devices.len(), 2);
    let d0 = &first.devices[0];
    assert_eq!(d0.logical_id, 0);
    assert_eq!(d0.sm_utilization, 90.0);
    assert_eq!(d0.temperature, 65.0);
    assert_eq!(d0.frame_buffer_util_pct, 25.0);
    assert!(!d0.degraded);
}

#[tokio::test(start_paused = true)]
async fn test_failed_queries_produce_degraded_samples() {
    let dir = tempfile::TempDir::new().unwrap();
    let sink = MemorySink::new();
    let failing = FakeRunner::new().answer(Call::Details, DETAILS);
    let mut collection = build_loop(failing, sink.clone(), dir.path());

    let handle = collection.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        handle.interrupt();
    });
    collection.run().await;

    let sample = &sink.batches()[0].samples[0];
    assert_eq!(sample.devices.len(), 2);
    assert!(sample.devices.iter().all(|d| d.degraded && d.sm_utilization == 0.0));
    assert_eq!(sample.devices[1].temperature, 70.0);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_before_run_still_writes_final_segment() {
    let dir = tempfile::TempDir::new().unwrap();
    let sink = MemorySink::new();
    let mut collection = build_loop(runner(), sink.clone(), dir.path());

    let handle = collection.interrupt_handle();
    handle.interrupt();
    handle.interrupt();
    assert!(handle.is_interrupted());

    let report = collection.run().await;
    assert_eq!(report.iterations, 0);
    assert_eq!(report.flushes, 1);
    assert_eq!(sink.final_batches(), 1);
    assert!(sink.batches()[0].samples.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_second_run_does_not_flush_again() {
    let dir = tempfile::TempDir::new().unwrap();
    let sink = MemorySink::new();
    let mut collection = build_loop(runner(), sink.clone(), dir.path());
    collection.interrupt_handle().interrupt();

    let first = collection.run().await;
    let second = collection.run().await;
    assert_eq!(first, second);
    assert_eq!(sink.final_batches(), 1);
    assert_eq!(collection.state(), LoopState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_flushes_during_run() {
    let dir = tempfile::TempDir::new().unwrap();
    let sink = MemorySink::new();
    let mut collection = build_loop(runner(), sink.clone(), dir.path());

    let handle = collection.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(125)).await;
        handle.interrupt();
    });
    let report = collection.run().await;

    assert_eq!(report.iterations, 13);
    let batches = sink.batches();
    let totals: Vec<u64> = batches.iter().map(|b| b.metadata.total_samples).collect();
    assert_eq!(totals, vec![5, 10, 13]);
    assert_eq!(batches[2].samples.len(), 3);
    assert!(batches[2].metadata.is_final);
    assert!(collection.buffer().is_empty());
}

#[tokio::test]
async fn test_start_discovers_devices() {
    let config = app_config();
    let collection = CollectionLoop::start(runner(), MemorySink::new(), &config, Some("1,3"))
        .await
        .unwrap();
    assert_eq!(collection.state(), LoopState::Idle);
    assert_eq!(collection.buffer().total_samples(), 0);
}

#[tokio::test]
async fn test_start_without_devices_fails() {
    let config = app_config();
    let sink = MemorySink::new();
    let result = CollectionLoop::start(runner(), sink.clone(), &config, Some("")).await;
    assert!(matches!(result, Err(CollectionError::NoDevices)));
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn test_start_without_devices_allowed() {
    let mut config = app_config();
    config.monitoring.allow_empty_devices = true;
    let sink = MemorySink::new();
    let mut collection = CollectionLoop::start(runner(), sink.clone(), &config, Some(""))
        .await
        .unwrap();
    collection.interrupt_handle().interrupt();
    let report = collection.run().await;
    assert!(report.final_flush_ok);
    assert_eq!(sink.final_batches(), 1);
}

#[tokio::test]
async fn test_start_propagates_discovery_failure() {
    let config = app_config();
    let result =
        CollectionLoop::start(FakeRunner::new(), MemorySink::new(), &config, None).await;
    assert!(matches!(result, Err(CollectionError::Discovery(_))));
}
