// Shared test helpers
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use gpumon::device_query::{QueryError, QueryRunner};
use gpumon::models::*;
use gpumon::store::SampleSink;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LISTING: &str = "0, GPU-aaaa-0000\n1, GPU-bbbb-1111\n2, GPU-cccc-2222\n3, GPU-dddd-3333\n";

/// Which tool call an argument list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Listing,
    Utilization,
    Details,
}

impl Call {
    fn classify(args: &[String]) -> Call {
        match args.first().map(String::as_str) {
            Some("dmon") => Call::Utilization,
            Some(a) if a.starts_with("--query-gpu=index,uuid") => Call::Listing,
            _ => Call::Details,
        }
    }
}

type Response = Result<String, QueryError>;

#[derive(Default)]
struct Script {
    queued: HashMap<Call, VecDeque<Response>>,
    fallback: HashMap<Call, String>,
    calls: Vec<(Call, Vec<String>)>,
}

/// Scripted stand-in for the external telemetry tool. Queued responses are used
/// first, then the per-call fallback; a call with neither fails with a timeout.
#[derive(Clone, Default)]
pub struct FakeRunner {
    script: Arc<Mutex<Script>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answers `call` with `output`.
    pub fn answer(self, call: Call, output: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .fallback
            .insert(call, output.to_string());
        self
    }

    /// Answers the next `call` with `response`, before any fallback.
    pub fn queue(self, call: Call, response: Response) -> Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(call)
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self, call: Call) -> Vec<Vec<String>> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(c, _)| *c == call)
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn call_count(&self, call: Call) -> usize {
        self.calls(call).len()
    }

    fn respond(&self, args: &[String]) -> Response {
        let call = Call::classify(args);
        let mut script = self.script.lock().unwrap();
        script.calls.push((call, args.to_vec()));
        if let Some(r) = script.queued.get_mut(&call).and_then(VecDeque::pop_front) {
            return r;
        }
        match script.fallback.get(&call) {
            Some(out) => Ok(out.clone()),
            None => Err(timeout()),
        }
    }
}

impl QueryRunner for FakeRunner {
    fn run(&self, args: &[String], _timeout: Duration) -> impl Future<Output = Response> + Send {
        let response = self.respond(args);
        async move { response }
    }
}

pub fn timeout() -> QueryError {
    QueryError::Timeout {
        program: "fake-smi".into(),
        timeout_ms: 10,
    }
}

/// In-memory sink recording every batch; can be told to fail.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub batches: Arc<Mutex<Vec<TelemetryBatch>>>,
    pub fail: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }

    pub fn batches(&self) -> Vec<TelemetryBatch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn final_batches(&self) -> usize {
        self.batches().iter().filter(|b| b.metadata.is_final).count()
    }

    pub fn persisted_samples(&self) -> usize {
        self.batches().iter().map(|b| b.samples.len()).sum()
    }
}

impl SampleSink for MemorySink {
    async fn write_batch(&mut self, batch: &TelemetryBatch) -> anyhow::Result<()> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("sink unavailable");
        }
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn reading(id: u32, sm: f64, temperature: f64, power: f64) -> DeviceReading {
    DeviceReading::new(
        id,
        Utilization {
            sm,
            mem: sm / 2.0,
            degraded: false,
        },
        temperature,
        power,
        1024.0,
        4096.0,
    )
}

pub fn sample(secs: i64, devices: Vec<DeviceReading>) -> TelemetrySample {
    TelemetrySample {
        timestamp: ts(secs),
        iteration: secs as u64,
        devices,
        host: HostSnapshot::default(),
    }
}

pub fn entry(name: &str, total: f64, device_count: usize) -> ThroughputEntry {
    ThroughputEntry {
        name: name.to_string(),
        total,
        unit: "Gflop".into(),
        device_count,
    }
}
