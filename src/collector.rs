// Collection loop: drives the sampler at a fixed interval until interrupted,
// then performs exactly one final flush.

use crate::buffer::StreamingBuffer;
use crate::config::{AppConfig, MonitoringConfig};
use crate::device_query::{DeviceQueryClient, QueryError, QueryRunner};
use crate::host_repo::HostRepo;
use crate::sampler::Sampler;
use crate::store::SampleSink;
use crate::validator::Validator;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Duration;

/// Startup failures. Nothing is collected or written when these occur.
#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("device discovery failed: {0}")]
    Discovery(#[from] QueryError),
    #[error("no devices discovered")]
    NoDevices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Interrupted,
    Stopped,
}

/// Cloneable handle that asks the loop to stop at its next tick boundary.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl InterruptHandle {
    /// Idempotent; later calls are no-ops.
    pub fn interrupt(&self) {
        let first = self.tx.send_if_modified(|flag| !std::mem::replace(flag, true));
        if first {
            tracing::info!("interrupt requested; stopping after current tick");
        }
    }

    pub fn is_interrupted(&self) -> bool {
        *self.tx.borrow()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub iterations: u64,
    pub total_samples: u64,
    pub flushes: u32,
    pub dropped_samples: u64,
    pub final_flush_ok: bool,
}

pub struct CollectionLoop<R: QueryRunner, S: SampleSink> {
    sampler: Sampler<R>,
    buffer: StreamingBuffer<S>,
    interval: Duration,
    progress_every: u64,
    state: LoopState,
    iteration: u64,
    final_flush_ok: bool,
    interrupt_tx: Arc<watch::Sender<bool>>,
    interrupt_rx: watch::Receiver<bool>,
}

impl<R: QueryRunner, S: SampleSink> CollectionLoop<R, S> {
    /// Discovers devices once and builds the loop. Fails when discovery fails, or
    /// when it finds no devices and `monitoring.allow_empty_devices` is off.
    pub async fn start(
        runner: R,
        sink: S,
        config: &AppConfig,
        visibility: Option<&str>,
    ) -> Result<Self, CollectionError> {
        let client = DeviceQueryClient::discover(runner, &config.device_query, visibility).await?;
        if client.identity().is_empty() {
            if !config.monitoring.allow_empty_devices {
                return Err(CollectionError::NoDevices);
            }
            tracing::warn!("no devices discovered; samples will carry host metrics only");
        }
        let sampler = Sampler::new(
            client,
            HostRepo::new(),
            Validator::new(config.validation.clone()),
        );
        Ok(Self::new(sampler, sink, &config.monitoring))
    }

    /// Loop over an already-built sampler.
    pub fn new(sampler: Sampler<R>, sink: S, monitoring: &MonitoringConfig) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            sampler,
            buffer: StreamingBuffer::new(sink, monitoring.max_samples, monitoring.save_interval),
            interval: Duration::from_millis(monitoring.interval_ms),
            progress_every: monitoring.save_interval.max(1),
            state: LoopState::Idle,
            iteration: 0,
            final_flush_ok: false,
            interrupt_tx: Arc::new(tx),
            interrupt_rx: rx,
        }
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            tx: self.interrupt_tx.clone(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn buffer(&self) -> &StreamingBuffer<S> {
        &self.buffer
    }

    /// Runs until interrupted. The interrupt flag is checked at tick boundaries;
    /// an in-flight query is bounded by its own timeout, while the inter-tick
    /// sleep is cut short. Finalizes exactly once, then reaches `Stopped`.
    #[tracing::instrument(name = "collection_loop", skip_all)]
    pub async fn run(&mut self) -> RunReport {
        if self.state != LoopState::Idle {
            tracing::warn!(state = ?self.state, "collection loop already ran");
            return self.report();
        }
        self.state = LoopState::Running;
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            device_ids = ?self.sampler.device_ids(),
            "collection started"
        );

        loop {
            if *self.interrupt_rx.borrow() {
                self.state = LoopState::Interrupted;
                break;
            }

            self.iteration += 1;
            let sample = self.sampler.collect(self.iteration).await;
            self.buffer.push(sample).await;

            if self.iteration % self.progress_every == 0 {
                tracing::info!(
                    iteration = self.iteration,
                    total_samples = self.buffer.total_samples(),
                    buffered = self.buffer.len(),
                    flushes = self.buffer.flush_count(),
                    "collection progress"
                );
            }

            let interval = self.interval;
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.interrupt_rx.wait_for(|interrupted| *interrupted) => {}
            }
        }

        self.final_flush_ok = match self.buffer.finalize().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(operation = "finalize", error = %e, "final flush failed");
                false
            }
        };
        self.state = LoopState::Stopped;
        let report = self.report();
        tracing::info!(
            iterations = report.iterations,
            total_samples = report.total_samples,
            flushes = report.flushes,
            dropped_samples = report.dropped_samples,
            final_flush_ok = report.final_flush_ok,
            "collection stopped"
        );
        report
    }

    fn report(&self) -> RunReport {
        RunReport {
            iterations: self.iteration,
            total_samples: self.buffer.total_samples(),
            flushes: self.buffer.flush_count(),
            dropped_samples: self.buffer.dropped_samples(),
            final_flush_ok: self.final_flush_ok,
        }
    }
}
