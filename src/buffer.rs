// Bounded in-memory sample buffer with periodic flush to a sink.

use crate::models::{BatchMetadata, TelemetryBatch, TelemetrySample};
use crate::store::SampleSink;
use crate::version;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Holds at most `max_samples` samples between flushes.
///
/// A flush is due when the buffer is full or when the running total reaches a
/// multiple of `save_interval`. A failed flush keeps the batch; if the buffer is
/// still full at the next push the oldest sample is dropped and counted.
pub struct StreamingBuffer<S: SampleSink> {
    sink: S,
    samples: VecDeque<TelemetrySample>,
    max_samples: usize,
    save_interval: u64,
    total_samples: u64,
    flushes: u32,
    dropped: u64,
    due: bool,
    finalized: bool,
    last_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl<S: SampleSink> StreamingBuffer<S> {
    pub fn new(sink: S, max_samples: usize, save_interval: u64) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            sink,
            samples: VecDeque::with_capacity(max_samples.min(4096)),
            max_samples,
            save_interval: save_interval.max(1),
            total_samples: 0,
            flushes: 0,
            dropped: 0,
            due: false,
            finalized: false,
            last_window: None,
        }
    }

    /// Appends a sample, flushing first or after as the bound and interval require.
    pub async fn push(&mut self, sample: TelemetrySample) {
        if self.samples.len() >= self.max_samples {
            self.due = true;
            self.flush_if_due().await;
            if self.samples.len() >= self.max_samples {
                self.samples.pop_front();
                self.dropped += 1;
                tracing::warn!(
                    operation = "buffer_push",
                    max_samples = self.max_samples,
                    dropped_total = self.dropped,
                    "buffer full after failed flush; dropped oldest sample"
                );
            }
        }

        self.samples.push_back(sample);
        self.total_samples += 1;
        if self.samples.len() >= self.max_samples || self.total_samples % self.save_interval == 0 {
            self.due = true;
        }
        self.flush_if_due().await;
    }

    /// Writes the buffered batch if a flush is pending. True when a batch was written.
    pub async fn flush_if_due(&mut self) -> bool {
        if !self.due {
            return false;
        }
        if self.samples.is_empty() {
            self.due = false;
            return false;
        }
        match self.write(false).await {
            Ok(()) => {
                self.due = false;
                true
            }
            Err(e) => {
                tracing::warn!(
                    operation = "flush",
                    error = %e,
                    buffered = self.samples.len(),
                    "flush failed; keeping batch for next attempt"
                );
                false
            }
        }
    }

    /// Copy of the buffered samples in push order. Does not clear.
    pub fn drain(&self) -> Vec<TelemetrySample> {
        self.samples.iter().cloned().collect()
    }

    /// Forces the final flush. Always writes one segment with `is_final = true`,
    /// even when the buffer is empty. Calling it again after success is a no-op.
    pub async fn finalize(&mut self) -> anyhow::Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.write(true).await?;
        self.finalized = true;
        self.due = false;
        tracing::info!(
            operation = "finalize",
            total_samples = self.total_samples,
            flushes = self.flushes,
            dropped_samples = self.dropped,
            "final flush written"
        );
        Ok(())
    }

    /// Moves the buffered samples into a batch; they come back if the sink fails.
    async fn write(&mut self, is_final: bool) -> anyhow::Result<()> {
        let samples: Vec<TelemetrySample> = std::mem::take(&mut self.samples).into();
        let window = samples
            .first()
            .zip(samples.last())
            .map(|(a, b)| (a.timestamp, b.timestamp));
        let segment = self.flushes + 1;
        let batch = TelemetryBatch {
            metadata: BatchMetadata {
                total_samples: self.total_samples,
                batch_samples: samples.len(),
                collection_start: window.map(|w| w.0),
                collection_end: window.map(|w| w.1),
                is_final,
                segment,
                data_collection_version: version::data_collection_version(),
            },
            samples,
        };
        if let Err(e) = self.sink.write_batch(&batch).await {
            self.samples = batch.samples.into();
            return Err(e);
        }

        self.flushes = segment;
        if window.is_some() {
            self.last_window = window;
        }
        tracing::debug!(
            operation = "flush",
            segment,
            batch_samples = batch.metadata.batch_samples,
            total_samples = self.total_samples,
            is_final,
            "batch flushed"
        );
        Ok(())
    }

    /// Samples pushed since creation, across all flushes.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Segments written so far, including the final one.
    pub fn flush_count(&self) -> u32 {
        self.flushes
    }

    pub fn dropped_samples(&self) -> u64 {
        self.dropped
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// First and last timestamp of the most recent non-empty flush.
    pub fn last_flush_window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.last_window
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: SampleSink> Drop for StreamingBuffer<S> {
    fn drop(&mut self) {
        if !self.finalized && !self.samples.is_empty() {
            tracing::warn!(
                operation = "finalize",
                buffered = self.samples.len(),
                "buffer dropped before final flush; buffered samples not persisted"
            );
        }
    }
}
