// Persistence of flushed telemetry batches.

use crate::models::TelemetryBatch;
use anyhow::Context;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Destination for flushed batches. Called from the collection loop only.
pub trait SampleSink: Send {
    fn write_batch(
        &mut self,
        batch: &TelemetryBatch,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Writes each batch as its own JSON document next to `output_path`:
/// `data/gpu_monitor.json` becomes `data/gpu_monitor.0001.json`, `.0002.json`, ...
#[derive(Debug, Clone)]
pub struct JsonSegmentStore {
    dir: PathBuf,
    stem: String,
}

impl JsonSegmentStore {
    pub fn new(output_path: impl AsRef<Path>) -> Self {
        let path = output_path.as_ref();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "telemetry".into());
        Self { dir, stem }
    }

    pub fn segment_path(&self, segment: u32) -> PathBuf {
        self.dir.join(format!("{}.{:04}.json", self.stem, segment))
    }
}

impl SampleSink for JsonSegmentStore {
    async fn write_batch(&mut self, batch: &TelemetryBatch) -> anyhow::Result<()> {
        let body = serde_json::to_vec_pretty(batch)?;
        let dir = self.dir.clone();
        let path = self.segment_path(batch.metadata.segment);
        let written = path.clone();
        tokio::task::spawn_blocking(move || write_segment(&dir, &path, &body))
            .await
            .context("segment writer task failed")??;
        tracing::debug!(
            operation = "write_batch",
            path = %written.display(),
            samples = batch.samples.len(),
            is_final = batch.metadata.is_final,
            "segment written"
        );
        Ok(())
    }
}

/// Writes to `<segment>.json.tmp`, then renames into place.
fn write_segment(dir: &Path, path: &Path, body: &[u8]) -> anyhow::Result<()> {
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir {}", dir.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("rename to {}", path.display()))?;
    Ok(())
}
