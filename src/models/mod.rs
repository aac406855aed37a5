// Domain models: device readings, host snapshots, samples, persisted batches, summaries

mod device;
mod host;
mod sample;
mod summary;

pub use device::{DeviceReading, Utilization};
pub use host::HostSnapshot;
pub use sample::{BatchMetadata, TelemetryBatch, TelemetrySample};
pub use summary::{BaselineStats, FullStats, HostReport, StressSummary, ThroughputEntry};
