// Telemetry sample and the persisted batch envelope

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{DeviceReading, HostSnapshot};

/// One tick of telemetry. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub iteration: u64,
    #[serde(alias = "gpus")]
    pub devices: Vec<DeviceReading>,
    #[serde(default, alias = "system_basic")]
    pub host: HostSnapshot,
}

/// Metadata written with every flushed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    /// Samples pushed since the run started, across all flushes.
    pub total_samples: u64,
    #[serde(default)]
    pub batch_samples: usize,
    pub collection_start: Option<DateTime<Utc>>,
    pub collection_end: Option<DateTime<Utc>>,
    pub is_final: bool,
    #[serde(default)]
    pub segment: u32,
    #[serde(default)]
    pub data_collection_version: String,
}

/// One persisted JSON document: `{metadata, samples}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryBatch {
    pub metadata: BatchMetadata,
    pub samples: Vec<TelemetrySample>,
}

/// Accepts RFC 3339 or a naive ISO-8601 timestamp (taken as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}
