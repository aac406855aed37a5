use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitoring: MonitoringConfig,
    pub device_query: DeviceQueryConfig,
    pub validation: ValidationConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub interval_ms: u64,
    /// Flush every N pushed samples (also the progress log cadence).
    pub save_interval: u64,
    /// Upper bound on samples held in memory between flushes.
    pub max_samples: usize,
    /// Segments are written next to this path as `<stem>.NNNN.json`.
    pub output_path: String,
    /// Keep running with empty device lists when discovery finds nothing.
    pub allow_empty_devices: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            save_interval: 30,
            max_samples: 1000,
            output_path: "data/gpu_monitor.json".into(),
            allow_empty_devices: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceQueryConfig {
    pub command: String,
    /// Environment variable holding the device-visibility list.
    pub visibility_env: String,
    pub utilization_timeout_secs: u64,
    pub detail_timeout_secs: u64,
    /// Attempts per call, including the first.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Lines requested from `dmon` per utilization query.
    pub dmon_samples: u32,
}

impl Default for DeviceQueryConfig {
    fn default() -> Self {
        Self {
            command: "nvidia-smi".into(),
            visibility_env: "CUDA_VISIBLE_DEVICES".into(),
            utilization_timeout_secs: 15,
            detail_timeout_secs: 10,
            max_retries: 3,
            retry_delay_ms: 1000,
            dmon_samples: 1,
        }
    }
}

impl DeviceQueryConfig {
    pub fn utilization_timeout(&self) -> Duration {
        Duration::from_secs(self.utilization_timeout_secs)
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Bounds for the soft range check. Values outside are logged, not rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub min_utilization: f64,
    pub max_utilization: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub min_power: f64,
    pub max_power: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_utilization: 0.0,
            max_utilization: 100.0,
            min_temperature: 0.0,
            max_temperature: 100.0,
            min_power: 0.0,
            max_power: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub baseline_dir: String,
    pub stress_dir: String,
    /// Only `*.log` files whose name contains this are parsed for throughput.
    pub throughput_log_marker: String,
    /// Marks the all-device log within the stress phase.
    pub stress_log_marker: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            baseline_dir: "phase1_single_gpu".into(),
            stress_dir: "phase2_all_gpu".into(),
            throughput_log_marker: "gpu_burn".into(),
            stress_log_marker: "all_gpu".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when RUST_LOG is not set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        match std::fs::read_to_string(&path) {
            Ok(s) => Self::load_from_str(&s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path, "config file not found; using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            Err(e) => Err(anyhow::anyhow!("read config {}: {}", path, e)),
        }
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let m = &self.monitoring;
        anyhow::ensure!(
            m.interval_ms > 0,
            "monitoring.interval_ms must be > 0, got {}",
            m.interval_ms
        );
        anyhow::ensure!(
            m.save_interval > 0,
            "monitoring.save_interval must be > 0, got {}",
            m.save_interval
        );
        anyhow::ensure!(
            m.max_samples > 0,
            "monitoring.max_samples must be > 0, got {}",
            m.max_samples
        );
        anyhow::ensure!(
            !m.output_path.is_empty(),
            "monitoring.output_path must be non-empty"
        );

        let q = &self.device_query;
        anyhow::ensure!(
            !q.command.is_empty(),
            "device_query.command must be non-empty"
        );
        anyhow::ensure!(
            q.utilization_timeout_secs > 0,
            "device_query.utilization_timeout_secs must be > 0, got {}",
            q.utilization_timeout_secs
        );
        anyhow::ensure!(
            q.detail_timeout_secs > 0,
            "device_query.detail_timeout_secs must be > 0, got {}",
            q.detail_timeout_secs
        );
        anyhow::ensure!(
            q.max_retries > 0,
            "device_query.max_retries must be > 0, got {}",
            q.max_retries
        );
        anyhow::ensure!(
            q.dmon_samples > 0,
            "device_query.dmon_samples must be > 0, got {}",
            q.dmon_samples
        );

        let v = &self.validation;
        anyhow::ensure!(
            v.min_utilization <= v.max_utilization,
            "validation.min_utilization ({}) must be <= validation.max_utilization ({})",
            v.min_utilization,
            v.max_utilization
        );
        anyhow::ensure!(
            v.min_temperature <= v.max_temperature,
            "validation.min_temperature ({}) must be <= validation.max_temperature ({})",
            v.min_temperature,
            v.max_temperature
        );
        anyhow::ensure!(
            v.min_power <= v.max_power,
            "validation.min_power ({}) must be <= validation.max_power ({})",
            v.min_power,
            v.max_power
        );

        let a = &self.analysis;
        anyhow::ensure!(
            !a.baseline_dir.is_empty() && !a.stress_dir.is_empty(),
            "analysis.baseline_dir and analysis.stress_dir must be non-empty"
        );
        Ok(())
    }
}
