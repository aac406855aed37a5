// Schema (hard) and range (soft) checks for device readings and stored batches.

use crate::config::ValidationConfig;
use crate::models::DeviceReading;
use serde_json::Value;
use tracing::{error, warn};

const REQUIRED_DEVICE_FIELDS: [&str; 4] = [
    "sm_utilization",
    "memory_utilization",
    "temperature",
    "power",
];

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// A typed reading always has every field, so only non-finite numbers fail it.
    /// Out-of-range values are logged and accepted.
    pub fn validate_device_reading(&self, reading: &DeviceReading) -> bool {
        if !self.config.enabled {
            return true;
        }
        let fields = [
            ("sm_utilization", reading.sm_utilization),
            ("memory_utilization", reading.memory_utilization),
            ("temperature", reading.temperature),
            ("power", reading.power),
            ("frame_buffer_util_pct", reading.frame_buffer_util_pct),
        ];
        if let Some(&(field, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            error!(logical_id = reading.logical_id, field, value, "non-finite device value");
            return false;
        }
        self.check_ranges(reading.logical_id, &fields[..4]);
        true
    }

    /// Same contract as [`Self::validate_device_reading`] for an untyped record,
    /// where a missing or non-numeric required field is a hard failure.
    pub fn validate_device_value(&self, record: &Value) -> bool {
        if !self.config.enabled {
            return true;
        }
        let Some(obj) = record.as_object() else {
            error!("device record is not an object");
            return false;
        };
        let id = obj
            .get("logical_id")
            .or_else(|| obj.get("gpu_id"))
            .and_then(Value::as_u64);
        let Some(id) = id else {
            error!(field = "logical_id", "missing or non-integer device id");
            return false;
        };

        let mut values = Vec::with_capacity(REQUIRED_DEVICE_FIELDS.len());
        for field in REQUIRED_DEVICE_FIELDS {
            match obj.get(field) {
                None => {
                    error!(logical_id = id, field, "missing required field");
                    return false;
                }
                Some(v) => match v.as_f64() {
                    Some(n) => values.push((field, n)),
                    None => {
                        error!(logical_id = id, field, value = %v, "non-numeric field");
                        return false;
                    }
                },
            }
        }
        self.check_ranges(id as u32, &values);
        true
    }

    /// Representative schema guard: only the first record's shape is checked.
    /// An empty batch is valid.
    pub fn validate_sample_batch(&self, samples: &[Value]) -> bool {
        if !self.config.enabled {
            return true;
        }
        let Some(first) = samples.first() else {
            warn!("empty sample batch");
            return true;
        };
        if first.get("timestamp").is_none() {
            error!(field = "timestamp", "missing required field in sample");
            return false;
        }
        let devices = first.get("devices").or_else(|| first.get("gpus"));
        let Some(devices) = devices else {
            error!(field = "devices", "missing required field in sample");
            return false;
        };
        let Some(devices) = devices.as_array() else {
            error!(field = "devices", "device list is not an array");
            return false;
        };
        devices.iter().all(|d| self.validate_device_value(d))
    }

    fn check_ranges(&self, logical_id: u32, values: &[(&str, f64)]) {
        let c = &self.config;
        for &(field, value) in values {
            let (min, max) = match field {
                "sm_utilization" | "memory_utilization" => (c.min_utilization, c.max_utilization),
                "temperature" => (c.min_temperature, c.max_temperature),
                "power" => (c.min_power, c.max_power),
                _ => continue,
            };
            if !(min..=max).contains(&value) {
                warn!(logical_id, field, value, min, max, "value outside expected range");
            }
        }
    }
}
