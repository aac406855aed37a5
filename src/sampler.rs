// One telemetry sample per tick: devices + host.

use crate::device_query::{DeviceQueryClient, QueryRunner};
use crate::host_repo::HostRepo;
use crate::models::{DeviceReading, TelemetrySample};
use crate::validator::Validator;
use chrono::Utc;
use tracing::{debug, warn};

pub struct Sampler<R: QueryRunner> {
    client: DeviceQueryClient<R>,
    host: HostRepo,
    validator: Validator,
    /// Resolved once when the sampler is built; not re-discovered per tick.
    device_ids: Vec<u32>,
}

impl<R: QueryRunner> Sampler<R> {
    pub fn new(client: DeviceQueryClient<R>, host: HostRepo, validator: Validator) -> Self {
        let device_ids = client.logical_ids();
        Self {
            client,
            host,
            validator,
            device_ids,
        }
    }

    pub fn device_ids(&self) -> &[u32] {
        &self.device_ids
    }

    /// Builds the sample for `iteration`. Never fails: degraded readings stay in,
    /// readings that fail validation are left out.
    pub async fn collect(&self, iteration: u64) -> TelemetrySample {
        let timestamp = Utc::now();
        let (devices, host) = tokio::join!(self.collect_devices(), self.host.snapshot());
        debug!(
            iteration,
            devices = devices.len(),
            host_fields = host.populated(),
            "sample collected"
        );
        TelemetrySample {
            timestamp,
            iteration,
            devices,
            host,
        }
    }

    async fn collect_devices(&self) -> Vec<DeviceReading> {
        if self.device_ids.is_empty() {
            return Vec::new();
        }
        let (utilization, details) = tokio::join!(
            self.client.query_utilization(&self.device_ids),
            self.client.query_devices(&self.device_ids)
        );

        let mut readings = Vec::with_capacity(self.device_ids.len());
        for &id in &self.device_ids {
            let util = utilization.get(&id).copied().unwrap_or_default();
            let reading = match details.get(&id) {
                Some(d) => {
                    let mut r = DeviceReading::new(
                        id,
                        util,
                        d.temperature,
                        d.power,
                        d.frame_buffer_used_mib,
                        d.frame_buffer_total_mib,
                    );
                    r.degraded = util.degraded || d.degraded;
                    r
                }
                None => {
                    let mut r = DeviceReading::degraded(id);
                    r.sm_utilization = util.sm;
                    r.memory_utilization = util.mem;
                    r
                }
            };
            if self.validator.validate_device_reading(&reading) {
                readings.push(reading);
            } else {
                warn!(logical_id = id, "device reading failed validation; excluded from sample");
            }
        }
        readings
    }
}
