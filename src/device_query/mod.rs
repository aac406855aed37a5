// Device telemetry via the external query tool (nvidia-smi compatible).
// Every call is timeout-bounded and retried; exhausted retries degrade to sentinels.

mod identity;
mod parse;
mod runner;

pub use identity::DeviceIdentityMap;
pub use runner::{CommandRunner, QueryError, QueryRunner};

use crate::config::DeviceQueryConfig;
use crate::models::{DeviceReading, Utilization};
use crate::retry::{RetryPolicy, with_retry, with_timing};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{instrument, warn};

const LISTING_TIMEOUT: Duration = Duration::from_secs(10);

pub struct DeviceQueryClient<R = CommandRunner> {
    runner: R,
    identity: DeviceIdentityMap,
    policy: RetryPolicy,
    utilization_timeout: Duration,
    detail_timeout: Duration,
    dmon_samples: u32,
}

impl<R: QueryRunner> DeviceQueryClient<R> {
    /// Client over an already-resolved identity map.
    pub fn new(runner: R, config: &DeviceQueryConfig, identity: DeviceIdentityMap) -> Self {
        Self {
            runner,
            identity,
            policy: RetryPolicy::new(config.max_retries, config.retry_delay()),
            utilization_timeout: config.utilization_timeout(),
            detail_timeout: config.detail_timeout(),
            dmon_samples: config.dmon_samples.max(1),
        }
    }

    /// Runs the one-time `index, identifier` listing and resolves the visibility setting
    /// against it. A failed listing is fatal unless every visibility entry is numeric.
    #[instrument(skip(runner, config), fields(operation = "discover_devices"))]
    pub async fn discover(
        runner: R,
        config: &DeviceQueryConfig,
        visibility: Option<&str>,
    ) -> Result<Self, QueryError> {
        let policy = RetryPolicy::new(config.max_retries, config.retry_delay());
        let args = vec![
            "--query-gpu=index,uuid".to_string(),
            "--format=csv,noheader".to_string(),
        ];
        let listing = with_retry("device_listing", &policy, || {
            with_timing("device_listing", runner.run(&args, LISTING_TIMEOUT))
        })
        .await
        .and_then(|out| {
            let listing = parse::parse_listing(&out);
            if listing.is_empty() && !out.trim().is_empty() {
                return Err(QueryError::Parse(format!(
                    "no `index, identifier` lines in listing: {}",
                    out.lines().next().unwrap_or_default()
                )));
            }
            Ok(listing)
        });

        let listing = match (listing, visibility) {
            (Ok(listing), _) => listing,
            (Err(e), Some(setting)) if all_numeric(setting) => {
                warn!(error = %e, "device listing failed; using numeric visibility entries as-is");
                Vec::new()
            }
            (Err(e), _) => return Err(e),
        };

        let identity = DeviceIdentityMap::resolve(visibility, &listing);
        tracing::info!(
            devices = identity.len(),
            restricted = identity.is_restricted(),
            logical_ids = ?identity.logical_ids(),
            "device identity resolved"
        );
        Ok(Self::new(runner, config, identity))
    }

    pub fn identity(&self) -> &DeviceIdentityMap {
        &self.identity
    }

    pub fn logical_ids(&self) -> Vec<u32> {
        self.identity.logical_ids()
    }

    /// SM/memory utilization for every requested logical id, in one batched call.
    /// Ids the tool did not report, or all ids when the call fails, come back degraded.
    pub async fn query_utilization(&self, logical_ids: &[u32]) -> BTreeMap<u32, Utilization> {
        let physical = self.physical_ids(logical_ids);
        if physical.is_empty() {
            return degraded_for(logical_ids, |_| Utilization::degraded());
        }
        let args = vec![
            "dmon".to_string(),
            "-s".to_string(),
            "u".to_string(),
            "-d".to_string(),
            "1".to_string(),
            "-c".to_string(),
            self.dmon_samples.to_string(),
            "-i".to_string(),
            join_ids(&physical),
        ];

        let output = match self.call("utilization", &args, self.utilization_timeout).await {
            Ok(out) => out,
            Err(e) => {
                warn!(error = %e, operation = "query_utilization", "utilization degraded");
                return degraded_for(logical_ids, |_| Utilization::degraded());
            }
        };

        let by_physical = parse::parse_dmon(&output);
        logical_ids
            .iter()
            .map(|&id| {
                let util = self
                    .identity
                    .physical(id)
                    .and_then(|p| by_physical.get(&p).copied())
                    .unwrap_or_else(|| {
                        warn!(logical_id = id, "no utilization line for device");
                        Utilization::degraded()
                    });
                (id, util)
            })
            .collect()
    }

    /// Temperature, power and frame-buffer readings for every requested logical id,
    /// in one batched call. Utilization fields are left at 0 for the caller to merge.
    pub async fn query_devices(&self, logical_ids: &[u32]) -> BTreeMap<u32, DeviceReading> {
        let physical = self.physical_ids(logical_ids);
        if physical.is_empty() {
            return degraded_for(logical_ids, DeviceReading::degraded);
        }
        let args = vec![
            "--query-gpu=index,temperature.gpu,power.draw,memory.used,memory.total".to_string(),
            "--format=csv,noheader,nounits".to_string(),
            "-i".to_string(),
            join_ids(&physical),
        ];

        let output = match self.call("details", &args, self.detail_timeout).await {
            Ok(out) => out,
            Err(e) => {
                warn!(error = %e, operation = "query_devices", "device details degraded");
                return degraded_for(logical_ids, DeviceReading::degraded);
            }
        };

        let rows = parse::parse_details(&output);
        logical_ids
            .iter()
            .map(|&id| {
                let row = self.identity.physical(id).and_then(|p| rows.get(&p));
                let reading = match row {
                    Some(r) => DeviceReading::new(
                        id,
                        Utilization::default(),
                        r.temperature,
                        r.power,
                        r.used_mib,
                        r.total_mib,
                    ),
                    None => {
                        warn!(logical_id = id, "no detail line for device");
                        DeviceReading::degraded(id)
                    }
                };
                (id, reading)
            })
            .collect()
    }

    async fn call(
        &self,
        operation: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<String, QueryError> {
        with_retry(operation, &self.policy, || {
            with_timing(operation, self.runner.run(args, timeout))
        })
        .await
    }

    fn physical_ids(&self, logical_ids: &[u32]) -> Vec<u32> {
        logical_ids
            .iter()
            .filter_map(|&id| {
                let p = self.identity.physical(id);
                if p.is_none() {
                    warn!(logical_id = id, "logical id has no physical device");
                }
                p
            })
            .collect()
    }
}

fn degraded_for<T>(logical_ids: &[u32], make: impl Fn(u32) -> T) -> BTreeMap<u32, T> {
    logical_ids.iter().map(|&id| (id, make(id))).collect()
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
}

fn all_numeric(setting: &str) -> bool {
    setting
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .all(|t| t.parse::<u32>().is_ok())
}
