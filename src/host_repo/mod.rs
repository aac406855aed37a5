// Host metrics via sysinfo and /proc

mod procfs;

use crate::models::HostSnapshot;
use crate::rate_tracker::{self, RateTracker};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{Networks, System};
use tracing::{debug, instrument, warn};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

struct HostProbe {
    sys: System,
    networks: Networks,
    rates: RateTracker,
    cpu_primed: bool,
    proc_root: PathBuf,
}

/// Owns the host-side probes for one collection run. Rate state lives here,
/// so a fresh repo starts every counter cold.
pub struct HostRepo {
    probe: Arc<std::sync::Mutex<HostProbe>>,
}

impl Default for HostRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRepo {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Reads `/proc`-style files under `root` instead of `/proc`.
    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        Self {
            probe: Arc::new(std::sync::Mutex::new(HostProbe {
                sys,
                networks: Networks::new_with_refreshed_list(),
                rates: RateTracker::new(),
                cpu_primed: false,
                proc_root: root.into(),
            })),
        }
    }

    /// One snapshot. Never fails: a source that cannot be read leaves its fields `None`.
    #[instrument(skip(self), fields(repo = "host", operation = "snapshot"))]
    pub async fn snapshot(&self) -> HostSnapshot {
        let probe = self.probe.clone();
        let joined = tokio::task::spawn_blocking(move || match probe.lock() {
            Ok(mut probe) => probe.collect(),
            Err(e) => {
                warn!(error = %e, "host probe lock poisoned");
                HostSnapshot::default()
            }
        })
        .await;
        match joined {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "host probe task join failed");
                HostSnapshot::default()
            }
        }
    }
}

impl HostProbe {
    fn collect(&mut self) -> HostSnapshot {
        let now = Instant::now();
        let mut snap = HostSnapshot::default();
        self.cpu(&mut snap);
        self.memory(&mut snap);
        self.load(&mut snap);
        self.stat(&mut snap, now);
        self.vmstat(&mut snap, now);
        self.disks(&mut snap, now);
        self.network(&mut snap, now);
        debug!(fields = snap.populated(), "host snapshot collected");
        snap
    }

    fn read_proc(&self, name: &str) -> Option<String> {
        let path = self.proc_root.join(name);
        match std::fs::read_to_string(&path) {
            Ok(s) => Some(s),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "proc source unavailable");
                None
            }
        }
    }

    fn cpu(&mut self, snap: &mut HostSnapshot) {
        self.sys.refresh_cpu_usage();
        let cores = self.sys.cpus().len();
        if cores > 0 {
            snap.cpu_cores = Some(cores as f64);
        }
        // The first reading has no previous interval to compare against.
        if self.cpu_primed {
            snap.cpu_utilization_total = Some((self.sys.global_cpu_usage() as f64).clamp(0.0, 100.0));
        } else {
            self.cpu_primed = true;
        }
    }

    fn memory(&mut self, snap: &mut HostSnapshot) {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total > 0 {
            let available = self.sys.available_memory();
            let used = total.saturating_sub(available);
            snap.memory_total_gb = Some(total as f64 / GIB);
            snap.memory_used_gb = Some(used as f64 / GIB);
            snap.memory_available_gb = Some(available as f64 / GIB);
            snap.memory_utilization = Some(used as f64 / total as f64 * 100.0);
            snap.memory_available_pct = Some(available as f64 / total as f64 * 100.0);
        }

        let swap_total = self.sys.total_swap();
        snap.swap_total_mb = Some(swap_total as f64 / MIB);
        snap.swap_used_pct = Some(if swap_total > 0 {
            self.sys.used_swap() as f64 / swap_total as f64 * 100.0
        } else {
            0.0
        });
    }

    fn load(&mut self, snap: &mut HostSnapshot) {
        let load = System::load_average();
        snap.load_average_1m = Some(load.one);
        snap.load_average_5m = Some(load.five);
        snap.load_average_15m = Some(load.fifteen);

        if let Some(running) = self.read_proc("loadavg").and_then(|s| procfs::parse_run_queue(&s)) {
            snap.run_queue_length = Some(running as f64);
            let cores = self.sys.cpus().len();
            if cores > 0 {
                snap.run_queue_ratio = Some(running as f64 / cores as f64);
            }
        }
        snap.cpu_psi_some_avg60 = self
            .read_proc("pressure/cpu")
            .and_then(|s| procfs::parse_psi_some_avg60(&s));
    }

    fn stat(&mut self, snap: &mut HostSnapshot, now: Instant) {
        let Some(content) = self.read_proc("stat") else {
            return;
        };
        let stat = procfs::parse_stat(&content);
        snap.io_wait_pct = stat.io_wait_pct();
        if let Some(ctxt) = stat.context_switches {
            snap.context_switches_per_sec =
                Some(self.rates.rate(rate_tracker::CONTEXT_SWITCHES, ctxt as f64, now));
        }
    }

    fn vmstat(&mut self, snap: &mut HostSnapshot, now: Instant) {
        let Some(content) = self.read_proc("vmstat") else {
            return;
        };
        let vm = procfs::parse_vmstat(&content);
        let rates = &mut self.rates;
        let mut rate = |metric: &str, value: Option<u64>| value.map(|v| rates.rate(metric, v as f64, now));

        snap.minor_faults_per_sec = rate(rate_tracker::MINOR_FAULTS, vm.minor_faults());
        snap.major_faults_per_sec = rate(rate_tracker::MAJOR_FAULTS, vm.major_faults);
        snap.total_faults_per_sec = rate(rate_tracker::TOTAL_FAULTS, vm.page_faults);
        snap.swap_in_per_sec = rate(rate_tracker::SWAP_IN, vm.swap_in);
        snap.swap_out_per_sec = rate(rate_tracker::SWAP_OUT, vm.swap_out);
    }

    fn disks(&mut self, snap: &mut HostSnapshot, now: Instant) {
        let Some(totals) = self
            .read_proc("diskstats")
            .and_then(|s| procfs::parse_diskstats(&s))
        else {
            return;
        };
        let read_mb = (totals.sectors_read * procfs::SECTOR_BYTES) as f64 / MIB;
        let write_mb = (totals.sectors_written * procfs::SECTOR_BYTES) as f64 / MIB;
        snap.disk_read_mbps = Some(self.rates.rate(rate_tracker::DISK_READ_MB, read_mb, now));
        snap.disk_write_mbps = Some(self.rates.rate(rate_tracker::DISK_WRITE_MB, write_mb, now));
        snap.disk_read_iops = Some(self.rates.rate(rate_tracker::DISK_READ_OPS, totals.reads as f64, now));
        snap.disk_write_iops =
            Some(self.rates.rate(rate_tracker::DISK_WRITE_OPS, totals.writes as f64, now));
    }

    fn network(&mut self, snap: &mut HostSnapshot, now: Instant) {
        self.networks.refresh(true);
        if self.networks.list().is_empty() {
            return;
        }
        let (mut rx, mut tx, mut prx, mut ptx) = (0u64, 0u64, 0u64, 0u64);
        for data in self.networks.list().values() {
            rx += data.total_received();
            tx += data.total_transmitted();
            prx += data.total_packets_received();
            ptx += data.total_packets_transmitted();
        }
        snap.network_recv_mbps = Some(self.rates.rate(rate_tracker::NET_RECV_MB, rx as f64 / MIB, now));
        snap.network_sent_mbps = Some(self.rates.rate(rate_tracker::NET_SENT_MB, tx as f64 / MIB, now));
        snap.network_packets_recv_per_sec =
            Some(self.rates.rate(rate_tracker::NET_PACKETS_RECV, prx as f64, now));
        snap.network_packets_sent_per_sec =
            Some(self.rates.rate(rate_tracker::NET_PACKETS_SENT, ptx as f64, now));
    }
}
