// /proc parsers. Pure functions over file contents; reading is done by the caller.

/// Counters from `/proc/stat` needed per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(super) struct StatCounters {
    pub context_switches: Option<u64>,
    /// Sum of all jiffies on the aggregate `cpu` line.
    pub cpu_total: Option<u64>,
    pub cpu_iowait: Option<u64>,
}

impl StatCounters {
    /// Share of CPU time spent waiting on I/O since boot.
    pub fn io_wait_pct(&self) -> Option<f64> {
        match (self.cpu_iowait, self.cpu_total) {
            (Some(wait), Some(total)) if total > 0 => Some(wait as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

pub(super) fn parse_stat(content: &str) -> StatCounters {
    let mut out = StatCounters::default();
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("cpu") => {
                let jiffies: Vec<u64> = parts.filter_map(|p| p.parse().ok()).collect();
                if jiffies.len() >= 5 {
                    out.cpu_total = Some(jiffies.iter().sum());
                    out.cpu_iowait = Some(jiffies[4]);
                }
            }
            Some("ctxt") => out.context_switches = parts.next().and_then(|v| v.parse().ok()),
            _ => {}
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(super) struct VmStat {
    pub page_faults: Option<u64>,
    pub major_faults: Option<u64>,
    pub swap_in: Option<u64>,
    pub swap_out: Option<u64>,
}

impl VmStat {
    /// `pgfault` counts both kinds; minor = total - major.
    pub fn minor_faults(&self) -> Option<u64> {
        Some(self.page_faults?.saturating_sub(self.major_faults?))
    }
}

pub(super) fn parse_vmstat(content: &str) -> VmStat {
    let mut out = VmStat::default();
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let value = value.parse().ok();
        match key {
            "pgfault" => out.page_faults = value,
            "pgmajfault" => out.major_faults = value,
            "pswpin" => out.swap_in = value,
            "pswpout" => out.swap_out = value,
            _ => {}
        }
    }
    out
}

/// Runnable task count from the 4th field (`running/total`) of `/proc/loadavg`.
pub(super) fn parse_run_queue(content: &str) -> Option<u64> {
    let field = content.split_whitespace().nth(3)?;
    let (running, _) = field.split_once('/')?;
    running.parse().ok()
}

/// `avg60` of the `some` line in `/proc/pressure/cpu`.
pub(super) fn parse_psi_some_avg60(content: &str) -> Option<f64> {
    content
        .lines()
        .find(|l| l.starts_with("some"))?
        .split_whitespace()
        .find_map(|p| p.strip_prefix("avg60="))?
        .parse()
        .ok()
}

/// Totals across whole block devices (partitions, loop and ram devices skipped).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(super) struct DiskTotals {
    pub reads: u64,
    pub sectors_read: u64,
    pub writes: u64,
    pub sectors_written: u64,
}

pub(super) const SECTOR_BYTES: u64 = 512;

pub(super) fn parse_diskstats(content: &str) -> Option<DiskTotals> {
    let mut totals = DiskTotals::default();
    let mut seen = false;
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }
        let name = parts[2];
        if name.starts_with("loop") || name.starts_with("ram") || is_partition(name) {
            continue;
        }
        let field = |i: usize| parts[i].parse::<u64>().unwrap_or(0);
        totals.reads += field(3);
        totals.sectors_read += field(5);
        totals.writes += field(7);
        totals.sectors_written += field(9);
        seen = true;
    }
    seen.then_some(totals)
}

fn is_partition(name: &str) -> bool {
    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        // nvme0n1p2, mmcblk0p1
        return name
            .rsplit_once('p')
            .is_some_and(|(head, tail)| {
                head.ends_with(|c: char| c.is_ascii_digit())
                    && !tail.is_empty()
                    && tail.chars().all(|c| c.is_ascii_digit())
            });
    }
    if name.starts_with("dm-") || name.starts_with("md") {
        return false;
    }
    name.ends_with(|c: char| c.is_ascii_digit())
}
