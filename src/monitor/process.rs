//! Process-level probe backed by `sysinfo`

use std::time::Instant;

use sysinfo::{Pid, ProcessExt, ProcessRefreshKind, System, SystemExt};
use tracing::debug;

use super::{GIB, Probe};

/// Resident memory and CPU usage of the current process
///
/// Memory is refreshed on every sample. CPU usage needs two refreshes at least
/// `MINIMUM_CPU_UPDATE_INTERVAL` apart, so between those the last reading is
/// repeated.
pub(crate) struct ProcessProbe {
    system: System,
    pid: Pid,
    cpu_refreshed: Instant,
    cpus: f64,
}

impl ProcessProbe {
    pub(crate) fn new() -> Option<Self> {
        match sysinfo::get_current_pid() {
            Ok(pid) => {
                let mut system = System::new();
                // Baseline for the first CPU reading
                system.refresh_process_specifics(pid, ProcessRefreshKind::new().with_cpu());
                Some(Self {
                    system,
                    pid,
                    cpu_refreshed: Instant::now(),
                    cpus: 0.0,
                })
            }
            Err(e) => {
                debug!(error = e, "process metrics unavailable");
                None
            }
        }
    }
}

impl Probe for ProcessProbe {
    fn sample(&mut self, out: &mut Vec<(String, f64)>) {
        let cpu_due = self.cpu_refreshed.elapsed() >= System::MINIMUM_CPU_UPDATE_INTERVAL;
        let kind = if cpu_due {
            ProcessRefreshKind::new().with_cpu()
        } else {
            ProcessRefreshKind::new()
        };
        if !self.system.refresh_process_specifics(self.pid, kind) {
            return;
        }
        let Some(process) = self.system.process(self.pid) else {
            return;
        };
        if cpu_due {
            // sysinfo reports 100% per fully used core
            self.cpus = f64::from(process.cpu_usage()) / 100.0;
            self.cpu_refreshed = Instant::now();
        }
        out.push(("rss_GiB".to_string(), process.memory() as f64 / GIB));
        out.push(("cpus".to_string(), self.cpus));
    }
}
