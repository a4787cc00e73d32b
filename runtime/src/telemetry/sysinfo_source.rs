//! sysinfo-based implementation of the TelemetrySource trait.

use super::source::{MemoryUsage, SwapSpace, TelemetrySource, ThreadCounts};
use crate::error::{TelemetryError, Term};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Telemetry for the current host and process, read through `sysinfo`.
///
/// Memory headroom is measured against the host's physical memory. Thread
/// counts come from the process task list, which only some platforms expose;
/// elsewhere that term reports `Unavailable`. The peak thread count is the
/// highest value this source has observed.
pub struct SysinfoTelemetry {
    system: Mutex<System>,
    pid: Option<Pid>,
    cpu_count: usize,
    peak_threads: AtomicU64,
}

impl SysinfoTelemetry {
    pub fn new() -> Self {
        let mut system = System::new();
        // Prime CPU counters; usage is computed as a delta between refreshes.
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            system: Mutex::new(system),
            pid: sysinfo::get_current_pid().ok(),
            cpu_count,
            peak_threads: AtomicU64::new(0),
        }
    }

    fn pid(&self, term: Term) -> Result<Pid, TelemetryError> {
        self.pid
            .ok_or_else(|| TelemetryError::unavailable(term, "current pid not available"))
    }

    fn refresh_process(system: &mut System, pid: Pid) {
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );
    }
}

impl Default for SysinfoTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for SysinfoTelemetry {
    fn system_cpu_load(&self) -> Result<f64, TelemetryError> {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        Ok(f64::from(system.global_cpu_usage()) / 100.0)
    }

    fn process_cpu_load(&self) -> Result<f64, TelemetryError> {
        let pid = self.pid(Term::ProcessCpu)?;
        let mut system = self.system.lock();
        Self::refresh_process(&mut system, pid);
        let process = system
            .process(pid)
            .ok_or_else(|| TelemetryError::unavailable(Term::ProcessCpu, "process not found"))?;
        // sysinfo reports per-core percent; normalize to the whole machine.
        Ok(f64::from(process.cpu_usage()) / (100.0 * self.cpu_count as f64))
    }

    fn heap_usage(&self) -> Result<MemoryUsage, TelemetryError> {
        let mut system = self.system.lock();
        system.refresh_memory();
        Ok(MemoryUsage {
            used: system.used_memory(),
            committed: system.total_memory(),
        })
    }

    fn thread_counts(&self) -> Result<ThreadCounts, TelemetryError> {
        let pid = self.pid(Term::Threads)?;
        let mut system = self.system.lock();
        Self::refresh_process(&mut system, pid);
        let current = system
            .process(pid)
            .and_then(|p| p.tasks())
            .map(|tasks| tasks.len().max(1) as u64)
            .ok_or_else(|| {
                TelemetryError::unavailable(Term::Threads, "task list not exposed on this platform")
            })?;
        let previous_peak = self.peak_threads.fetch_max(current, Ordering::AcqRel);
        Ok(ThreadCounts {
            current,
            peak: previous_peak.max(current),
        })
    }

    fn swap_space(&self) -> Result<SwapSpace, TelemetryError> {
        let mut system = self.system.lock();
        system.refresh_memory();
        Ok(SwapSpace {
            free: system.free_swap(),
            total: system.total_swap(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::source::TelemetryReading;

    #[test]
    fn reads_host_memory() {
        let telemetry = SysinfoTelemetry::new();
        let memory = telemetry.heap_usage().unwrap();
        assert!(memory.committed > 0);
        assert!(memory.ratio().is_ok());
    }

    #[test]
    fn cpu_loads_are_unit_ratios() {
        let telemetry = SysinfoTelemetry::new();
        let reading = TelemetryReading::collect(&telemetry);
        if let Ok(load) = reading.system_cpu_load {
            assert!((0.0..=1.0).contains(&load));
        }
        if let Ok(load) = reading.process_cpu_load {
            assert!((0.0..=1.0).contains(&load));
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn peak_never_below_current() {
        let telemetry = SysinfoTelemetry::new();
        let first = telemetry.thread_counts().unwrap();
        let second = telemetry.thread_counts().unwrap();
        assert!(first.current >= 1);
        assert!(second.peak >= second.current);
        assert!(second.peak >= first.peak);
    }
}
