//! Telemetry collaborator interface consumed by the load sampler

use crate::error::{TelemetryError, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: u64,
    pub committed: u64,
}

impl MemoryUsage {
    pub fn ratio(&self) -> Result<f64, TelemetryError> {
        if self.committed == 0 {
            return Err(TelemetryError::unavailable(
                Term::Memory,
                "committed memory is zero",
            ));
        }
        unit_ratio(Term::Memory, self.used as f64 / self.committed as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadCounts {
    pub current: u64,
    pub peak: u64,
}

impl ThreadCounts {
    /// Headroom between live and peak thread counts; approaches zero as the
    /// process runs at its historical peak.
    pub fn ratio(&self) -> Result<f64, TelemetryError> {
        let low = self.current.min(self.peak);
        let high = self.current.max(self.peak);
        if high == 0 {
            return Ok(0.0);
        }
        unit_ratio(Term::Threads, 1.0 - low as f64 / high as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapSpace {
    pub free: u64,
    pub total: u64,
}

impl SwapSpace {
    pub fn free_ratio(&self) -> Result<f64, TelemetryError> {
        // No swap configured means nothing can thrash.
        if self.total == 0 {
            return Ok(1.0);
        }
        unit_ratio(Term::Swap, self.free as f64 / self.total as f64)
    }
}

/// Source of raw system/process telemetry. Each read may fail independently.
pub trait TelemetrySource: Send + Sync {
    /// Whole-system CPU load in `[0, 1]`
    fn system_cpu_load(&self) -> Result<f64, TelemetryError>;

    /// CPU load of this process across all cores, in `[0, 1]`
    fn process_cpu_load(&self) -> Result<f64, TelemetryError>;

    fn heap_usage(&self) -> Result<MemoryUsage, TelemetryError>;

    fn thread_counts(&self) -> Result<ThreadCounts, TelemetryError>;

    fn swap_space(&self) -> Result<SwapSpace, TelemetryError>;
}

/// Raw outcome of one round of reads, before combining.
#[derive(Debug, Clone)]
pub struct TelemetryReading {
    pub system_cpu_load: Result<f64, TelemetryError>,
    pub process_cpu_load: Result<f64, TelemetryError>,
    pub memory_usage_ratio: Result<f64, TelemetryError>,
    pub thread_ratio: Result<f64, TelemetryError>,
    pub swap_free_ratio: Result<f64, TelemetryError>,
}

impl TelemetryReading {
    pub fn collect<S: TelemetrySource + ?Sized>(source: &S) -> Self {
        Self {
            system_cpu_load: source
                .system_cpu_load()
                .and_then(|v| unit_ratio(Term::SystemCpu, v)),
            process_cpu_load: source
                .process_cpu_load()
                .and_then(|v| unit_ratio(Term::ProcessCpu, v)),
            memory_usage_ratio: source.heap_usage().and_then(|m| m.ratio()),
            thread_ratio: source.thread_counts().and_then(|t| t.ratio()),
            swap_free_ratio: source.swap_space().and_then(|s| s.free_ratio()),
        }
    }

    /// A reading in which every term failed for the same reason.
    pub fn unavailable(reason: &str) -> Self {
        let fail = |term| Err(TelemetryError::unavailable(term, reason));
        Self {
            system_cpu_load: fail(Term::SystemCpu),
            process_cpu_load: fail(Term::ProcessCpu),
            memory_usage_ratio: fail(Term::Memory),
            thread_ratio: fail(Term::Threads),
            swap_free_ratio: fail(Term::Swap),
        }
    }
}

pub(crate) fn unit_ratio(term: Term, value: f64) -> Result<f64, TelemetryError> {
    if !value.is_finite() {
        return Err(TelemetryError::unavailable(
            term,
            format!("non-finite reading {value}"),
        ));
    }
    Ok(value.clamp(0.0, 1.0))
}
