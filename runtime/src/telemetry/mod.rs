//! Telemetry module for system load sampling and the capacity score

pub mod capacity;
pub mod sampler;
pub mod source;
pub mod sysinfo_source;

pub use capacity::CapacityScore;
pub use sampler::{combine, LoadSample, LoadSampler, SamplerHandle, MAX_SCORE};
pub use source::{MemoryUsage, SwapSpace, TelemetryReading, TelemetrySource, ThreadCounts};
pub use sysinfo_source::SysinfoTelemetry;
