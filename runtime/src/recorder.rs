//! Metric recording for sampling and pool activity
//!
//! Calls are no-ops until the embedding process installs a `metrics`
//! recorder (for example a Prometheus exporter).

use metrics::{counter, gauge, histogram};

/// Capacity score and telemetry health
pub struct SamplerMetrics;

impl SamplerMetrics {
    /// Record the score published by the latest cycle
    pub fn record_capacity_score(score: u32) {
        gauge!("loadpool_capacity_score", f64::from(score));
    }

    pub fn increment_cycle() {
        counter!("loadpool_sampler_cycles_total", 1);
    }

    /// Count a telemetry term that could not be read this cycle
    pub fn increment_term_failure(term: &str) {
        counter!("loadpool_telemetry_failures_total", 1,
            "term" => term.to_string()
        );
    }
}

/// Worker pool creation and job outcomes
pub struct PoolMetrics;

impl PoolMetrics {
    pub fn record_pool_created(size: usize, use_load: bool) {
        counter!("loadpool_pools_created_total", 1,
            "mode" => if use_load { "load" } else { "fixed" }
        );
        histogram!("loadpool_pool_size", size as f64);
    }

    /// Count a finished job; `result` is `completed` or `panicked`
    pub fn increment_job(result: &'static str) {
        counter!("loadpool_jobs_total", 1, "result" => result);
    }
}
