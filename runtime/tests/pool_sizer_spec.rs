//! Integration tests for load-based pool sizing

use loadpool_runtime::telemetry::{
    CapacityScore, LoadSampler, MemoryUsage, SwapSpace, TelemetrySource, ThreadCounts,
};
use loadpool_runtime::{PoolError, PoolRequest, PoolSizer, SamplerConfig, SizerConfig, TelemetryError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Idle host: every headroom term at its maximum.
struct IdleHost;

impl TelemetrySource for IdleHost {
    fn system_cpu_load(&self) -> Result<f64, TelemetryError> {
        Ok(0.0)
    }
    fn process_cpu_load(&self) -> Result<f64, TelemetryError> {
        Ok(0.0)
    }
    fn heap_usage(&self) -> Result<MemoryUsage, TelemetryError> {
        Ok(MemoryUsage {
            used: 0,
            committed: 1,
        })
    }
    fn thread_counts(&self) -> Result<ThreadCounts, TelemetryError> {
        Ok(ThreadCounts {
            current: 1,
            peak: 4,
        })
    }
    fn swap_space(&self) -> Result<SwapSpace, TelemetryError> {
        Ok(SwapSpace { free: 8, total: 8 })
    }
}

fn sizer_with_score(score: u32) -> PoolSizer {
    PoolSizer::new(
        Arc::new(CapacityScore::with_score(score)),
        SizerConfig::default(),
    )
}

#[test]
fn given_fixed_request_of_ten_when_creating_pool_then_four_workers() {
    let sizer = sizer_with_score(8_000);

    let pool = sizer.executor_service(false, 10).unwrap();

    assert_eq!(pool.size(), 4);
    assert_eq!(pool.thread_names().len(), 4);
    pool.shutdown();
}

#[test]
fn given_load_request_of_one_when_creating_pool_then_single_worker() {
    let sizer = sizer_with_score(9_500);

    let pool = sizer.executor_service(true, 1).unwrap();

    assert_eq!(pool.size(), 1);
    pool.shutdown();
}

#[test]
fn given_non_positive_size_when_creating_pool_then_invalid_argument() {
    let sizer = sizer_with_score(5_000);

    for use_load in [false, true] {
        match sizer.executor_service(use_load, 0) {
            Err(PoolError::InvalidArgument { requested: 0 }) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("zero-sized pool accepted"),
        }
        assert!(matches!(
            sizer.executor_service(use_load, -3),
            Err(PoolError::InvalidArgument { requested: -3 })
        ));
    }
}

#[test]
fn given_sampled_idle_host_when_sizing_then_multiplier_from_live_score() {
    let capacity = Arc::new(CapacityScore::new());
    let mut sampler = LoadSampler::new(
        Arc::new(IdleHost),
        Arc::clone(&capacity),
        SamplerConfig::default(),
    );
    let sizer = PoolSizer::new(Arc::clone(&capacity), SizerConfig::default());

    // Before any cycle the score is zero: load-scaled pools fall back to one worker.
    assert_eq!(sizer.resolve_size(PoolRequest::load_scaled(10)).unwrap(), 1);

    let sample = sampler.sample();
    // 2000 + 2000 + 1000 + 0.75 * 3000 + 2000
    assert_eq!(sample.score, 9_250);
    assert_eq!(sizer.resolve_size(PoolRequest::load_scaled(3)).unwrap(), 27);
    assert_eq!(sizer.resolve_size(PoolRequest::load_scaled(10)).unwrap(), 64);
}

#[test]
fn given_custom_cap_when_scaling_then_cap_respected() {
    let sizer = PoolSizer::new(
        Arc::new(CapacityScore::with_score(6_000)),
        SizerConfig::default().with_max_pool_size(8),
    );
    assert_eq!(sizer.resolve_size(PoolRequest::load_scaled(5)).unwrap(), 8);
}

#[test]
fn given_pool_when_running_jobs_then_all_complete_on_named_threads() {
    let sizer = PoolSizer::new(
        Arc::new(CapacityScore::with_score(2_000)),
        SizerConfig::default()
            .with_thread_prefix("risk-parallel")
            .with_queue_capacity(4),
    );
    let pool = sizer.executor_service(true, 3).unwrap();
    assert_eq!(pool.size(), 6);
    assert_eq!(pool.queue_capacity(), 4);

    let done = Arc::new(AtomicUsize::new(0));
    let threads = Arc::new(Mutex::new(HashSet::new()));
    for _ in 0..200 {
        let done = Arc::clone(&done);
        let threads = Arc::clone(&threads);
        pool.execute(move || {
            if let Some(name) = std::thread::current().name() {
                threads.lock().unwrap().insert(name.to_string());
            }
            done.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    let expected_names: HashSet<String> = pool.thread_names().iter().cloned().collect();
    pool.shutdown();

    assert_eq!(done.load(Ordering::SeqCst), 200);
    let seen = threads.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.is_subset(&expected_names));
    assert!(seen.iter().all(|n| n.starts_with("risk-parallel-")));
}
