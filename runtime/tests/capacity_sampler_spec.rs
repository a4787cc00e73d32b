//! Integration tests for the load sampler loop

use loadpool_runtime::telemetry::{
    combine, CapacityScore, LoadSampler, MemoryUsage, SwapSpace, TelemetrySource, ThreadCounts,
};
use loadpool_runtime::{SamplerConfig, TelemetryError, Term};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Telemetry with scripted values; individual terms can be made to fail.
struct ScriptedTelemetry {
    system_cpu: Mutex<f64>,
    fail_swap: AtomicBool,
    panic_first_reads: AtomicUsize,
}

impl ScriptedTelemetry {
    fn new(system_cpu: f64) -> Self {
        Self {
            system_cpu: Mutex::new(system_cpu),
            fail_swap: AtomicBool::new(false),
            panic_first_reads: AtomicUsize::new(0),
        }
    }

    fn set_system_cpu(&self, load: f64) {
        *self.system_cpu.lock() = load;
    }
}

impl TelemetrySource for ScriptedTelemetry {
    fn system_cpu_load(&self) -> Result<f64, TelemetryError> {
        if self
            .panic_first_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            panic!("telemetry backend crashed");
        }
        Ok(*self.system_cpu.lock())
    }

    fn process_cpu_load(&self) -> Result<f64, TelemetryError> {
        Ok(0.25)
    }

    fn heap_usage(&self) -> Result<MemoryUsage, TelemetryError> {
        Ok(MemoryUsage {
            used: 512,
            committed: 1024,
        })
    }

    fn thread_counts(&self) -> Result<ThreadCounts, TelemetryError> {
        Ok(ThreadCounts {
            current: 30,
            peak: 40,
        })
    }

    fn swap_space(&self) -> Result<SwapSpace, TelemetryError> {
        if self.fail_swap.load(Ordering::SeqCst) {
            return Err(TelemetryError::unavailable(Term::Swap, "swap stats offline"));
        }
        Ok(SwapSpace {
            free: 512,
            total: 1024,
        })
    }
}

fn fast_config() -> SamplerConfig {
    SamplerConfig {
        initial_delay: Duration::from_millis(10),
        interval: Duration::from_millis(10),
    }
}

async fn wait_for_cycles(capacity: &CapacityScore, cycles: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while capacity.cycles() < cycles {
        assert!(
            tokio::time::Instant::now() < deadline,
            "sampler published only {} cycles",
            capacity.cycles()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn given_running_sampler_when_cycles_elapse_then_score_published() {
    let telemetry = Arc::new(ScriptedTelemetry::new(0.5));
    let capacity = Arc::new(CapacityScore::new());
    let handle = LoadSampler::new(telemetry, Arc::clone(&capacity), fast_config()).spawn();

    wait_for_cycles(&capacity, 3).await;

    assert_eq!(capacity.get(), combine(0.5, 0.25, 0.5, 0.25, 0.5));
    assert_eq!(capacity.get(), 4_750);
    let latest = handle.latest().expect("sample published");
    assert_eq!(latest.score, 4_750);
    assert!(!latest.is_partial());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_failing_term_when_sampling_then_loop_continues_with_stale_value() {
    let telemetry = Arc::new(ScriptedTelemetry::new(0.5));
    let capacity = Arc::new(CapacityScore::new());
    let handle = LoadSampler::new(
        Arc::clone(&telemetry) as Arc<dyn TelemetrySource>,
        Arc::clone(&capacity),
        fast_config(),
    )
    .spawn();

    wait_for_cycles(&capacity, 1).await;
    telemetry.fail_swap.store(true, Ordering::SeqCst);
    let seen = capacity.cycles();
    wait_for_cycles(&capacity, seen + 3).await;

    let latest = handle.latest().expect("sample published");
    assert_eq!(latest.failed_terms, vec![Term::Swap]);
    assert_eq!(latest.swap_free_ratio, 0.5);
    assert_eq!(latest.score, 4_750);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_panicking_source_when_sampling_then_later_cycles_still_run() {
    let telemetry = Arc::new(ScriptedTelemetry::new(0.0));
    telemetry.panic_first_reads.store(2, Ordering::SeqCst);
    let capacity = Arc::new(CapacityScore::new());
    let config = SamplerConfig {
        initial_delay: Duration::from_millis(100),
        interval: Duration::from_millis(10),
    };
    let handle = LoadSampler::new(telemetry, Arc::clone(&capacity), config).spawn();
    let mut samples = handle.subscribe();

    // The crashed cycles still publish, with every term marked failed.
    samples.changed().await.unwrap();
    let first = samples.borrow_and_update().clone().expect("sample published");
    assert_eq!(first.failed_terms.len(), 5);
    assert_eq!(first.score, 0);

    wait_for_cycles(&capacity, 3).await;
    assert_eq!(capacity.get(), combine(0.0, 0.25, 0.5, 0.25, 0.5));
    assert!(!handle.is_finished());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn given_long_initial_delay_when_shutdown_then_no_cycle_runs() {
    let capacity = Arc::new(CapacityScore::new());
    let config = SamplerConfig {
        initial_delay: Duration::from_secs(3600),
        interval: Duration::from_secs(3),
    };
    let handle = LoadSampler::new(
        Arc::new(ScriptedTelemetry::new(0.5)),
        Arc::clone(&capacity),
        config,
    )
    .spawn();

    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("shutdown should not wait for the initial delay")
        .unwrap();
    assert_eq!(capacity.cycles(), 0);
    assert_eq!(capacity.get(), 0);
}

#[tokio::test]
async fn given_subscriber_when_load_changes_then_new_sample_observed() {
    let telemetry = Arc::new(ScriptedTelemetry::new(0.5));
    let capacity = Arc::new(CapacityScore::new());
    let handle = LoadSampler::new(
        Arc::clone(&telemetry) as Arc<dyn TelemetrySource>,
        Arc::clone(&capacity),
        fast_config(),
    )
    .spawn();
    let mut samples = handle.subscribe();

    wait_for_cycles(&capacity, 1).await;
    telemetry.set_system_cpu(1.0);

    let changed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            samples.changed().await.unwrap();
            let score = samples.borrow().as_ref().map(|s| s.score);
            if score == Some(combine(1.0, 0.25, 0.5, 0.25, 0.5)) {
                break;
            }
        }
    })
    .await;
    assert!(changed.is_ok(), "subscriber never saw the new load");

    handle.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_readers_when_score_changes_then_only_whole_cycles_observed() {
    let telemetry = Arc::new(ScriptedTelemetry::new(0.0));
    let capacity = Arc::new(CapacityScore::new());
    let handle = LoadSampler::new(
        Arc::clone(&telemetry) as Arc<dyn TelemetrySource>,
        Arc::clone(&capacity),
        SamplerConfig {
            initial_delay: Duration::ZERO,
            interval: Duration::from_millis(1),
        },
    )
    .spawn();

    let allowed = [
        0,
        combine(0.0, 0.25, 0.5, 0.25, 0.5),
        combine(1.0, 0.25, 0.5, 0.25, 0.5),
    ];

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let capacity = Arc::clone(&capacity);
            std::thread::spawn(move || {
                for _ in 0..20_000 {
                    let score = capacity.get();
                    assert!(allowed.contains(&score), "unexpected score {score}");
                }
            })
        })
        .collect();

    for i in 0..20 {
        telemetry.set_system_cpu(if i % 2 == 0 { 1.0 } else { 0.0 });
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    for reader in readers {
        reader.join().unwrap();
    }
    handle.shutdown().await.unwrap();
}
