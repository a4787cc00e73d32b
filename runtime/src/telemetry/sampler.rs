//! Load sampler - periodically folds system telemetry into a capacity score
//!
//! Each cycle reads five telemetry terms, combines them with fixed weights and
//! publishes the result to a shared [`CapacityScore`]. Failed reads never stop
//! the loop: the failed term keeps its last good value for that cycle.

use super::capacity::CapacityScore;
use super::source::{TelemetryReading, TelemetrySource};
use crate::config::SamplerConfig;
use crate::error::{TelemetryError, Term};
use crate::recorder::SamplerMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

const SYSTEM_CPU_WEIGHT: f64 = 2_000.0;
const PROCESS_CPU_WEIGHT: f64 = 2_000.0;
const MEMORY_WEIGHT: f64 = 1_000.0;
const THREAD_WEIGHT: f64 = 3_000.0;
const SWAP_WEIGHT: f64 = 2_000.0;

/// Highest score the weights can produce.
pub const MAX_SCORE: u32 = 10_000;

/// One sampling cycle's terms and the score derived from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSample {
    pub system_cpu_load: f64,
    pub process_cpu_load: f64,
    pub memory_usage_ratio: f64,
    pub thread_ratio: f64,
    pub swap_free_ratio: f64,
    pub score: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_terms: Vec<Term>,
    pub sampled_at: DateTime<Utc>,
}

impl LoadSample {
    /// Score in thousands, the unit used for worker multipliers
    pub fn load(&self) -> u32 {
        self.score / 1_000
    }

    pub fn is_partial(&self) -> bool {
        !self.failed_terms.is_empty()
    }
}

/// Weighted capacity score; inputs are unit ratios.
pub fn combine(
    system_cpu_load: f64,
    process_cpu_load: f64,
    memory_usage_ratio: f64,
    thread_ratio: f64,
    swap_free_ratio: f64,
) -> u32 {
    let score = (1.0 - system_cpu_load) * SYSTEM_CPU_WEIGHT
        + (1.0 - process_cpu_load) * PROCESS_CPU_WEIGHT
        + (1.0 - memory_usage_ratio) * MEMORY_WEIGHT
        + thread_ratio * THREAD_WEIGHT
        + swap_free_ratio * SWAP_WEIGHT;
    // float-to-int casts saturate; NaN maps to zero
    (score as u32).min(MAX_SCORE)
}

/// Last good value of every term
#[derive(Debug, Clone, Copy)]
struct Terms {
    system_cpu_load: f64,
    process_cpu_load: f64,
    memory_usage_ratio: f64,
    thread_ratio: f64,
    swap_free_ratio: f64,
}

impl Default for Terms {
    // A term never read successfully contributes no headroom.
    fn default() -> Self {
        Self {
            system_cpu_load: 1.0,
            process_cpu_load: 1.0,
            memory_usage_ratio: 1.0,
            thread_ratio: 0.0,
            swap_free_ratio: 0.0,
        }
    }
}

pub struct LoadSampler {
    source: Arc<dyn TelemetrySource>,
    capacity: Arc<CapacityScore>,
    config: SamplerConfig,
    last: Terms,
}

impl LoadSampler {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        capacity: Arc<CapacityScore>,
        config: SamplerConfig,
    ) -> Self {
        Self {
            source,
            capacity,
            config,
            last: Terms::default(),
        }
    }

    pub fn capacity(&self) -> Arc<CapacityScore> {
        Arc::clone(&self.capacity)
    }

    /// Run one cycle on the calling thread.
    pub fn sample(&mut self) -> LoadSample {
        let reading = TelemetryReading::collect(self.source.as_ref());
        self.apply(reading)
    }

    /// Fold a reading into the score and publish it.
    pub fn apply(&mut self, reading: TelemetryReading) -> LoadSample {
        let mut failed = Vec::new();

        let mut take = |value: Result<f64, TelemetryError>, slot: &mut f64| match value {
            Ok(v) => *slot = v,
            Err(e) => {
                warn!(term = %e.term(), error = %e, "Telemetry read failed; keeping previous value");
                SamplerMetrics::increment_term_failure(&e.term().to_string());
                failed.push(e.term());
            }
        };

        take(reading.system_cpu_load, &mut self.last.system_cpu_load);
        take(reading.process_cpu_load, &mut self.last.process_cpu_load);
        take(reading.memory_usage_ratio, &mut self.last.memory_usage_ratio);
        take(reading.thread_ratio, &mut self.last.thread_ratio);
        take(reading.swap_free_ratio, &mut self.last.swap_free_ratio);

        let t = self.last;
        let score = combine(
            t.system_cpu_load,
            t.process_cpu_load,
            t.memory_usage_ratio,
            t.thread_ratio,
            t.swap_free_ratio,
        );
        self.capacity.publish(score);
        SamplerMetrics::record_capacity_score(score);
        SamplerMetrics::increment_cycle();

        let sample = LoadSample {
            system_cpu_load: t.system_cpu_load,
            process_cpu_load: t.process_cpu_load,
            memory_usage_ratio: t.memory_usage_ratio,
            thread_ratio: t.thread_ratio,
            swap_free_ratio: t.swap_free_ratio,
            score,
            failed_terms: failed,
            sampled_at: Utc::now(),
        };

        info!(
            cycle = self.capacity.cycles(),
            system_cpu_headroom = 1.0 - sample.system_cpu_load,
            process_cpu_headroom = 1.0 - sample.process_cpu_load,
            memory_headroom = 1.0 - sample.memory_usage_ratio,
            thread_ratio = sample.thread_ratio,
            swap_free_ratio = sample.swap_free_ratio,
            score = sample.score,
            load = sample.load(),
            failed_terms = sample.failed_terms.len(),
            "Capacity score updated"
        );

        sample
    }

    /// Start the sampling loop on the current tokio runtime.
    ///
    /// The first cycle runs after `initial_delay`, later cycles `interval`
    /// after the previous one finished. Telemetry is read on the blocking
    /// pool so async workers are never stalled by slow reads.
    pub fn spawn(mut self) -> SamplerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (sample_tx, sample_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            let SamplerConfig {
                initial_delay,
                interval,
            } = self.config.clone();
            info!(
                initial_delay_ms = initial_delay.as_millis() as u64,
                interval_ms = interval.as_millis() as u64,
                "Load sampler starting"
            );

            if pause(initial_delay, &mut shutdown_rx).await {
                info!("Load sampler stopped before first cycle");
                return;
            }

            loop {
                let source = Arc::clone(&self.source);
                let reading = match tokio::task::spawn_blocking(move || {
                    TelemetryReading::collect(source.as_ref())
                })
                .await
                {
                    Ok(reading) => reading,
                    Err(e) => {
                        error!(error = %e, "Telemetry read task failed; keeping previous values");
                        TelemetryReading::unavailable("telemetry read task failed")
                    }
                };
                let sample = self.apply(reading);
                sample_tx.send_replace(Some(sample));

                if pause(interval, &mut shutdown_rx).await {
                    break;
                }
            }

            info!(cycles = self.capacity.cycles(), "Load sampler stopped");
        });

        SamplerHandle {
            shutdown_tx,
            samples: sample_rx,
            task,
        }
    }
}

/// Sleep for `delay`; returns true if shutdown was requested meanwhile.
async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            // Handle dropped: nobody can stop us any more, keep the cadence.
            Err(_) => {
                tokio::time::sleep(delay).await;
                false
            }
        },
    }
}

/// Control handle for a running sampler.
///
/// Dropping the handle detaches the sampler; it then runs for the life of
/// the tokio runtime.
pub struct SamplerHandle {
    shutdown_tx: watch::Sender<bool>,
    samples: watch::Receiver<Option<LoadSample>>,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// Receiver that sees every published sample (the latest one wins).
    pub fn subscribe(&self) -> watch::Receiver<Option<LoadSample>> {
        self.samples.clone()
    }

    pub fn latest(&self) -> Option<LoadSample> {
        self.samples.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for the in-flight cycle to finish.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        let _ = self.shutdown_tx.send(true);
        self.task.await
    }
}
