//! Pool sizing - turns a requested pool size and the live capacity score into
//! a worker count

use super::worker::WorkerPool;
use crate::config::SizerConfig;
use crate::error::PoolError;
use crate::recorder::PoolMetrics;
use crate::telemetry::CapacityScore;
use std::sync::Arc;
use tracing::info;

/// A caller's request for a worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolRequest {
    pub use_load: bool,
    pub requested_size: i64,
}

impl PoolRequest {
    pub fn new(use_load: bool, requested_size: i64) -> Self {
        Self {
            use_load,
            requested_size,
        }
    }

    /// Size capped at the default threshold, ignoring load.
    pub fn fixed(requested_size: i64) -> Self {
        Self::new(false, requested_size)
    }

    /// Size scaled by the current capacity score.
    pub fn load_scaled(requested_size: i64) -> Self {
        Self::new(true, requested_size)
    }
}

pub struct PoolSizer {
    capacity: Arc<CapacityScore>,
    config: SizerConfig,
}

impl PoolSizer {
    pub fn new(capacity: Arc<CapacityScore>, mut config: SizerConfig) -> Self {
        config.default_threshold = config.default_threshold.max(1);
        config.max_pool_size = config.max_pool_size.max(1);
        Self { capacity, config }
    }

    pub fn config(&self) -> &SizerConfig {
        &self.config
    }

    /// Worker count for `req`.
    ///
    /// Without load scaling the request is capped at `default_threshold`.
    /// With it, requests of one or two workers are honoured as-is; larger ones
    /// are multiplied by `score / load_divisor`, floored at one worker and
    /// capped at `max_pool_size`.
    pub fn resolve_size(&self, req: PoolRequest) -> Result<usize, PoolError> {
        if req.requested_size <= 0 {
            return Err(PoolError::InvalidArgument {
                requested: req.requested_size,
            });
        }
        let requested = usize::try_from(req.requested_size).unwrap_or(usize::MAX);

        if !req.use_load {
            return Ok(requested.min(self.config.default_threshold));
        }
        if requested <= 2 {
            return Ok(requested);
        }

        let multiplier = self.capacity.multiplier(self.config.load_divisor) as usize;
        let scaled = requested.saturating_mul(multiplier).max(1);
        Ok(scaled.min(self.config.max_pool_size))
    }

    pub fn create_pool(&self, req: PoolRequest) -> Result<WorkerPool, PoolError> {
        let size = self.resolve_size(req)?;
        info!(
            size,
            requested = req.requested_size,
            use_load = req.use_load,
            score = self.capacity.get(),
            "Creating worker pool"
        );
        PoolMetrics::record_pool_created(size, req.use_load);
        WorkerPool::new(size, self.config.queue_capacity, &self.config.thread_prefix)
    }

    /// Resolve a size and build a pool of exactly that many workers.
    pub fn executor_service(
        &self,
        use_load: bool,
        requested_size: i64,
    ) -> Result<WorkerPool, PoolError> {
        self.create_pool(PoolRequest::new(use_load, requested_size))
    }
}
