//! Load-adaptive worker pool sizing and bounded producer/consumer hand-off
//!
//! A [`telemetry::LoadSampler`] periodically folds system telemetry into a
//! shared [`telemetry::CapacityScore`]; a [`pool::PoolSizer`] reads that score
//! to decide how many workers a new [`pool::WorkerPool`] gets. Independently,
//! [`channel::BoundedChannel`] hands items between producer and consumer
//! threads with backpressure and cancellation.

pub mod channel;
pub mod config;
pub mod error;
pub mod pool;
pub mod recorder;
pub mod telemetry;

pub use channel::BoundedChannel;
pub use config::{ChannelConfig, SamplerConfig, SizerConfig};
pub use error::{ChannelError, ConfigError, PoolError, PushError, TelemetryError, Term};
pub use pool::{PoolRequest, PoolSizer, WorkerPool};
pub use telemetry::{CapacityScore, LoadSample, LoadSampler, SamplerHandle, TelemetrySource};
