//! Error types for the sampling, sizing and hand-off layers

use std::fmt;
use thiserror::Error;

/// A single telemetry term read by the load sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    SystemCpu,
    ProcessCpu,
    Memory,
    Threads,
    Swap,
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Term::SystemCpu => "system_cpu",
            Term::ProcessCpu => "process_cpu",
            Term::Memory => "memory",
            Term::Threads => "threads",
            Term::Swap => "swap",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    #[error("telemetry term {term} unavailable: {reason}")]
    Unavailable { term: Term, reason: String },
}

impl TelemetryError {
    pub fn unavailable(term: Term, reason: impl Into<String>) -> Self {
        TelemetryError::Unavailable {
            term,
            reason: reason.into(),
        }
    }

    pub fn term(&self) -> Term {
        match self {
            TelemetryError::Unavailable { term, .. } => *term,
        }
    }
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("invalid pool size {requested}: must be positive")]
    InvalidArgument { requested: i64 },

    #[error("failed to spawn worker {worker} of {size}: {source}")]
    ResourceExhausted {
        worker: usize,
        size: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("worker pool task queue is full")]
    QueueFull,

    #[error("worker pool is shut down")]
    ShutDown,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel is closed")]
    Closed,

    #[error("channel wait was cancelled")]
    Cancelled,

    #[error("channel is full")]
    Full,

    #[error("channel is empty")]
    Empty,

    #[error("timed out waiting on channel")]
    Timeout,
}

/// A rejected push; hands the item back to the producer.
pub struct PushError<T> {
    pub item: T,
    pub kind: ChannelError,
}

impl<T> PushError<T> {
    pub(crate) fn new(item: T, kind: ChannelError) -> Self {
        Self { item, kind }
    }

    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push rejected: {}", self.kind)
    }
}

impl<T> std::error::Error for PushError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}
