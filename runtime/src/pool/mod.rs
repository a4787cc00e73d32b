//! Load-adaptive worker pools

pub mod naming;
pub mod sizer;
pub mod worker;

pub use naming::ThreadNamer;
pub use sizer::{PoolRequest, PoolSizer};
pub use worker::WorkerPool;
