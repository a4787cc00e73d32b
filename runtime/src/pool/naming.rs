//! Process-wide pool numbering and worker thread names

use std::sync::atomic::{AtomicUsize, Ordering};

static POOL_SEQ: AtomicUsize = AtomicUsize::new(1);

/// Names the threads of one pool: `{prefix}-{pool}-worker-{n}`.
#[derive(Debug)]
pub struct ThreadNamer {
    prefix: String,
    pool_seq: usize,
    next: AtomicUsize,
}

impl ThreadNamer {
    /// Reserve the next pool sequence number for `prefix`.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            pool_seq: POOL_SEQ.fetch_add(1, Ordering::Relaxed),
            next: AtomicUsize::new(1),
        }
    }

    pub fn pool_seq(&self) -> usize {
        self.pool_seq
    }

    pub fn pool_name(&self) -> String {
        format!("{}-{}", self.prefix, self.pool_seq)
    }

    pub fn next_name(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-worker-{}", self.prefix, self.pool_seq, n)
    }
}
