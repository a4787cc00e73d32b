//! Fixed-size pool of named worker threads fed by a bounded task queue

use super::naming::ThreadNamer;
use crate::error::PoolError;
use crate::recorder::PoolMetrics;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

type Job = Box<dyn FnOnce() + Send + 'static>;
type WorkerMain = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Default)]
struct JobCounters {
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Worker threads owned exclusively by one caller.
///
/// Jobs run in FIFO order of submission across all workers. Shutting the pool
/// down (or dropping it) stops intake, lets the workers drain what is already
/// queued and joins them.
pub struct WorkerPool {
    name: String,
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    thread_names: Vec<String>,
    queue_capacity: usize,
    counters: Arc<JobCounters>,
}

impl WorkerPool {
    pub fn new(size: usize, queue_capacity: usize, prefix: &str) -> Result<Self, PoolError> {
        Self::with_spawner(size, queue_capacity, prefix, |builder, main| builder.spawn(main))
    }

    /// Build the pool, starting each worker through `spawn`.
    pub(crate) fn with_spawner<S>(
        size: usize,
        queue_capacity: usize,
        prefix: &str,
        mut spawn: S,
    ) -> Result<Self, PoolError>
    where
        S: FnMut(thread::Builder, WorkerMain) -> io::Result<JoinHandle<()>>,
    {
        if size == 0 {
            return Err(PoolError::InvalidArgument { requested: 0 });
        }
        let queue_capacity = queue_capacity.max(1);
        let namer = ThreadNamer::new(prefix);
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(queue_capacity);
        let counters = Arc::new(JobCounters::default());

        let mut workers = Vec::with_capacity(size);
        let mut thread_names = Vec::with_capacity(size);

        for worker in 1..=size {
            let name = namer.next_name();
            let receiver = receiver.clone();
            let counters = Arc::clone(&counters);
            let spawned = spawn(
                thread::Builder::new().name(name.clone()),
                Box::new(move || run_worker(receiver, counters)),
            );

            match spawned {
                Ok(handle) => {
                    workers.push(handle);
                    thread_names.push(name);
                }
                Err(source) => {
                    error!(
                        pool = %namer.pool_name(),
                        worker,
                        size,
                        error = %source,
                        "Failed to spawn worker thread; stopping pool"
                    );
                    drop(sender);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(PoolError::ResourceExhausted {
                        worker,
                        size,
                        source,
                    });
                }
            }
        }

        info!(pool = %namer.pool_name(), size, queue_capacity, "Worker pool started");

        Ok(Self {
            name: namer.pool_name(),
            sender: Some(sender),
            workers,
            thread_names,
            queue_capacity,
            counters,
        })
    }

    /// Queue a job, blocking while the task queue is full.
    pub fn execute<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::ShutDown)?;
        sender
            .send(Box::new(job))
            .map_err(|_| PoolError::ShutDown)
    }

    /// Queue a job without blocking.
    pub fn try_execute<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::ShutDown)?;
        sender.try_send(Box::new(job)).map_err(|e| match e {
            TrySendError::Full(_) => PoolError::QueueFull,
            TrySendError::Disconnected(_) => PoolError::ShutDown,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.thread_names.len()
    }

    pub fn thread_names(&self) -> &[String] {
        &self.thread_names
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Jobs waiting for a worker
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    pub fn completed_jobs(&self) -> u64 {
        self.counters.completed.load(Ordering::Acquire)
    }

    pub fn panicked_jobs(&self) -> u64 {
        self.counters.panicked.load(Ordering::Acquire)
    }

    /// Stop intake, run queued jobs to completion and join every worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!(pool = %self.name, "Worker thread exited abnormally");
            }
        }
        info!(
            pool = %self.name,
            completed = self.completed_jobs(),
            panicked = self.panicked_jobs(),
            "Worker pool stopped"
        );
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(receiver: Receiver<Job>, counters: Arc<JobCounters>) {
    let name = thread::current().name().unwrap_or("worker").to_string();
    debug!(worker = %name, "Worker started");

    // Ends once every sender is gone and the queue is drained.
    for job in receiver.iter() {
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::AcqRel);
                PoolMetrics::increment_job("completed");
            }
            Err(payload) => {
                counters.panicked.fetch_add(1, Ordering::AcqRel);
                PoolMetrics::increment_job("panicked");
                error!(worker = %name, panic = %panic_message(payload.as_ref()), "Job panicked");
            }
        }
    }

    debug!(worker = %name, "Worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic>".to_string()
    }
}
