use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::blocking::{BlockingQueue, Enqueued};
use crate::error::{QueueError, Result};
use crate::job::Job;

/// How long an idle worker waits before re-checking the running flag.
///
/// Workers are normally woken by a sentinel; the poll only matters when a
/// bounded queue evicted that sentinel during shutdown.
const IDLE_POLL: Duration = Duration::from_millis(100);

const DEFAULT_THREAD_NAME: &str = "sensorview-worker";

enum WorkItem {
    Run(Box<dyn Job>),
    Wake,
}

/// Construction options for [`WorkQueue`].
#[derive(Debug, Clone)]
pub struct WorkQueueConfig {
    /// Prefix for worker thread names (`<prefix>-<index>`).
    pub thread_name: String,
    /// Bound on queued jobs; when full the oldest job is dropped.
    pub capacity: Option<usize>,
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            capacity: None,
        }
    }
}

/// Snapshot of queue activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub executed: u64,
    pub discarded: u64,
    pub evicted: u64,
    pub panicked: u64,
    pub pending: usize,
}

struct Shared {
    queue: BlockingQueue<WorkItem>,
    running: AtomicBool,
    executed: AtomicU64,
    discarded: AtomicU64,
    evicted: AtomicU64,
    panicked: AtomicU64,
}

/// Fixed pool of worker threads draining a shared FIFO of [`Job`]s.
///
/// Jobs may be added in any state; they only run while the pool is started.
/// [`stop`](Self::stop) joins every worker and throws away whatever is still
/// queued, so no job runs after `stop` returns. A stopped pool can be started
/// again.
pub struct WorkQueue {
    shared: Arc<Shared>,
    // Held for the whole of start/stop so the two never interleave.
    workers: Mutex<Vec<JoinHandle<()>>>,
    // Workers that were stopped from inside their own job and have not been
    // joined yet. They still count as live until their thread exits.
    retired: Mutex<Vec<JoinHandle<()>>>,
    thread_name: String,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    /// Create an unbounded, stopped pool.
    pub fn new() -> Self {
        Self::with_config(WorkQueueConfig::default())
    }

    /// Create a stopped pool from explicit options.
    pub fn with_config(config: WorkQueueConfig) -> Self {
        let queue = match config.capacity {
            Some(cap) => BlockingQueue::with_capacity(cap),
            None => BlockingQueue::new(),
        };
        Self {
            shared: Arc::new(Shared {
                queue,
                running: AtomicBool::new(false),
                executed: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                evicted: AtomicU64::new(0),
                panicked: AtomicU64::new(0),
            }),
            workers: Mutex::new(Vec::new()),
            retired: Mutex::new(Vec::new()),
            thread_name: config.thread_name,
        }
    }

    /// Spawn `workers` threads and begin executing queued jobs.
    ///
    /// Starting an already running pool is a no-op.
    pub fn start(&self, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(QueueError::NoWorkers);
        }

        let mut handles = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        if self.shared.running.load(Ordering::Acquire) {
            warn!(workers = handles.len(), "work queue already running");
            return Ok(());
        }

        self.shared.running.store(true, Ordering::Release);
        for index in 0..workers {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", self.thread_name))
                .spawn(move || worker_loop(&shared, index));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    // Unwind the partial start so the pool is left stopped.
                    self.shared.running.store(false, Ordering::Release);
                    self.shutdown(&mut handles);
                    return Err(QueueError::Spawn { index, source });
                }
            }
        }

        info!(workers, "work queue started");
        Ok(())
    }

    /// Queue a job. It runs once a worker is free, provided the pool is started.
    pub fn add<J: Job>(&self, job: J) {
        self.add_boxed(Box::new(job));
    }

    /// Queue an already boxed job.
    ///
    /// On a bounded pool at capacity the oldest pending job is evicted and
    /// its [`Job::discard`] runs on the calling thread.
    pub fn add_boxed(&self, job: Box<dyn Job>) {
        if let Enqueued::Evicted(item) = self.shared.queue.enqueue(WorkItem::Run(job)) {
            // Only jobs occupy the ring; sentinels bypass it.
            if let WorkItem::Run(oldest) = item {
                self.shared.evicted.fetch_add(1, Ordering::Relaxed);
                debug!(job = oldest.name(), "work queue full, oldest job evicted");
                oldest.discard();
            }
        }
    }

    /// Stop all workers, wait for them to exit and discard pending jobs.
    ///
    /// A job already executing finishes first. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut handles = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        let was_running = self.shared.running.swap(false, Ordering::AcqRel);
        self.shutdown(&mut handles);
        if was_running {
            info!("work queue stopped");
        }
    }

    /// Whether workers are currently executing jobs.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Number of live worker threads.
    ///
    /// A worker that stopped the pool from inside one of its jobs is counted
    /// until that job returns and the thread exits.
    pub fn worker_count(&self) -> usize {
        let workers = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let retired = self
            .retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|handle| !handle.is_finished())
            .count();
        workers + retired
    }

    /// Number of jobs waiting for a worker.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// Activity counters since construction.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            executed: self.shared.executed.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
            evicted: self.shared.evicted.load(Ordering::Relaxed),
            panicked: self.shared.panicked.load(Ordering::Relaxed),
            pending: self.pending(),
        }
    }

    fn shutdown(&self, handles: &mut Vec<JoinHandle<()>>) {
        for _ in 0..handles.len() {
            self.shared.queue.enqueue_unbounded(WorkItem::Wake);
        }

        let current = thread::current().id();
        let earlier: Vec<_> = self
            .retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let mut own = None;
        for handle in handles.drain(..).chain(earlier) {
            if handle.thread().id() == current {
                // Stopped from inside a job; this worker exits on its own.
                own = Some(handle);
                continue;
            }
            if handle.join().is_err() {
                error!("work queue worker terminated abnormally");
            }
        }
        if let Some(handle) = own {
            self.retired
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle);
        }

        let mut dropped = 0u64;
        while let Some(item) = self.shared.queue.try_dequeue() {
            if let WorkItem::Run(job) = item {
                job.discard();
                dropped += 1;
            }
        }
        if dropped > 0 {
            self.shared.discarded.fetch_add(dropped, Ordering::Relaxed);
            debug!(dropped, "pending jobs discarded");
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("running", &self.is_running())
            .field("workers", &self.worker_count())
            .field("pending", &self.pending())
            .finish()
    }
}

fn worker_loop(shared: &Shared, index: usize) {
    debug!(worker = index, "worker started");
    loop {
        match shared.queue.dequeue_timeout(IDLE_POLL) {
            Some(WorkItem::Run(job)) => {
                if shared.running.load(Ordering::Acquire) {
                    execute(shared, index, job);
                } else {
                    job.discard();
                    shared.discarded.fetch_add(1, Ordering::Relaxed);
                }
            }
            Some(WorkItem::Wake) | None => {
                if !shared.running.load(Ordering::Acquire) {
                    break;
                }
            }
        }
    }
    debug!(worker = index, "worker exiting");
}

fn execute(shared: &Shared, index: usize, job: Box<dyn Job>) {
    let name = job.name();
    match panic::catch_unwind(AssertUnwindSafe(move || job.run())) {
        Ok(()) => {
            shared.executed.fetch_add(1, Ordering::Relaxed);
        }
        Err(payload) => {
            shared.panicked.fetch_add(1, Ordering::Relaxed);
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            error!(worker = index, job = name, %reason, "job panicked");
        }
    }
}
