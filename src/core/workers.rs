//! Fetch thread pool with two priority tiers
//!
//! - `Priority` queue: the initial batch, always drained first
//! - `Background` queue: the remainder, picked up only when no priority work is waiting
//!
//! Cancellation is not the pool's job: jobs submitted by a `Loader` carry their
//! own epoch check and turn into no-ops once the loader is superseded.

use crossbeam::deque::Injector;
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling tier for a fetch job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTier {
    Priority,
    Background,
}

/// Abstract pool interface, so hosts without threads can run fetches inline.
pub trait FetchPool: Send + Sync {
    fn submit(&self, tier: FetchTier, job: Job);
}

/// Runs every job immediately on the calling thread.
///
/// For single-threaded hosts and deterministic tests. Settles still go
/// through the controller's channel, so ordering is the submit order.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlinePool;

impl FetchPool for InlinePool {
    fn submit(&self, _tier: FetchTier, job: Job) {
        job();
    }
}

/// Background worker threads pulling from two shared queues.
pub struct Workers {
    priority: Arc<Injector<Job>>,
    background: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` fetch workers (at least one).
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let priority: Arc<Injector<Job>> = Arc::new(Injector::new());
        let background: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let handles = (0..num_threads)
            .map(|worker_id| {
                let priority = Arc::clone(&priority);
                let background = Arc::clone(&background);
                let shutdown = Arc::clone(&shutdown);

                thread::Builder::new()
                    .name(format!("scrubseq-fetch-{}", worker_id))
                    .spawn(move || {
                        trace!("Fetch worker {} started", worker_id);
                        loop {
                            if let Some(job) = priority.steal().success() {
                                job();
                                continue;
                            }
                            if let Some(job) = background.steal().success() {
                                job();
                                continue;
                            }
                            if shutdown.load(Ordering::Relaxed) {
                                break;
                            }
                            thread::sleep(Duration::from_millis(1));
                        }
                        trace!("Fetch worker {} stopped", worker_id);
                    })
                    .expect("Failed to spawn fetch worker thread")
            })
            .collect::<Vec<_>>();

        trace!("Workers initialized: {} fetch threads", num_threads);

        Self {
            priority,
            background,
            handles,
            shutdown,
        }
    }

    /// Default size: 75% of cores, leaving room for the host's main loop
    pub fn default_threads() -> usize {
        (num_cpus::get() * 3 / 4).max(1)
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }

    /// Jobs waiting in both queues (approximate under concurrency)
    pub fn queued(&self) -> usize {
        self.priority.len() + self.background.len()
    }
}

impl FetchPool for Workers {
    fn submit(&self, tier: FetchTier, job: Job) {
        match tier {
            FetchTier::Priority => self.priority.push(job),
            FetchTier::Background => self.background.push(job),
        }
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);
        self.shutdown.store(true, Ordering::SeqCst);

        // Workers drain the queues before exiting; cancelled loader jobs are
        // no-ops, so this is quick. Past the deadline threads die with the process.
        let deadline = Instant::now() + Duration::from_millis(500);
        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
        trace!("All {} fetch workers stopped", num_threads);
    }
}
