//! Two-tier progressive frame loader with epoch-based cancellation
//!
//! **Why**: Hundreds of frames must not delay first paint. A small initial
//! batch is fetched on the priority tier; once every frame in it has settled
//! (loaded or failed) the remainder goes to the background tier.
//!
//! **Used by**: SequenceController (one Loader per active variant)
//!
//! # Settle model
//!
//! Each fetch job sends exactly one `Settle` into the controller's channel,
//! tagged with the loader's epoch. The controller joins them: the initial
//! batch is ready when `settled == |initial|`. Failures count as settled.
//!
//! # Cancellation
//!
//! `cancel()` bumps the shared epoch. Jobs still queued skip their fetch at
//! execution time; settles already in flight carry the old epoch and are
//! discarded by the controller.

use crossbeam_channel::Sender;
use log::{debug, trace};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::fetch::FrameFetcher;
use super::frame_store::FrameStore;
use super::workers::{FetchPool, FetchTier};
use crate::entities::{FetchError, FrameImage};

/// Default size of the priority batch
pub const DEFAULT_INITIAL_BATCH: usize = 30;

/// Partition of `[0, frame_count)` into priority and background ranges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub initial: Range<usize>,
    pub remainder: Range<usize>,
}

impl BatchPlan {
    pub fn new(frame_count: usize, batch_size: usize) -> Self {
        let split = batch_size.max(1).min(frame_count);
        Self {
            initial: 0..split,
            remainder: split..frame_count,
        }
    }
}

/// Result of one fetch, delivered back to the owning controller
#[derive(Debug)]
pub struct Settle {
    pub epoch: u64,
    pub index: usize,
    pub result: Result<FrameImage, FetchError>,
}

/// What a settle meant for batch bookkeeping
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchProgress {
    /// Initial-batch settle with percent complete (0..=100)
    Initial { percent: f64, complete: bool },
    /// Remainder settle, silent
    Background,
}

/// Loader for one variant activation
pub struct Loader {
    plan: BatchPlan,
    epoch: u64,
    current_epoch: Arc<AtomicU64>,
    fetcher: Arc<dyn FrameFetcher>,
    pool: Arc<dyn FetchPool>,
    sink: Sender<Settle>,
    initial_settled: usize,
    remainder_started: bool,
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("plan", &self.plan)
            .field("epoch", &self.epoch)
            .field("initial_settled", &self.initial_settled)
            .field("remainder_started", &self.remainder_started)
            .finish()
    }
}

impl Loader {
    /// Claim a fresh epoch (superseding any previous loader on the same
    /// counter) and submit the initial batch on the priority tier.
    pub fn start(
        store: &FrameStore,
        batch_size: usize,
        current_epoch: Arc<AtomicU64>,
        fetcher: Arc<dyn FrameFetcher>,
        pool: Arc<dyn FetchPool>,
        sink: Sender<Settle>,
    ) -> Self {
        let epoch = current_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let plan = BatchPlan::new(store.len(), batch_size);
        debug!(
            "Loader epoch {} for '{}': initial {:?}, remainder {:?}",
            epoch,
            store.variant_id(),
            plan.initial,
            plan.remainder
        );

        let loader = Self {
            plan,
            epoch,
            current_epoch,
            fetcher,
            pool,
            sink,
            initial_settled: 0,
            remainder_started: false,
        };
        loader.submit(store, loader.plan.initial.clone(), FetchTier::Priority);
        loader
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    /// True while no newer loader (or cancel) has bumped the epoch
    pub fn is_current(&self) -> bool {
        self.current_epoch.load(Ordering::SeqCst) == self.epoch
    }

    pub fn initial_complete(&self) -> bool {
        self.initial_settled >= self.plan.initial.len()
    }

    pub fn remainder_started(&self) -> bool {
        self.remainder_started
    }

    /// Book one settle for this loader.
    pub fn record_settle(&mut self, index: usize) -> BatchProgress {
        if !self.plan.initial.contains(&index) {
            return BatchProgress::Background;
        }
        self.initial_settled = (self.initial_settled + 1).min(self.plan.initial.len());
        let total = self.plan.initial.len();
        BatchProgress::Initial {
            percent: (self.initial_settled * 100) as f64 / total as f64,
            complete: self.initial_settled == total,
        }
    }

    /// Submit the remainder on the background tier. Only once.
    pub fn start_remainder(&mut self, store: &FrameStore) {
        if self.remainder_started {
            return;
        }
        self.remainder_started = true;
        if self.plan.remainder.is_empty() {
            trace!("Loader epoch {}: no remainder", self.epoch);
            return;
        }
        debug!(
            "Loader epoch {}: background fetch of {} frames",
            self.epoch,
            self.plan.remainder.len()
        );
        self.submit(store, self.plan.remainder.clone(), FetchTier::Background);
    }

    /// Supersede this loader. No-op if something newer already did.
    pub fn cancel(&self) {
        if self
            .current_epoch
            .compare_exchange(self.epoch, self.epoch + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            debug!("Loader epoch {} cancelled", self.epoch);
        }
    }

    fn submit(&self, store: &FrameStore, range: Range<usize>, tier: FetchTier) {
        for index in range {
            let Some(url) = store.url(index) else {
                continue;
            };
            let url = url.to_string();
            let epoch = self.epoch;
            let current_epoch = Arc::clone(&self.current_epoch);
            let fetcher = Arc::clone(&self.fetcher);
            let sink = self.sink.clone();

            // Epoch check runs at execution time, not submit time
            self.pool.submit(
                tier,
                Box::new(move || {
                    if current_epoch.load(Ordering::SeqCst) != epoch {
                        return;
                    }
                    let result = fetcher.fetch(&url);
                    // Receiver gone means the controller was dropped
                    let _ = sink.send(Settle { epoch, index, result });
                }),
            );
        }
    }
}
