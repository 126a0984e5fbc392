//! Sequence controller - lifecycle of one active variant
//!
//! **Architecture**: The controller exclusively owns the active FrameStore,
//! the InputMapper and the Renderer. Fetch results arrive as `Settle`
//! messages and are applied on the controller's thread in `pump()`, so the
//! store never has a concurrent writer.
//!
//! # States
//!
//! - `Idle`: nothing mounted (initially, and after teardown)
//! - `LoadingInitialBatch`: priority frames in flight, input ignored
//! - `Ready`: input drives the playhead
//!
//! Any `activate()` goes back to `LoadingInitialBatch`, including mid-pursuit.
//!
//! # Staleness
//!
//! Settles carry the loader epoch; pursuit ticks carry a `TickHandle`
//! generation. Both are compared against the live values and dropped on
//! mismatch, so nothing from a superseded variant can touch the new store.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace, warn};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use super::event_bus::{EventBus, SequenceEmitter};
use super::fetch::FrameFetcher;
use super::frame_store::FrameStore;
use super::input::{InputMapper, MapUpdate, MappingPolicy, Playhead};
use super::loader::{BatchProgress, Loader, Settle, DEFAULT_INITIAL_BATCH};
use super::renderer::Renderer;
use super::sequence_events::{
    AnimationComplete, InitialLoadComplete, InitialLoadProgress, SwitchComplete,
};
use super::surface::Surface;
use super::workers::FetchPool;
use crate::entities::Variant;

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Idle,
    LoadingInitialBatch,
    Ready,
}

/// Engine tunables for one controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceOptions {
    pub initial_batch: usize,
    pub mapping: MappingPolicy,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            initial_batch: DEFAULT_INITIAL_BATCH,
            mapping: MappingPolicy::default(),
        }
    }
}

/// Permission to run one pursuit step. Returned by `on_wheel()` when a
/// pursuit starts and by `tick()` while it continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle {
    generation: u64,
}

/// Owned state of the active variant, replaced wholesale on activation
#[derive(Debug)]
struct ActiveSequence {
    variant: Variant,
    store: FrameStore,
    loader: Loader,
}

pub struct SequenceController {
    options: SequenceOptions,
    fetcher: Arc<dyn FrameFetcher>,
    pool: Arc<dyn FetchPool>,
    epoch: Arc<AtomicU64>,
    settle_tx: Sender<Settle>,
    settle_rx: Receiver<Settle>,
    emitter: SequenceEmitter,

    state: SequenceState,
    active: Option<ActiveSequence>,
    mapper: InputMapper,
    renderer: Renderer,

    pursuit_generation: u64,
    tick_scheduled: bool,
    initial_done: bool,
    progress_reported: f64,
    torn_down: bool,
}

impl SequenceController {
    pub fn new(
        options: SequenceOptions,
        fetcher: Arc<dyn FrameFetcher>,
        pool: Arc<dyn FetchPool>,
        bus: &EventBus,
    ) -> Self {
        let (settle_tx, settle_rx) = unbounded();
        info!(
            "SequenceController created: batch={}, mapping={:?}",
            options.initial_batch, options.mapping
        );

        Self {
            options,
            fetcher,
            pool,
            epoch: Arc::new(AtomicU64::new(0)),
            settle_tx,
            settle_rx,
            emitter: SequenceEmitter::from_emitter(bus.emitter()),
            state: SequenceState::Idle,
            active: None,
            mapper: InputMapper::new(options.mapping, 1),
            renderer: Renderer::new(),
            pursuit_generation: 0,
            tick_scheduled: false,
            initial_done: false,
            progress_reported: 0.0,
            torn_down: false,
        }
    }

    // === Accessors ===

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn variant(&self) -> Option<&Variant> {
        self.active.as_ref().map(|a| &a.variant)
    }

    pub fn store(&self) -> Option<&FrameStore> {
        self.active.as_ref().map(|a| &a.store)
    }

    pub fn playhead(&self) -> Playhead {
        self.mapper.playhead()
    }

    pub fn frame(&self) -> usize {
        self.mapper.frame()
    }

    /// Frame currently on the surface (may be a fallback)
    pub fn shown_frame(&self) -> Option<usize> {
        self.renderer.shown()
    }

    pub fn is_complete(&self) -> bool {
        self.mapper.is_complete()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn options(&self) -> SequenceOptions {
        self.options
    }

    // === Lifecycle ===

    /// Mount `variant`, or switch to it. Discards the previous store and any
    /// in-flight loads and pursuit, resets the playhead to frame 0.
    pub fn activate(&mut self, variant: Variant) {
        if self.torn_down {
            warn!("activate('{}') after teardown, ignored", variant.id());
            return;
        }

        if let Some(previous) = self.active.take() {
            previous.loader.cancel();
            info!("Switching variant '{}' -> '{}'", previous.variant.id(), variant.id());
        } else {
            info!("Mounting variant '{}' ({} frames)", variant.id(), variant.frame_count());
        }

        self.cancel_pursuit();
        self.mapper.reset(variant.frame_count());
        self.renderer.reset(Some(0));
        self.state = SequenceState::LoadingInitialBatch;
        self.emitter.emit(AnimationComplete { complete: false });

        let store = FrameStore::new(&variant);
        let loader = Loader::start(
            &store,
            self.options.initial_batch,
            Arc::clone(&self.epoch),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.pool),
            self.settle_tx.clone(),
        );
        self.active = Some(ActiveSequence { variant, store, loader });
    }

    /// Cancel everything and detach listeners. The controller stays inert.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        if let Some(active) = self.active.take() {
            active.loader.cancel();
            info!("Teardown: dropped variant '{}'", active.variant.id());
        }
        self.cancel_pursuit();
        self.state = SequenceState::Idle;
        self.emitter.detach();
        self.torn_down = true;

        let dropped = self.settle_rx.try_iter().count();
        if dropped > 0 {
            trace!("Teardown: discarded {} pending settles", dropped);
        }
    }

    // === Loading ===

    /// Apply every settle that has arrived. Returns how many were processed.
    pub fn pump(&mut self, surface: &mut dyn Surface) -> usize {
        let mut processed = 0;
        while let Ok(settle) = self.settle_rx.try_recv() {
            self.apply_settle(surface, settle);
            processed += 1;
        }
        processed
    }

    /// Block up to `timeout` for at least one settle, then drain the rest.
    pub fn pump_blocking(&mut self, surface: &mut dyn Surface, timeout: Duration) -> usize {
        match self.settle_rx.recv_timeout(timeout) {
            Ok(settle) => {
                self.apply_settle(surface, settle);
                1 + self.pump(surface)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn apply_settle(&mut self, surface: &mut dyn Surface, settle: Settle) {
        let Some(active) = self.active.as_mut() else {
            trace!("Settle for frame {} with no active variant, ignored", settle.index);
            return;
        };
        if settle.epoch != active.loader.epoch() {
            trace!(
                "Stale settle (epoch {} != {}) for frame {}, ignored",
                settle.epoch,
                active.loader.epoch(),
                settle.index
            );
            return;
        }

        let index = settle.index;
        let (transitioned, loaded) = match settle.result {
            Ok(image) if !image.is_empty() => (active.store.mark_loaded(index, image), true),
            Ok(_) => {
                debug!("Frame {} decoded with zero size, marking failed", index);
                (active.store.mark_failed(index), false)
            }
            Err(e) => {
                debug!("Frame {} failed: {}", index, e);
                (active.store.mark_failed(index), false)
            }
        };
        if !transitioned {
            return;
        }

        if let BatchProgress::Initial { percent, complete } = active.loader.record_settle(index) {
            if !self.initial_done {
                self.report_progress(percent);
            }
            if complete {
                self.on_initial_batch_ready();
            }
        }

        // Progressive paint: a better fallback for the current request just arrived
        if loaded && self.renderer.improves(index) {
            if let Some(active) = &self.active {
                self.renderer.redraw(surface, &active.store);
            }
        }
    }

    fn report_progress(&mut self, percent: f64) {
        let percent = percent.clamp(0.0, 100.0).max(self.progress_reported);
        self.progress_reported = percent;
        self.emitter.emit(InitialLoadProgress { percent });
    }

    fn on_initial_batch_ready(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.loader.start_remainder(&active.store);
        self.state = SequenceState::Ready;

        let variant_id = active.variant.id().to_string();
        info!(
            "Variant '{}' ready ({} loaded, {} failed)",
            variant_id,
            active.store.loaded_count(),
            active.store.failed_count()
        );
        if self.initial_done {
            self.emitter.emit(SwitchComplete { variant_id });
        } else {
            self.initial_done = true;
            self.emitter.emit(InitialLoadComplete { variant_id });
        }
    }

    // === Input ===

    fn accepting_input(&self) -> bool {
        if self.torn_down || self.state != SequenceState::Ready {
            trace!("Input ignored in state {:?}", self.state);
            return false;
        }
        true
    }

    /// Absolute policy: page scroll offset
    pub fn on_scroll(
        &mut self,
        surface: &mut dyn Surface,
        offset: f64,
        scroll_height: f64,
        viewport_height: f64,
    ) -> Option<MapUpdate> {
        if !self.accepting_input() {
            return None;
        }
        let update = self.mapper.on_scroll(offset, scroll_height, viewport_height)?;
        self.apply_update(surface, update);
        Some(update)
    }

    /// External/Absolute policy: caller-computed progress in [0, 1]
    pub fn on_progress(&mut self, surface: &mut dyn Surface, progress: f64) -> Option<MapUpdate> {
        if !self.accepting_input() {
            return None;
        }
        let update = self.mapper.on_progress(progress)?;
        self.apply_update(surface, update);
        Some(update)
    }

    /// Damped policy: wheel delta. Returns a handle when a new pursuit loop
    /// must be scheduled; None if one is already running or none is needed.
    pub fn on_wheel(&mut self, surface: &mut dyn Surface, delta: f64) -> Option<TickHandle> {
        if !self.accepting_input() {
            return None;
        }
        let update = self.mapper.on_wheel(delta)?;
        self.apply_update(surface, update);

        if update.pursuing && !self.tick_scheduled {
            self.tick_scheduled = true;
            return Some(TickHandle {
                generation: self.pursuit_generation,
            });
        }
        None
    }

    /// One pursuit step (call once per display refresh). Returns the handle
    /// for the next step, or None once converged or if `handle` is stale.
    pub fn tick(&mut self, surface: &mut dyn Surface, handle: TickHandle) -> Option<TickHandle> {
        if handle.generation != self.pursuit_generation || !self.tick_scheduled {
            trace!("Stale tick (generation {}), ignored", handle.generation);
            return None;
        }
        let Some(outcome) = self.mapper.step() else {
            self.tick_scheduled = false;
            return None;
        };

        if outcome.frame_changed {
            self.draw_current(surface);
        }
        if outcome.converged {
            self.emitter.emit(AnimationComplete {
                complete: outcome.complete,
            });
            self.tick_scheduled = false;
            return None;
        }
        Some(handle)
    }

    /// True while a pursuit loop is scheduled
    pub fn pursuit_pending(&self) -> bool {
        self.tick_scheduled
    }

    fn cancel_pursuit(&mut self) {
        if self.tick_scheduled {
            debug!("Cancelling pursuit (generation {})", self.pursuit_generation);
        }
        self.pursuit_generation += 1;
        self.tick_scheduled = false;
        self.mapper.cancel_pursuit();
    }

    fn apply_update(&mut self, surface: &mut dyn Surface, update: MapUpdate) {
        if update.frame_changed {
            self.draw_current(surface);
        }
        self.emitter.emit(AnimationComplete {
            complete: update.complete,
        });
    }

    fn draw_current(&mut self, surface: &mut dyn Surface) {
        if let Some(active) = &self.active {
            self.renderer.draw(surface, &active.store, self.mapper.frame());
        }
    }

    // === Viewport ===

    /// Resize the surface and repaint the last requested frame
    pub fn on_resize(&mut self, surface: &mut dyn Surface, width: u32, height: u32) {
        if self.torn_down {
            return;
        }
        surface.resize(width, height);
        if let Some(active) = &self.active {
            self.renderer.redraw(surface, &active.store);
        }
    }
}

impl Drop for SequenceController {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.loader.cancel();
        }
    }
}
