//! Core engine modules - frame store, loader, input mapping, rendering
//!
//! These modules form the scrubbing engine, independent of any host UI.

pub mod controller;
pub mod event_bus;
pub mod fetch;
pub mod frame_store;
pub mod input;
pub mod loader;
pub mod renderer;
pub mod sequence_events;
pub mod surface;
pub mod workers;

// Re-exports for convenience
pub use controller::{SequenceController, SequenceOptions, SequenceState, TickHandle};
pub use event_bus::EventBus;
pub use fetch::{FileFetcher, FrameFetcher};
pub use frame_store::FrameStore;
pub use input::{InputMapper, MappingPolicy};
pub use loader::{BatchPlan, Loader};
pub use renderer::Renderer;
pub use surface::{RgbaSurface, Surface};
pub use workers::{FetchPool, FetchTier, InlinePool, Workers};
