//! SCRUBSEQ - Scroll-scrubbed image sequence engine
//!
//! Re-exports all modules for use by the binary target.

// Core engine (store, loader, input mapping, rendering, controller)
pub mod core;

// Host-side modules
pub mod cli;
pub mod config;
pub mod entities;

// Re-export commonly used types from core
pub use core::controller::{SequenceController, SequenceOptions, SequenceState, TickHandle};
pub use core::event_bus::{downcast_event, BoxedEvent, EventBus, EventEmitter, SequenceEmitter};
pub use core::frame_store::FrameStore;
pub use core::input::{InputMapper, MappingPolicy};
pub use core::renderer::Renderer;
pub use core::surface::{RgbaSurface, Surface};

// Re-export entities
pub use entities::{FrameImage, FrameStatus, Variant, VariantCatalog};
