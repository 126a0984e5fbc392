//! Entities module - plain data types shared by the engine and its hosts
//!
//! - `Variant`: one asset set (URL template + frame count)
//! - `FrameImage` / `FrameStatus`: per-frame decoded handle and load state

pub mod frame;
pub mod variant;

pub use frame::{FetchError, FrameImage, FrameStatus};
pub use variant::{Variant, VariantCatalog, VariantError, FRAME_PLACEHOLDER};
