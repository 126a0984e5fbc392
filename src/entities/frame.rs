//! Frame handles and load status
//!
//! **Why**: A frame slot is either waiting for its fetch, holds a decoded
//! image, or has failed for good. Renderers only ever look at `Loaded` slots.
//!
//! **Used by**: FrameStore (slot state), Loader (settle results), Surface (drawing)
//!
//! # Status transitions
//!
//! `Pending` → `Loaded` | `Failed`, exactly once per variant instance.
//! There is no way back to `Pending`; a new activation builds a new store.

use image::RgbaImage;
use std::sync::Arc;

/// Frame loading status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Pending, // Fetch not settled yet
    Loaded,  // Decoded image available
    Failed,  // Fetch or decode failed, skipped by the fallback rule
}

impl FrameStatus {
    /// True once the slot can no longer change
    pub fn is_settled(self) -> bool {
        !matches!(self, FrameStatus::Pending)
    }
}

/// Decoded RGBA image shared between the store and the surface.
///
/// Cloning is cheap (Arc), so the renderer can hold a handle while the
/// store keeps its own.
#[derive(Debug, Clone)]
pub struct FrameImage {
    pixels: Arc<RgbaImage>,
}

impl FrameImage {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Zero-sized decodes are treated as failed loads
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Frame fetch errors
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    Io(String),
    Decode(String),
    Empty,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Io(e) => write!(f, "IO error: {}", e),
            FetchError::Decode(e) => write!(f, "Decode error: {}", e),
            FetchError::Empty => write!(f, "Decoded image has zero size"),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_states() {
        assert!(!FrameStatus::Pending.is_settled());
        assert!(FrameStatus::Loaded.is_settled());
        assert!(FrameStatus::Failed.is_settled());
    }

    #[test]
    fn test_empty_image() {
        assert!(FrameImage::from_rgba(RgbaImage::new(0, 10)).is_empty());
        assert!(!FrameImage::from_rgba(RgbaImage::new(4, 2)).is_empty());
    }
}
