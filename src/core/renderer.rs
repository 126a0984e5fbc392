//! Frame renderer - fallback lookup + cover-fit draw
//!
//! **Why**: The requested frame may not be loaded yet. Drawing the nearest
//! earlier loaded frame keeps the surface correct-ish without waiting, and
//! skipping the draw entirely when nothing is ready avoids blank flashes.
//!
//! Remembers the last requested index so resizes and late loads can repaint.

use log::trace;

use super::frame_store::FrameStore;
use super::surface::{cover_fit, Surface};

/// What a draw call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Painted `shown` for request `requested` (shown <= requested)
    Drawn { requested: usize, shown: usize },
    /// Nothing loaded at or before the request; surface untouched
    NoFrame { requested: usize },
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    requested: Option<usize>,
    shown: Option<usize>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget what was requested/shown (new variant). Surface content is kept.
    pub fn reset(&mut self, requested: Option<usize>) {
        self.requested = requested;
        self.shown = None;
    }

    pub fn requested(&self) -> Option<usize> {
        self.requested
    }

    pub fn shown(&self) -> Option<usize> {
        self.shown
    }

    /// Draw `frame_index` (or its fallback) onto `surface`
    pub fn draw(
        &mut self,
        surface: &mut dyn Surface,
        store: &FrameStore,
        frame_index: usize,
    ) -> DrawOutcome {
        self.requested = Some(frame_index);

        let Some((shown, image)) = store.best_available_frame(frame_index) else {
            trace!("No frame ready at or before {}", frame_index);
            return DrawOutcome::NoFrame { requested: frame_index };
        };
        let Some(rect) = cover_fit(surface.size(), (image.width(), image.height())) else {
            return DrawOutcome::NoFrame { requested: frame_index };
        };

        surface.clear();
        surface.draw_image(image, rect);
        self.shown = Some(shown);

        if shown != frame_index {
            trace!("Frame {} not ready, showing {}", frame_index, shown);
        }
        DrawOutcome::Drawn {
            requested: frame_index,
            shown,
        }
    }

    /// Repaint the last request (after resize). None if nothing was requested yet.
    pub fn redraw(&mut self, surface: &mut dyn Surface, store: &FrameStore) -> Option<DrawOutcome> {
        let requested = self.requested?;
        Some(self.draw(surface, store, requested))
    }

    /// True if a newly loaded `index` would beat what is on screen for the current request
    pub fn improves(&self, index: usize) -> bool {
        match self.requested {
            Some(requested) if index <= requested => self.shown.is_none_or(|shown| shown < index),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::surface::{DrawRect, RgbaSurface};
    use crate::entities::{FrameImage, Variant};
    use image::RgbaImage;

    /// Records draw calls instead of painting
    #[derive(Default)]
    struct RecordingSurface {
        size: (u32, u32),
        clears: usize,
        draws: Vec<(u32, DrawRect)>,
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            self.size
        }
        fn resize(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }
        fn clear(&mut self) {
            self.clears += 1;
        }
        fn draw_image(&mut self, image: &FrameImage, rect: DrawRect) {
            // Image width doubles as its identity in these tests
            self.draws.push((image.width(), rect));
        }
    }

    fn store_with(n: usize, loaded: &[usize]) -> FrameStore {
        let mut s = FrameStore::new(&Variant::new("r", "", "r_000.png", n).unwrap());
        for &i in loaded {
            s.mark_loaded(i, FrameImage::from_rgba(RgbaImage::new(i as u32 + 1, 10)));
        }
        s
    }

    #[test]
    fn test_noop_when_nothing_ready() {
        let store = store_with(10, &[5]);
        let mut surface = RecordingSurface { size: (100, 100), ..Default::default() };
        let mut r = Renderer::new();

        assert_eq!(r.draw(&mut surface, &store, 3), DrawOutcome::NoFrame { requested: 3 });
        assert_eq!(surface.clears, 0);
        assert!(surface.draws.is_empty());
        assert_eq!(r.requested(), Some(3));
    }

    #[test]
    fn test_draws_fallback_frame() {
        let store = store_with(10, &[0, 2]);
        let mut surface = RecordingSurface { size: (100, 100), ..Default::default() };
        let mut r = Renderer::new();

        assert_eq!(r.draw(&mut surface, &store, 7), DrawOutcome::Drawn { requested: 7, shown: 2 });
        assert_eq!(surface.clears, 1);
        assert_eq!(surface.draws[0].0, 3);
    }

    #[test]
    fn test_redraw_uses_last_request_and_new_size() {
        let store = store_with(4, &[1]);
        let mut surface = RecordingSurface { size: (100, 100), ..Default::default() };
        let mut r = Renderer::new();
        assert!(r.redraw(&mut surface, &store).is_none());

        r.draw(&mut surface, &store, 3);
        surface.resize(400, 100);
        assert_eq!(
            r.redraw(&mut surface, &store),
            Some(DrawOutcome::Drawn { requested: 3, shown: 1 })
        );

        let rect = surface.draws.last().unwrap().1;
        assert!(rect.size.x >= 400.0 - 1e-3);
    }

    #[test]
    fn test_improves() {
        let store = store_with(10, &[1]);
        let mut surface = RgbaSurface::new(8, 8);
        let mut r = Renderer::new();
        assert!(!r.improves(0));

        r.reset(Some(0));
        assert!(r.improves(0));

        r.draw(&mut surface, &store, 5);
        assert!(!r.improves(0));
        assert!(!r.improves(1));
        assert!(r.improves(4));
        assert!(!r.improves(6));
    }
}
