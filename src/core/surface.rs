//! Drawing surfaces and cover-fit placement
//!
//! A `Surface` is the host's 2D immediate-mode canvas: it has a pixel size,
//! can be resized, cleared, and can draw an image into a destination rect.
//! `RgbaSurface` is the CPU implementation used by the CLI and tests.

use glam::Vec2;
use image::{Rgba, RgbaImage};

use crate::entities::FrameImage;

/// Destination of a scaled image in surface pixels.
/// May extend past the surface on the overflowing axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub offset: Vec2,
    pub size: Vec2,
    pub scale: f32,
}

/// Uniform scale + centering so the image fully covers the surface.
///
/// `scale = max(cw / iw, ch / ih)`; overflow is cropped evenly on both sides.
pub fn cover_fit(surface: (u32, u32), image: (u32, u32)) -> Option<DrawRect> {
    let (cw, ch) = (surface.0 as f32, surface.1 as f32);
    let (iw, ih) = (image.0 as f32, image.1 as f32);
    if iw <= 0.0 || ih <= 0.0 {
        return None;
    }

    let scale = (cw / iw).max(ch / ih);
    let size = Vec2::new(iw * scale, ih * scale);
    let offset = (Vec2::new(cw, ch) - size) / 2.0;
    Some(DrawRect { offset, size, scale })
}

/// Host drawing surface
pub trait Surface {
    /// Pixel size (width, height)
    fn size(&self) -> (u32, u32);

    /// Set pixel size; content after a resize is unspecified until the next draw
    fn resize(&mut self, width: u32, height: u32);

    fn clear(&mut self);

    fn draw_image(&mut self, image: &FrameImage, rect: DrawRect);
}

/// CPU RGBA canvas with nearest-neighbour sampling
#[derive(Debug, Clone)]
pub struct RgbaSurface {
    pixels: RgbaImage,
}

impl RgbaSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }
}

impl Surface for RgbaSurface {
    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.pixels.dimensions() != (width, height) {
            self.pixels = RgbaImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        for px in self.pixels.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_image(&mut self, image: &FrameImage, rect: DrawRect) {
        if rect.scale <= 0.0 || image.is_empty() {
            return;
        }
        let src = image.pixels();
        let (sw, sh) = src.dimensions();
        let (cw, ch) = self.pixels.dimensions();

        // Destination pixels whose centers fall inside the rect
        let x0 = rect.offset.x.max(0.0).floor() as u32;
        let y0 = rect.offset.y.max(0.0).floor() as u32;
        let x1 = ((rect.offset.x + rect.size.x).ceil().max(0.0) as u32).min(cw);
        let y1 = ((rect.offset.y + rect.size.y).ceil().max(0.0) as u32).min(ch);

        for y in y0..y1 {
            let sy = ((y as f32 + 0.5 - rect.offset.y) / rect.scale).floor();
            if sy < 0.0 || sy >= sh as f32 {
                continue;
            }
            for x in x0..x1 {
                let sx = ((x as f32 + 0.5 - rect.offset.x) / rect.scale).floor();
                if sx < 0.0 || sx >= sw as f32 {
                    continue;
                }
                self.pixels.put_pixel(x, y, *src.get_pixel(sx as u32, sy as u32));
            }
        }
    }
}
