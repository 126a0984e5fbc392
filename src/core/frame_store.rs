//! Per-variant frame store with monotonic fallback lookup
//!
//! Structure: Vec<FrameSlot>, one slot per frame index.
//! - Slot URL is fixed at construction from the variant template
//! - Status moves Pending -> Loaded | Failed once and never back
//!
//! `best_available_frame()` never returns a frame newer than requested and
//! never waits: it walks back to the nearest earlier loaded slot.

use log::{debug, warn};

use crate::entities::{FrameImage, FrameStatus, Variant};

/// Single frame slot
#[derive(Debug, Clone)]
struct FrameSlot {
    url: String,
    status: FrameStatus,
    image: Option<FrameImage>,
}

/// Frames of one active variant
#[derive(Debug)]
pub struct FrameStore {
    variant_id: String,
    slots: Vec<FrameSlot>,
    loaded: usize,
    failed: usize,
}

impl FrameStore {
    /// Allocate `frame_count` pending slots with their URLs
    pub fn new(variant: &Variant) -> Self {
        let slots = (0..variant.frame_count())
            .map(|i| FrameSlot {
                url: variant.frame_url(i),
                status: FrameStatus::Pending,
                image: None,
            })
            .collect::<Vec<_>>();

        debug!("FrameStore '{}': {} slots", variant.id(), slots.len());

        Self {
            variant_id: variant.id().to_string(),
            slots,
            loaded: 0,
            failed: 0,
        }
    }

    pub fn variant_id(&self) -> &str {
        &self.variant_id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn url(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|s| s.url.as_str())
    }

    pub fn status(&self, index: usize) -> Option<FrameStatus> {
        self.slots.get(index).map(|s| s.status)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded
    }

    pub fn failed_count(&self) -> usize {
        self.failed
    }

    /// Number of slots that are no longer pending
    pub fn settled_count(&self) -> usize {
        self.loaded + self.failed
    }

    /// Transition slot to Loaded. Returns false if out of range or already settled.
    pub fn mark_loaded(&mut self, index: usize, image: FrameImage) -> bool {
        let Some(slot) = self.claim_pending(index) else {
            return false;
        };
        slot.status = FrameStatus::Loaded;
        slot.image = Some(image);
        self.loaded += 1;
        true
    }

    /// Transition slot to Failed. Returns false if out of range or already settled.
    pub fn mark_failed(&mut self, index: usize) -> bool {
        let Some(slot) = self.claim_pending(index) else {
            return false;
        };
        slot.status = FrameStatus::Failed;
        self.failed += 1;
        true
    }

    fn claim_pending(&mut self, index: usize) -> Option<&mut FrameSlot> {
        let variant_id = &self.variant_id;
        let Some(slot) = self.slots.get_mut(index) else {
            warn!("FrameStore '{}': index {} out of range", variant_id, index);
            return None;
        };
        if slot.status.is_settled() {
            warn!(
                "FrameStore '{}': frame {} already {:?}, refusing transition",
                variant_id, index, slot.status
            );
            return None;
        }
        Some(slot)
    }

    /// Highest loaded frame with index <= target, or None.
    ///
    /// Targets past the end are clamped to the last slot.
    pub fn best_available_frame(&self, target: usize) -> Option<(usize, &FrameImage)> {
        if self.slots.is_empty() {
            return None;
        }
        let target = target.min(self.slots.len() - 1);
        self.slots[..=target]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, slot)| match (slot.status, slot.image.as_ref()) {
                (FrameStatus::Loaded, Some(image)) => Some((i, image)),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn store(n: usize) -> FrameStore {
        FrameStore::new(&Variant::new("test", "", "f_000.png", n).unwrap())
    }

    fn img() -> FrameImage {
        FrameImage::from_rgba(RgbaImage::new(2, 2))
    }

    #[test]
    fn test_slot_urls() {
        let s = store(12);
        assert_eq!(s.len(), 12);
        assert_eq!(s.url(0), Some("f_000.png"));
        assert_eq!(s.url(11), Some("f_011.png"));
        assert_eq!(s.url(12), None);
        assert_eq!(s.status(5), Some(FrameStatus::Pending));
    }

    #[test]
    fn test_transitions_are_once_only() {
        let mut s = store(4);
        assert!(s.mark_loaded(1, img()));
        assert!(!s.mark_failed(1));
        assert!(!s.mark_loaded(1, img()));
        assert_eq!(s.status(1), Some(FrameStatus::Loaded));

        assert!(s.mark_failed(2));
        assert!(!s.mark_loaded(2, img()));
        assert_eq!(s.status(2), Some(FrameStatus::Failed));

        assert!(!s.mark_loaded(9, img()));
        assert_eq!(s.loaded_count(), 1);
        assert_eq!(s.failed_count(), 1);
        assert_eq!(s.settled_count(), 2);
    }

    #[test]
    fn test_none_when_nothing_loaded_at_or_before_target() {
        let mut s = store(10);
        assert!(s.best_available_frame(9).is_none());

        s.mark_loaded(5, img());
        assert!(s.best_available_frame(4).is_none());
        assert_eq!(s.best_available_frame(5).map(|(i, _)| i), Some(5));
        assert_eq!(s.best_available_frame(9).map(|(i, _)| i), Some(5));
    }

    #[test]
    fn test_fallback_skips_failed_frames() {
        let mut s = store(10);
        for i in 0..10 {
            if i == 3 {
                s.mark_failed(i);
            } else if i < 5 {
                s.mark_loaded(i, img());
            }
        }
        assert_eq!(s.best_available_frame(3).map(|(i, _)| i), Some(2));
        assert_eq!(s.best_available_frame(5).map(|(i, _)| i), Some(4));
        assert_eq!(s.best_available_frame(8).map(|(i, _)| i), Some(4));
    }

    #[test]
    fn test_fallback_exhaustive_small() {
        // Every subset of loaded frames over 6 slots: result is the max loaded index <= target
        let n = 6;
        for mask in 0u32..(1 << n) {
            let mut s = store(n);
            for i in 0..n {
                if mask & (1 << i) != 0 {
                    s.mark_loaded(i, img());
                }
            }
            for target in 0..n {
                let expected = (0..=target).rev().find(|&i| mask & (1 << i) != 0);
                assert_eq!(s.best_available_frame(target).map(|(i, _)| i), expected);
            }
        }
    }

    #[test]
    fn test_target_past_end_clamps() {
        let mut s = store(3);
        s.mark_loaded(2, img());
        assert_eq!(s.best_available_frame(100).map(|(i, _)| i), Some(2));
    }
}
