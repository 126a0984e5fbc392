//! Input mapping - scroll / wheel / external progress to frame index
//!
//! Three interchangeable policies:
//! - `Absolute`: scroll offset over scrollable range, snap-exact
//! - `Damped`: accumulated wheel deltas, pointer chases the target each tick
//! - `External`: caller supplies normalized progress, snap-exact
//!
//! # Damped pursuit
//!
//! `pointer += (target - pointer) * (1 - damping)` per tick. No velocity
//! term, so it never overshoots and a new wheel event just moves the target.
//! The step reports convergence once `|target - pointer| <= epsilon`, after
//! snapping the pointer exactly onto the target.

use log::trace;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SENSITIVITY: f64 = 4000.0;
pub const DEFAULT_DAMPING: f64 = 0.85;
pub const DEFAULT_EPSILON: f64 = 0.01;

fn default_sensitivity() -> f64 {
    DEFAULT_SENSITIVITY
}

fn default_damping() -> f64 {
    DEFAULT_DAMPING
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

/// How raw input becomes a frame index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MappingPolicy {
    /// Scroll offset / (scroll height - viewport height)
    Absolute,
    /// Wheel deltas accumulated into virtual progress, damped pursuit
    Damped {
        /// Wheel delta units that span the whole sequence
        #[serde(default = "default_sensitivity")]
        sensitivity: f64,
        /// Fraction of remaining distance kept per tick, in [0, 1)
        #[serde(default = "default_damping")]
        damping: f64,
        /// Convergence threshold in frames
        #[serde(default = "default_epsilon")]
        epsilon: f64,
    },
    /// Normalized progress computed by the caller
    External,
}

impl Default for MappingPolicy {
    fn default() -> Self {
        MappingPolicy::Damped {
            sensitivity: DEFAULT_SENSITIVITY,
            damping: DEFAULT_DAMPING,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl MappingPolicy {
    /// Clamp tunables into their valid ranges
    pub fn sanitized(self) -> Self {
        match self {
            MappingPolicy::Damped {
                sensitivity,
                damping,
                epsilon,
            } => MappingPolicy::Damped {
                sensitivity: if sensitivity.is_finite() && sensitivity > 0.0 {
                    sensitivity
                } else {
                    DEFAULT_SENSITIVITY
                },
                damping: if damping.is_finite() {
                    damping.clamp(0.0, 0.999)
                } else {
                    DEFAULT_DAMPING
                },
                epsilon: if epsilon.is_finite() && epsilon > 0.0 {
                    epsilon
                } else {
                    DEFAULT_EPSILON
                },
            },
            other => other,
        }
    }

    pub fn is_damped(&self) -> bool {
        matches!(self, MappingPolicy::Damped { .. })
    }
}

/// Current position within the active variant
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Playhead {
    /// Last normalized progress (Absolute / External)
    pub progress: f64,
    /// Accumulated wheel progress (Damped)
    pub virtual_progress: f64,
    /// Pursuit target in frames
    pub target: f64,
    /// Rendered pointer in frames, lags target under damping
    pub pointer: f64,
    /// Frame index last handed out
    pub frame: usize,
}

/// Result of one input event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapUpdate {
    pub frame: usize,
    pub frame_changed: bool,
    pub complete: bool,
    /// Damped only: pointer still has to chase the target
    pub pursuing: bool,
}

/// Result of one pursuit step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub frame: usize,
    pub frame_changed: bool,
    pub complete: bool,
    pub converged: bool,
}

/// Maps input to frame indices for one variant. Knows nothing about the store.
#[derive(Debug, Clone)]
pub struct InputMapper {
    policy: MappingPolicy,
    frame_count: usize,
    playhead: Playhead,
    pursuing: bool,
}

impl InputMapper {
    pub fn new(policy: MappingPolicy, frame_count: usize) -> Self {
        Self {
            policy: policy.sanitized(),
            frame_count: frame_count.max(1),
            playhead: Playhead::default(),
            pursuing: false,
        }
    }

    /// Back to frame 0 for a (possibly different) frame count
    pub fn reset(&mut self, frame_count: usize) {
        self.frame_count = frame_count.max(1);
        self.playhead = Playhead::default();
        self.pursuing = false;
    }

    pub fn policy(&self) -> MappingPolicy {
        self.policy
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn playhead(&self) -> Playhead {
        self.playhead
    }

    pub fn frame(&self) -> usize {
        self.playhead.frame
    }

    pub fn is_pursuing(&self) -> bool {
        self.pursuing
    }

    /// Drop an in-flight pursuit, leaving the pointer where it is
    pub fn cancel_pursuit(&mut self) {
        self.pursuing = false;
    }

    fn last_frame(&self) -> usize {
        self.frame_count - 1
    }

    /// Terminal position reached for the current policy
    pub fn is_complete(&self) -> bool {
        match self.policy {
            MappingPolicy::Damped { .. } => self.playhead.pointer >= self.last_frame() as f64,
            _ => self.playhead.progress >= 1.0,
        }
    }

    /// Absolute policy: scroll offset within a page of `scroll_height`
    /// shown through a viewport of `viewport_height`.
    pub fn on_scroll(
        &mut self,
        offset: f64,
        scroll_height: f64,
        viewport_height: f64,
    ) -> Option<MapUpdate> {
        if self.policy != MappingPolicy::Absolute {
            trace!("Scroll ignored under {:?}", self.policy);
            return None;
        }
        let range = scroll_height - viewport_height;
        if !(range > 0.0) || !offset.is_finite() {
            trace!(
                "Degenerate scroll range {}, holding progress {}",
                range,
                self.playhead.progress
            );
            return None;
        }
        Some(self.apply_progress((offset / range).clamp(0.0, 1.0)))
    }

    /// External (or Absolute) policy: caller-computed progress in [0, 1]
    pub fn on_progress(&mut self, progress: f64) -> Option<MapUpdate> {
        if self.policy.is_damped() {
            trace!("External progress ignored under damped policy");
            return None;
        }
        if !progress.is_finite() {
            return None;
        }
        Some(self.apply_progress(progress.clamp(0.0, 1.0)))
    }

    fn apply_progress(&mut self, progress: f64) -> MapUpdate {
        let frame = ((progress * self.frame_count as f64).floor() as usize).min(self.last_frame());
        let frame_changed = frame != self.playhead.frame;

        self.playhead.progress = progress;
        self.playhead.target = frame as f64;
        self.playhead.pointer = frame as f64;
        self.playhead.frame = frame;

        MapUpdate {
            frame,
            frame_changed,
            complete: self.is_complete(),
            pursuing: false,
        }
    }

    /// Damped policy: one wheel event. Retargets the pursuit.
    pub fn on_wheel(&mut self, delta: f64) -> Option<MapUpdate> {
        let MappingPolicy::Damped {
            sensitivity, epsilon, ..
        } = self.policy
        else {
            trace!("Wheel ignored under {:?}", self.policy);
            return None;
        };
        if !delta.is_finite() {
            return None;
        }

        let v = (self.playhead.virtual_progress + delta / sensitivity).clamp(0.0, 1.0);
        self.playhead.virtual_progress = v;
        self.playhead.target = v * self.last_frame() as f64;

        let mut frame_changed = false;
        if (self.playhead.target - self.playhead.pointer).abs() > epsilon {
            self.pursuing = true;
        } else {
            // Already within epsilon: settle without ticking
            self.playhead.pointer = self.playhead.target;
            self.pursuing = false;
            frame_changed = self.sync_frame();
        }

        Some(MapUpdate {
            frame: self.playhead.frame,
            frame_changed,
            complete: self.is_complete(),
            pursuing: self.pursuing,
        })
    }

    /// One pursuit step. None when nothing is being pursued.
    pub fn step(&mut self) -> Option<TickOutcome> {
        let MappingPolicy::Damped { damping, epsilon, .. } = self.policy else {
            return None;
        };
        if !self.pursuing {
            return None;
        }

        let target = self.playhead.target;
        let from = self.playhead.pointer;
        let mut pointer = from + (target - from) * (1.0 - damping);
        let converged = (target - pointer).abs() <= epsilon;
        if converged {
            pointer = target;
            self.pursuing = false;
        }
        self.playhead.pointer = pointer;
        let frame_changed = self.sync_frame();

        Some(TickOutcome {
            frame: self.playhead.frame,
            frame_changed,
            complete: self.is_complete(),
            converged,
        })
    }

    fn sync_frame(&mut self) -> bool {
        let frame = (self.playhead.pointer.round().max(0.0) as usize).min(self.last_frame());
        let changed = frame != self.playhead.frame;
        self.playhead.frame = frame;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn damped(sensitivity: f64, damping: f64) -> MappingPolicy {
        MappingPolicy::Damped {
            sensitivity,
            damping,
            epsilon: 0.01,
        }
    }

    #[test]
    fn test_scroll_scenario_midpoint() {
        let mut m = InputMapper::new(MappingPolicy::Absolute, 200);
        let u = m.on_scroll(1500.0, 4000.0, 1000.0).unwrap();
        assert_eq!(u.frame, 100);
        assert!(u.frame_changed);
        assert!(!u.complete);
        assert_eq!(m.playhead().progress, 0.5);
    }

    #[test]
    fn test_scroll_clamps_to_terminal_frame() {
        for s in [3000.0, 3000.5, 9999.0] {
            let mut m = InputMapper::new(MappingPolicy::Absolute, 200);
            let u = m.on_scroll(s, 4000.0, 1000.0).unwrap();
            assert_eq!(u.frame, 199);
            assert!(u.complete);
        }
    }

    #[test]
    fn test_scroll_at_or_below_zero() {
        let mut m = InputMapper::new(MappingPolicy::Absolute, 200);
        m.on_scroll(2000.0, 4000.0, 1000.0);
        for s in [0.0, -50.0] {
            assert_eq!(m.on_scroll(s, 4000.0, 1000.0).unwrap().frame, 0);
        }
    }

    #[test]
    fn test_degenerate_range_holds_progress() {
        let mut m = InputMapper::new(MappingPolicy::Absolute, 10);
        m.on_scroll(250.0, 1500.0, 1000.0);
        let before = m.playhead();
        assert!(m.on_scroll(100.0, 800.0, 1000.0).is_none());
        assert!(m.on_scroll(100.0, 1000.0, 1000.0).is_none());
        assert_eq!(m.playhead(), before);
    }

    #[test]
    fn test_redraw_only_on_index_change() {
        let mut m = InputMapper::new(MappingPolicy::Absolute, 10);
        assert!(m.on_scroll(310.0, 2000.0, 1000.0).unwrap().frame_changed);
        // 0.31 and 0.35 both floor to frame 3
        assert!(!m.on_scroll(350.0, 2000.0, 1000.0).unwrap().frame_changed);
    }

    #[test]
    fn test_external_progress() {
        let mut m = InputMapper::new(MappingPolicy::External, 100);
        assert_eq!(m.on_progress(0.5).unwrap().frame, 50);
        assert_eq!(m.on_progress(1.7).unwrap().frame, 99);
        assert!(m.is_complete());
        assert!(m.on_progress(f64::NAN).is_none());
        assert!(m.on_scroll(10.0, 100.0, 10.0).is_none());
        assert!(m.on_wheel(10.0).is_none());
    }

    #[test]
    fn test_wheel_accumulates_and_clamps() {
        let mut m = InputMapper::new(damped(1000.0, 0.5), 101);
        let u = m.on_wheel(500.0).unwrap();
        assert!(u.pursuing);
        assert_eq!(m.playhead().target, 50.0);

        m.on_wheel(10_000.0);
        assert_eq!(m.playhead().virtual_progress, 1.0);
        assert_eq!(m.playhead().target, 100.0);

        m.on_wheel(-50_000.0);
        assert_eq!(m.playhead().virtual_progress, 0.0);
        assert!(m.on_progress(0.3).is_none());
    }

    #[test]
    fn test_pursuit_monotonic_no_overshoot_and_bounded() {
        for damping in [0.0, 0.3, 0.85, 0.95] {
            let mut m = InputMapper::new(damped(100.0, damping), 101);
            m.on_wheel(80.0);
            let target = m.playhead().target;
            let distance = target - m.playhead().pointer;

            let bound = if damping == 0.0 {
                1
            } else {
                ((0.01 / distance).ln() / damping.ln()).ceil() as usize + 1
            };

            let mut prev = m.playhead().pointer;
            let mut ticks = 0;
            loop {
                let out = m.step().unwrap();
                ticks += 1;
                let p = m.playhead().pointer;
                assert!(p > prev, "pointer must strictly advance");
                assert!(p <= target, "pointer must not overshoot");
                prev = p;
                if out.converged {
                    break;
                }
                assert!(ticks <= bound);
            }
            assert!(ticks <= bound);
            assert_eq!(m.playhead().pointer, target);
            assert_eq!(m.frame(), 80);
            assert!(m.step().is_none());
        }
    }

    #[test]
    fn test_retarget_mid_pursuit_is_continuous() {
        let mut m = InputMapper::new(damped(100.0, 0.8), 101);
        m.on_wheel(100.0);
        for _ in 0..5 {
            m.step();
        }
        let mid = m.playhead().pointer;
        assert!(mid > 0.0 && mid < 100.0);

        // Reverse: pointer stays put, only the target moves
        m.on_wheel(-80.0);
        assert_eq!(m.playhead().pointer, mid);
        assert!((m.playhead().target - 20.0).abs() < 1e-9);

        while !m.step().unwrap().converged {}
        assert_eq!(m.frame(), 20);
    }

    #[test]
    fn test_damped_completion() {
        let mut m = InputMapper::new(damped(100.0, 0.5), 50);
        let u = m.on_wheel(500.0).unwrap();
        assert!(!u.complete);
        let mut last = None;
        while let Some(out) = m.step() {
            last = Some(out);
        }
        let last = last.unwrap();
        assert!(last.converged && last.complete);
        assert_eq!(last.frame, 49);
    }

    #[test]
    fn test_tiny_wheel_settles_without_pursuit() {
        let mut m = InputMapper::new(damped(100_000.0, 0.5), 11);
        let u = m.on_wheel(1.0).unwrap();
        assert!(!u.pursuing);
        assert_eq!(m.playhead().pointer, m.playhead().target);
    }

    #[test]
    fn test_reset_and_single_frame() {
        let mut m = InputMapper::new(MappingPolicy::Absolute, 10);
        m.on_scroll(900.0, 2000.0, 1000.0);
        m.reset(1);
        assert_eq!(m.playhead(), Playhead::default());
        assert_eq!(m.on_scroll(500.0, 2000.0, 1000.0).unwrap().frame, 0);
    }

    #[test]
    fn test_sanitize_and_serde() {
        let p = MappingPolicy::Damped { sensitivity: -1.0, damping: 1.5, epsilon: 0.0 }.sanitized();
        assert_eq!(
            p,
            MappingPolicy::Damped {
                sensitivity: DEFAULT_SENSITIVITY,
                damping: 0.999,
                epsilon: DEFAULT_EPSILON,
            }
        );

        let parsed: MappingPolicy =
            serde_json::from_str(r#"{"mode":"damped","damping":0.5}"#).unwrap();
        assert_eq!(
            parsed,
            MappingPolicy::Damped {
                sensitivity: DEFAULT_SENSITIVITY,
                damping: 0.5,
                epsilon: DEFAULT_EPSILON,
            }
        );
        let abs: MappingPolicy = serde_json::from_str(r#"{"mode":"absolute"}"#).unwrap();
        assert_eq!(abs, MappingPolicy::Absolute);
    }
}
