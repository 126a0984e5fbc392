//! Lifecycle events emitted by `SequenceController`

/// First variant's initial batch progress, 0..=100, never decreasing
#[derive(Clone, Debug, PartialEq)]
pub struct InitialLoadProgress {
    pub percent: f64,
}

/// First variant's initial batch has settled. Emitted once per controller.
#[derive(Clone, Debug, PartialEq)]
pub struct InitialLoadComplete {
    pub variant_id: String,
}

/// A later variant's initial batch has settled
#[derive(Clone, Debug, PartialEq)]
pub struct SwitchComplete {
    pub variant_id: String,
}

/// Playhead reached (or left) its terminal position
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationComplete {
    pub complete: bool,
}
