// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The evaluator and training loop program against these traits
// instead of a concrete dataset type:
//   - WindowDataset (data layer) implements WindowSource
//   - tests implement it over a handful of hand-written windows

use crate::domain::window::{Split, Window, WindowShape, ZScore};

// ─── WindowSource ─────────────────────────────────────────────────────────────
/// Provider of the three immutable, already-normalised splits.
pub trait WindowSource {
    /// Ordered windows of one split.
    fn get_data(&self, split: Split) -> &[Window];

    /// Geometry shared by every window.
    fn shape(&self) -> WindowShape;

    /// Statistics used to normalise the data, needed to score in original units.
    fn stats(&self) -> ZScore;
}
