// ============================================================
// Layer 3 — Domain Errors
// ============================================================
// Most failures travel as anyhow::Error with context attached.
// The variants below are the ones callers need to tell apart,
// e.g. the aggregator reporting WHICH version is missing.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::window::Split;

#[derive(Error, Debug)]
pub enum ForecastError {
    /// No checkpoint stored for the requested version
    #[error("checkpoint for version {version} not found at '{}'", path.display())]
    CheckpointNotFound { version: u32, path: PathBuf },

    /// Two shapes that must agree do not
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },

    /// A split produced no windows
    #[error("split '{0}' has no windows")]
    EmptySplit(Split),

    /// Configuration rejected before any work starts
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Mean over zero metric vectors
    #[error("no metric vectors to aggregate")]
    EmptyAggregate,
}
