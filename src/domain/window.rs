// ============================================================
// Layer 3 — Window Domain Types
// ============================================================
// A Window is a contiguous slice of the series, n_his + n_pred
// time steps long and n_route series wide, stored row-major:
//
//   values[t * n_route + s]  = series s at step t
//
//   |<------ n_his ------>|<-- n_pred -->|
//   [ history ........... | target ..... ]
//
// The model sees the history and is scored on the target.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three disjoint partitions of the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Geometry shared by every window of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowShape {
    /// Observed steps fed to the model
    pub n_his: usize,
    /// Future steps to predict (horizons)
    pub n_pred: usize,
    /// Number of parallel series
    pub n_route: usize,
}

impl WindowShape {
    pub fn new(n_his: usize, n_pred: usize, n_route: usize) -> Self {
        Self { n_his, n_pred, n_route }
    }

    /// Total time steps per window.
    pub fn n_frame(&self) -> usize {
        self.n_his + self.n_pred
    }

    /// Number of scalars per window.
    pub fn window_len(&self) -> usize {
        self.n_frame() * self.n_route
    }
}

/// A single training / evaluation example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    values: Vec<f32>,
}

impl Window {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The `n_pred` steps that follow the history.
    pub fn target(&self, shape: &WindowShape) -> &[f32] {
        let start = shape.n_his * shape.n_route;
        &self.values[start..start + shape.n_pred * shape.n_route]
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Window {
        Window::new(self.values.iter().map(|&v| f(v)).collect())
    }
}

/// Scalar z-score statistics, computed on the training split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScore {
    pub mean: f64,
    pub std: f64,
}

impl ZScore {
    /// Mean and population standard deviation over all values of all windows.
    /// A zero deviation falls back to 1 so the transform stays invertible.
    pub fn fit(windows: &[Window]) -> Self {
        let count: usize = windows.iter().map(|w| w.values.len()).sum();
        if count == 0 {
            return Self { mean: 0.0, std: 1.0 };
        }
        let sum: f64 = windows
            .iter()
            .flat_map(|w| w.values.iter())
            .map(|&v| v as f64)
            .sum();
        let mean = sum / count as f64;
        let sq: f64 = windows
            .iter()
            .flat_map(|w| w.values.iter())
            .map(|&v| (v as f64 - mean).powi(2))
            .sum();
        let std = (sq / count as f64).sqrt();
        let std = if std > 0.0 { std } else { 1.0 };
        Self { mean, std }
    }

    pub fn normalize(&self, v: f64) -> f64 {
        (v - self.mean) / self.std
    }

    pub fn invert(&self, v: f64) -> f64 {
        v * self.std + self.mean
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_follows_history() {
        // 2 series, 3 history steps, 2 target steps
        let shape = WindowShape::new(3, 2, 2);
        let w = Window::new((0..10).map(|v| v as f32).collect());
        assert_eq!(&w.values()[..6], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(w.target(&shape), &[6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_zscore_roundtrip_and_population_std() {
        let windows = vec![Window::new(vec![1.0, 3.0]), Window::new(vec![5.0, 7.0])];
        let z = ZScore::fit(&windows);
        assert!((z.mean - 4.0).abs() < 1e-12);
        assert!((z.std - 5.0_f64.sqrt()).abs() < 1e-12);
        assert!((z.invert(z.normalize(6.5)) - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_series_keeps_unit_std() {
        let z = ZScore::fit(&[Window::new(vec![2.0; 4])]);
        assert_eq!(z.std, 1.0);
        assert_eq!(z.normalize(2.0), 0.0);
    }
}
