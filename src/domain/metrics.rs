// ============================================================
// Layer 3 — Metric Vectors and the Best Record
// ============================================================
// A MetricVector holds 3 * n_pred scalars, one triple per
// horizon, always in the order (MAPE, MAE, RMSE):
//
//   [mape_1, mae_1, rmse_1, mape_2, mae_2, rmse_2, ...]
//
// Two vectors travel together: one measured on the validation
// split and one on the test split in the SAME round. The test
// vector is never selected on its own merit.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ForecastError;
use crate::domain::window::ZScore;

/// Values shown for a record that has not been measured yet.
pub const SENTINEL: [f64; 3] = [40.0, 1e5, 1e5];

const MAPE_EPS: f64 = 1e-5;

/// Error metrics of one horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonMetrics {
    pub mape: f64,
    pub mae: f64,
    pub rmse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricVector(Vec<f64>);

impl MetricVector {
    pub fn from_horizons(horizons: impl IntoIterator<Item = HorizonMetrics>) -> Self {
        Self(
            horizons
                .into_iter()
                .flat_map(|h| [h.mape, h.mae, h.rmse])
                .collect(),
        )
    }

    /// Build from raw triples. The length must be a multiple of 3.
    pub fn from_raw(values: Vec<f64>) -> Result<Self, ForecastError> {
        if values.len() % 3 != 0 {
            return Err(ForecastError::ShapeMismatch {
                expected: vec![values.len() / 3 * 3 + 3],
                found: vec![values.len()],
            });
        }
        Ok(Self(values))
    }

    pub fn sentinel(n_pred: usize) -> Self {
        Self(SENTINEL.repeat(n_pred))
    }

    pub fn n_pred(&self) -> usize {
        self.0.len() / 3
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn horizon(&self, h: usize) -> HorizonMetrics {
        HorizonMetrics {
            mape: self.0[h * 3],
            mae: self.0[h * 3 + 1],
            rmse: self.0[h * 3 + 2],
        }
    }

    pub fn horizons(&self) -> impl Iterator<Item = HorizonMetrics> + '_ {
        (0..self.n_pred()).map(|h| self.horizon(h))
    }

    /// Sum of the RMSE entries (indices 2, 5, 8, ...).
    pub fn rmse_sum(&self) -> f64 {
        self.0.iter().skip(2).step_by(3).sum()
    }

    /// Elementwise arithmetic mean.
    pub fn mean(vectors: &[MetricVector]) -> Result<MetricVector, ForecastError> {
        let first = vectors.first().ok_or(ForecastError::EmptyAggregate)?;
        let len = first.0.len();
        let mut acc = vec![0.0f64; len];
        for v in vectors {
            if v.0.len() != len {
                return Err(ForecastError::ShapeMismatch {
                    expected: vec![len],
                    found: vec![v.0.len()],
                });
            }
            for (a, x) in acc.iter_mut().zip(&v.0) {
                *a += x;
            }
        }
        let n = vectors.len() as f64;
        Ok(MetricVector(acc.into_iter().map(|a| a / n).collect()))
    }

    /// Score predictions against ground truth after undoing the z-score.
    ///
    /// Both slices are laid out `[window, horizon, series]`, row-major.
    pub fn measure(
        truth: &[f32],
        pred: &[f32],
        n_pred: usize,
        n_route: usize,
        stats: &ZScore,
    ) -> Result<MetricVector, ForecastError> {
        let stride = n_pred * n_route;
        if truth.len() != pred.len() || stride == 0 || truth.len() % stride != 0 {
            return Err(ForecastError::ShapeMismatch {
                expected: vec![truth.len()],
                found: vec![pred.len()],
            });
        }
        let windows = truth.len() / stride;
        let count = (windows * n_route) as f64;

        let horizons = (0..n_pred).map(|h| {
            let (mut ape, mut ae, mut se) = (0.0f64, 0.0f64, 0.0f64);
            for w in 0..windows {
                let base = w * stride + h * n_route;
                for s in 0..n_route {
                    let v = stats.invert(truth[base + s] as f64);
                    let v_hat = stats.invert(pred[base + s] as f64);
                    let err = v_hat - v;
                    ape += err.abs() / (v + MAPE_EPS);
                    ae += err.abs();
                    se += err * err;
                }
            }
            if count == 0.0 {
                return HorizonMetrics { mape: f64::NAN, mae: f64::NAN, rmse: f64::NAN };
            }
            HorizonMetrics {
                mape: ape / count,
                mae: ae / count,
                rmse: (se / count).sqrt(),
            }
        });
        Ok(MetricVector::from_horizons(horizons))
    }
}

/// A validation vector paired with the test vector of the same round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub val: MetricVector,
    pub test: MetricVector,
}

/// Best-so-far (val, test) pair, selected on validation only.
///
/// Starts unset. A candidate replaces the record when it is unset or
/// when the candidate's summed validation RMSE is strictly lower.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BestRecord {
    best: Option<Evaluation>,
}

impl BestRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.best.as_ref()
    }

    pub fn improves_on(&self, val: &MetricVector) -> bool {
        match &self.best {
            None => true,
            Some(best) => val.rmse_sum() < best.val.rmse_sum(),
        }
    }

    /// Offer a freshly measured validation vector. The test split is only
    /// measured (via `measure_test`) when the validation vector wins.
    /// Returns whether the record changed.
    pub fn offer<F>(&mut self, val: MetricVector, measure_test: F) -> Result<bool>
    where
        F: FnOnce() -> Result<MetricVector>,
    {
        if !self.improves_on(&val) {
            return Ok(false);
        }
        let test = measure_test()?;
        self.best = Some(Evaluation { val, test });
        Ok(true)
    }

    /// Validation vector, or the sentinel if nothing was measured yet.
    pub fn val(&self, n_pred: usize) -> MetricVector {
        self.best
            .as_ref()
            .map(|e| e.val.clone())
            .unwrap_or_else(|| MetricVector::sentinel(n_pred))
    }

    /// Test vector of the best validation round, or the sentinel.
    pub fn test(&self, n_pred: usize) -> MetricVector {
        self.best
            .as_ref()
            .map(|e| e.test.clone())
            .unwrap_or_else(|| MetricVector::sentinel(n_pred))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn mv(values: &[f64]) -> MetricVector {
        MetricVector::from_raw(values.to_vec()).unwrap()
    }

    #[test]
    fn test_rmse_sum_reads_every_third_entry() {
        let v = mv(&[0.1, 1.0, 2.0, 0.2, 1.5, 3.0, 0.3, 1.7, 4.0]);
        assert_eq!(v.n_pred(), 3);
        assert!((v.rmse_sum() - 9.0).abs() < 1e-12);
        assert_eq!(v.horizon(1).mae, 1.5);
    }

    #[test]
    fn test_sentinel_layout() {
        let s = MetricVector::sentinel(2);
        assert_eq!(s.as_slice(), &[40.0, 1e5, 1e5, 40.0, 1e5, 1e5]);
    }

    #[test]
    fn test_mean_is_elementwise() {
        let m = MetricVector::mean(&[mv(&[1.0, 2.0, 3.0]), mv(&[3.0, 2.0, 1.0]), mv(&[2.0, 2.0, 2.0])])
            .unwrap();
        assert_eq!(m.as_slice(), &[2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_mean_rejects_empty_and_ragged_input() {
        assert!(matches!(MetricVector::mean(&[]), Err(ForecastError::EmptyAggregate)));
        let ragged = [mv(&[1.0, 2.0, 3.0]), mv(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])];
        assert!(matches!(
            MetricVector::mean(&ragged),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_measure_per_horizon() {
        // 1 window, 2 horizons, 2 series, identity statistics
        let stats = ZScore { mean: 0.0, std: 1.0 };
        let truth = [1.0, 2.0, 4.0, 4.0];
        let pred = [1.0, 2.0, 2.0, 6.0];
        let m = MetricVector::measure(&truth, &pred, 2, 2, &stats).unwrap();

        let h0 = m.horizon(0);
        assert_eq!(h0.mae, 0.0);
        assert_eq!(h0.rmse, 0.0);

        let h1 = m.horizon(1);
        assert!((h1.mae - 2.0).abs() < 1e-9);
        assert!((h1.rmse - 2.0).abs() < 1e-9);
        assert!((h1.mape - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_measure_inverts_zscore() {
        let stats = ZScore { mean: 10.0, std: 2.0 };
        // normalized 0 → 10, normalized 1 → 12
        let m = MetricVector::measure(&[0.0], &[1.0], 1, 1, &stats).unwrap();
        assert!((m.horizon(0).mae - 2.0).abs() < 1e-9);
        assert!((m.horizon(0).mape - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_measure_rejects_mismatched_lengths() {
        let stats = ZScore { mean: 0.0, std: 1.0 };
        assert!(MetricVector::measure(&[0.0, 1.0], &[0.0], 1, 1, &stats).is_err());
    }

    #[test]
    fn test_unset_record_reports_sentinel_and_accepts_anything() {
        let mut record = BestRecord::new();
        assert_eq!(record.val(1), MetricVector::sentinel(1));
        let changed = record
            .offer(mv(&[1e9, 1e9, 1e9]), || Ok(mv(&[0.0, 0.0, 0.0])))
            .unwrap();
        assert!(changed);
        assert!(record.evaluation().is_some());
    }

    #[test]
    fn test_reported_test_follows_best_validation_round() {
        let mut record = BestRecord::new();
        // round 0: val rmse 5, test rmse 9
        record.offer(mv(&[0.0, 0.0, 5.0]), || Ok(mv(&[0.0, 0.0, 9.0]))).unwrap();
        // round 1: val rmse 4, test rmse 7 → best val
        record.offer(mv(&[0.0, 0.0, 4.0]), || Ok(mv(&[0.0, 0.0, 7.0]))).unwrap();
        // round 2: worse val, much better test → must be ignored
        let mut test_measured = false;
        let changed = record
            .offer(mv(&[0.0, 0.0, 4.5]), || {
                test_measured = true;
                Ok(mv(&[0.0, 0.0, 1.0]))
            })
            .unwrap();

        assert!(!changed);
        assert!(!test_measured);
        assert_eq!(record.val(1).rmse_sum(), 4.0);
        assert_eq!(record.test(1).rmse_sum(), 7.0);
    }

    #[test]
    fn test_equal_summed_rmse_does_not_replace() {
        let mut record = BestRecord::new();
        record.offer(mv(&[0.0, 0.0, 3.0]), || Ok(mv(&[0.0, 0.0, 3.0]))).unwrap();
        let changed = record
            .offer(mv(&[0.5, 0.5, 3.0]), || Ok(mv(&[0.0, 0.0, 1.0])))
            .unwrap();
        assert!(!changed);
        assert_eq!(record.test(1).rmse_sum(), 3.0);
    }
}
