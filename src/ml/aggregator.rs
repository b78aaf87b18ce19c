// ============================================================
// Layer 5 — Multi-Version Aggregator
// ============================================================
// Evaluates several independently trained versions of one
// configuration and averages their metrics elementwise:
//
//   v0 → (val, test)  ┐
//   v1 → (val, test)  ├─ mean(val_i), mean(test_i)
//   v2 → (val, test)  ┘
//
// The first version that cannot be evaluated (typically a
// missing checkpoint) aborts the whole aggregation; later
// versions are not touched.

use anyhow::{Context, Result};

use crate::domain::metrics::{Evaluation, MetricVector};

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub per_version: Vec<(u32, Evaluation)>,
    pub mean_val: MetricVector,
    pub mean_test: MetricVector,
}

/// Evaluate every version in order and average the results.
pub fn aggregate_versions<F>(versions: &[u32], mut evaluate: F) -> Result<Aggregate>
where
    F: FnMut(u32) -> Result<Evaluation>,
{
    let mut per_version = Vec::with_capacity(versions.len());
    for &version in versions {
        let evaluation =
            evaluate(version).with_context(|| format!("Aggregation aborted at version {version}"))?;
        per_version.push((version, evaluation));
    }

    let vals: Vec<MetricVector> = per_version.iter().map(|(_, e)| e.val.clone()).collect();
    let tests: Vec<MetricVector> = per_version.iter().map(|(_, e)| e.test.clone()).collect();

    Ok(Aggregate {
        mean_val: MetricVector::mean(&vals)?,
        mean_test: MetricVector::mean(&tests)?,
        per_version,
    })
}
