// ============================================================
// Layer 5 — Validation Evaluator
// ============================================================
// Runs the model over a whole split in order and scores it:
//
//   windows ─ gen_batch(min(batch, len), no shuffle, dynamic)
//      │
//      ▼
//   forward(history) → pred [b, n_pred, n]   target [b, n_pred, n]
//      │                    (flattened, appended in order)
//      ▼
//   MetricVector::measure  (after inverting the z-score)
//
// `update` refreshes a BestRecord: the validation split is always
// scored, the test split only when validation wins, so the stored
// test vector always belongs to the best validation round.

use anyhow::{anyhow, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use rand::rngs::mock::StepRng;

use crate::data::{batcher::WindowBatcher, generator::gen_batch};
use crate::domain::error::ForecastError;
use crate::domain::metrics::{BestRecord, Evaluation, MetricVector};
use crate::domain::traits::WindowSource;
use crate::domain::window::Split;
use crate::ml::model::Wavenet;

fn to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

/// Ground truth and predictions of one split, both `[window, horizon, series]`.
pub fn predict_split<B: Backend, S: WindowSource>(
    model: &Wavenet<B>,
    source: &S,
    split: Split,
    batch_size: usize,
    device: &B::Device,
) -> Result<(Vec<f32>, Vec<f32>)> {
    let windows = source.get_data(split);
    if windows.is_empty() {
        return Err(ForecastError::EmptySplit(split).into());
    }
    let batcher = WindowBatcher::<B>::new(device.clone(), source.shape());
    // never drawn from: shuffling is off
    let mut rng = StepRng::new(0, 1);

    let batches = gen_batch(windows, batch_size.min(windows.len()), false, true, &mut rng);
    let n_batches = batches.num_batches();

    let mut truth = Vec::new();
    let mut pred = Vec::new();
    for items in batches {
        let batch = batcher.batch(items);
        let output = model.forward(batch.history);
        pred.extend(to_vec(output)?);
        truth.extend(to_vec(batch.target)?);
    }
    tracing::debug!("Predicted {} windows of split '{}' in {} batches", windows.len(), split, n_batches);
    Ok((truth, pred))
}

/// Score one split in original units.
pub fn evaluate_split<B: Backend, S: WindowSource>(
    model: &Wavenet<B>,
    source: &S,
    split: Split,
    batch_size: usize,
    device: &B::Device,
) -> Result<MetricVector> {
    let shape = source.shape();
    let (truth, pred) = predict_split(model, source, split, batch_size, device)?;
    Ok(MetricVector::measure(&truth, &pred, shape.n_pred, shape.n_route, &source.stats())?)
}

/// Refresh `record` with the current model. Returns whether it changed.
pub fn update<B: Backend, S: WindowSource>(
    model: &Wavenet<B>,
    source: &S,
    batch_size: usize,
    device: &B::Device,
    record: &mut BestRecord,
) -> Result<bool> {
    let val = evaluate_split(model, source, Split::Val, batch_size, device)?;
    record.offer(val, || evaluate_split(model, source, Split::Test, batch_size, device))
}

/// Evaluate from an unset record: the (val, test) pair of this model alone.
pub fn evaluate<B: Backend, S: WindowSource>(
    model: &Wavenet<B>,
    source: &S,
    batch_size: usize,
    device: &B::Device,
) -> Result<Evaluation> {
    let mut record = BestRecord::new();
    update(model, source, batch_size, device, &mut record)?;
    record
        .evaluation()
        .cloned()
        .ok_or_else(|| anyhow!("Validation produced no comparable metrics (NaN RMSE)"))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::dataset::WindowDataset;
    use crate::domain::window::{Window, WindowShape};
    use crate::ml::model::WavenetConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    /// Windows of n_his=2, n_pred=1 over 2 series; values grow with `k`.
    pub(crate) fn tiny_dataset() -> WindowDataset {
        let shape = WindowShape::new(2, 1, 2);
        let window = |k: usize| {
            let base = k as f32;
            Window::new(vec![base, base + 1.0, base + 2.0, base + 3.0, base + 4.0, base + 5.0])
        };
        WindowDataset::from_raw(
            (0..6).map(window).collect(),
            (6..9).map(window).collect(),
            (9..11).map(window).collect(),
            shape,
        )
        .unwrap()
    }

    #[test]
    fn test_predict_split_collects_every_window_in_order() {
        let device = Default::default();
        let data = tiny_dataset();
        let model = WavenetConfig::new(2, 1, 4, 1).init::<TestBackend>(&device);

        // batch 2 over 3 windows: one full batch and one under-full batch
        let (truth, pred) = predict_split(&model, &data, Split::Val, 2, &device).unwrap();
        assert_eq!(truth.len(), 3 * 2);
        assert_eq!(pred.len(), truth.len());

        let expected: Vec<f32> = data
            .get_data(Split::Val)
            .iter()
            .flat_map(|w| w.target(&data.shape()).to_vec())
            .collect();
        assert_eq!(truth, expected);
    }

    #[test]
    fn test_update_sets_then_keeps_on_tie() {
        let device = Default::default();
        let data = tiny_dataset();
        let model = WavenetConfig::new(2, 1, 4, 1).init::<TestBackend>(&device);

        let mut record = BestRecord::new();
        assert!(update(&model, &data, 48, &device, &mut record).unwrap());
        let first = record.clone();
        assert_eq!(record.val(1).n_pred(), 1);

        // identical model, identical RMSE: strict `<` keeps the record
        assert!(!update(&model, &data, 48, &device, &mut record).unwrap());
        assert_eq!(record, first);
    }

    #[test]
    fn test_evaluate_is_independent_of_batch_size() {
        let device = Default::default();
        let data = tiny_dataset();
        let model = WavenetConfig::new(2, 1, 4, 1).init::<TestBackend>(&device);

        let a = evaluate(&model, &data, 1, &device).unwrap();
        let b = evaluate(&model, &data, 48, &device).unwrap();
        for (x, y) in a.val.as_slice().iter().zip(b.val.as_slice()) {
            assert!((x - y).abs() < 1e-4);
        }
    }
}
