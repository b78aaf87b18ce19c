// ============================================================
// Layer 4 — Window Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<Window> into
// device tensors, split along time into history and target:
//
//   Input:  N windows of n_frame x n_route scalars
//   Output: history [N, n_his,  n_route]
//           target  [N, n_pred, n_route]
//
// The windows are flattened into one Vec<f32>, turned into a
// [N, n_frame, n_route] tensor, then sliced on the time axis.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::window::{Window, WindowShape};

// ─── WindowBatch ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct WindowBatch<B: Backend> {
    /// Model input — shape: [batch, n_his, n_route]
    pub history: Tensor<B, 3>,

    /// Ground truth — shape: [batch, n_pred, n_route]
    pub target: Tensor<B, 3>,
}

// ─── WindowBatcher ────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct WindowBatcher<B: Backend> {
    device: B::Device,
    shape: WindowShape,
}

impl<B: Backend> WindowBatcher<B> {
    pub fn new(device: B::Device, shape: WindowShape) -> Self {
        Self { device, shape }
    }
}

impl<B: Backend> Batcher<Window, WindowBatch<B>> for WindowBatcher<B> {
    fn batch(&self, items: Vec<Window>) -> WindowBatch<B> {
        let batch_size = items.len();
        let WindowShape { n_his, n_pred, n_route } = self.shape;
        let n_frame = self.shape.n_frame();

        let flat: Vec<f32> = items
            .iter()
            .flat_map(|w| w.values().iter().copied())
            .collect();

        let frames = Tensor::<B, 3>::from_data(
            TensorData::new(flat, [batch_size, n_frame, n_route]),
            &self.device,
        );

        let history = frames
            .clone()
            .slice([0..batch_size, 0..n_his, 0..n_route]);
        let target = frames.slice([0..batch_size, n_his..n_his + n_pred, 0..n_route]);

        WindowBatch { history, target }
    }
}
