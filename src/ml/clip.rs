// ============================================================
// Layer 5 — Gradient Norm Clipping
// ============================================================
// Global L2 clipping over every parameter gradient of a module:
//
//   total = sqrt( Σ_p ||g_p||² )
//   coef  = max_norm / (total + 1e-6)
//   g_p  *= coef            only when coef < 1
//
// Burn's per-optimiser GradientClipping works tensor by tensor,
// so the global norm is computed with two module visitors.

use std::marker::PhantomData;

use burn::{
    module::{ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

const CLIP_EPS: f64 = 1e-6;

struct SquaredNorm<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    total: f64,
    phantom: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquaredNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            self.total += grad.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
    }
}

struct Rescale<'a, B: AutodiffBackend> {
    grads: &'a mut GradientsParams,
    coef: f64,
    phantom: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rescale<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            self.grads.register::<B::InnerBackend, D>(id, grad.mul_scalar(self.coef));
        }
    }
}

/// Global L2 norm of the gradients that belong to `module`.
pub fn grad_norm<B, M>(module: &M, grads: &GradientsParams) -> f64
where
    B: AutodiffBackend,
    M: Module<B>,
{
    let mut visitor = SquaredNorm::<B> {
        grads,
        total: 0.0,
        phantom: PhantomData,
    };
    module.visit(&mut visitor);
    visitor.total.sqrt()
}

/// Scale all gradients so their global norm is at most `max_norm`.
///
/// Returns the clipped gradients and the norm measured before clipping.
pub fn clip_grad_norm<B, M>(module: &M, mut grads: GradientsParams, max_norm: f64) -> (GradientsParams, f64)
where
    B: AutodiffBackend,
    M: Module<B>,
{
    let norm = grad_norm::<B, M>(module, &grads);
    let coef = max_norm / (norm + CLIP_EPS);
    if coef < 1.0 {
        let mut visitor = Rescale::<B> {
            grads: &mut grads,
            coef,
            phantom: PhantomData,
        };
        module.visit(&mut visitor);
    }
    (grads, norm)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        nn::{Linear, LinearConfig},
    };

    type TestBackend = Autodiff<NdArray<f32>>;

    fn gradients(scale: f32) -> (Linear<TestBackend>, GradientsParams) {
        let device = Default::default();
        let layer: Linear<TestBackend> = LinearConfig::new(4, 3).init(&device);
        let x = Tensor::<TestBackend, 2>::ones([2, 4], &device).mul_scalar(scale);
        let loss = layer.forward(x).sum();
        let grads = GradientsParams::from_grads(loss.backward(), &layer);
        (layer, grads)
    }

    #[test]
    fn test_large_gradients_are_scaled_to_max_norm() {
        let (layer, grads) = gradients(100.0);
        let before = grad_norm::<TestBackend, _>(&layer, &grads);
        assert!(before > 10.0);

        let (grads, reported) = clip_grad_norm::<TestBackend, _>(&layer, grads, 10.0);
        assert!((reported - before).abs() < 1e-6 * before.max(1.0));
        let after = grad_norm::<TestBackend, _>(&layer, &grads);
        assert!((after - 10.0).abs() < 1e-3, "after = {after}");
    }

    #[test]
    fn test_small_gradients_are_untouched() {
        let (layer, grads) = gradients(0.01);
        let before = grad_norm::<TestBackend, _>(&layer, &grads);
        assert!(before < 10.0);

        let (grads, _) = clip_grad_norm::<TestBackend, _>(&layer, grads, 10.0);
        let after = grad_norm::<TestBackend, _>(&layer, &grads);
        assert!((after - before).abs() < 1e-9);
    }
}
