// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. The domain layer only sees plain
// vectors, metric triples and the EpochDriver trait.
//
//   model.rs     — Gated dilated convolution forecaster
//                  with optional SNorm / TNorm branches
//
//   state.rs     — Named parameter maps (save / partial load)
//
//   init.rs      — Seeded Xavier / uniform initialisation
//
//   clip.rs      — Global gradient-norm clipping
//
//   evaluator.rs — Split inference and BestRecord refresh
//
//   trainer.rs   — Adam + MSE epochs behind the EpochDriver
//                  state machine, final reload and report
//
//   aggregator.rs — Mean metrics over several trained versions
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            van den Oord et al. (2016) WaveNet

use burn::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

/// Model architecture and forward pass
pub mod model;

/// StateDict, NamedParams and merge-on-load
pub mod state;

/// Parameter initialisation from a seeded RNG
pub mod init;

/// Gradient clipping by global norm
pub mod clip;

/// Validation / test inference and scoring
pub mod evaluator;

/// Training loop driver
pub mod trainer;

/// Multi-version evaluation
pub mod aggregator;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type EvalBackend = burn::backend::Wgpu;

/// Device handle plus the run's single random source.
///
/// Creating a context also seeds the tensor backend, so batch
/// order, initial parameters and backend sampling all derive
/// from one seed.
pub struct ExecutionContext<B: Backend> {
    pub device: B::Device,
    pub rng: StdRng,
}

impl<B: Backend> ExecutionContext<B> {
    pub fn new(device: B::Device, seed: u64) -> Self {
        B::seed(seed);
        Self { device, rng: StdRng::seed_from_u64(seed) }
    }

    /// Block until queued device work has finished.
    pub fn sync(&self) {
        B::sync(&self.device);
    }
}
