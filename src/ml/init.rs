// ============================================================
// Layer 5 — Parameter Initialisation
// ============================================================
// Re-initialises every trainable entry of a fresh model from a
// seeded RNG so two runs with the same seed start identically:
//
//   rank >= 2 (conv weights)  → Xavier uniform
//                               bound = sqrt(6 / (fan_in + fan_out))
//   rank 1    (biases, norms) → uniform [0, 1)
//   running statistics        → untouched
//
// For a conv weight [out, in, kh, kw] the receptive size is kh·kw,
// fan_in = in·kh·kw and fan_out = out·kh·kw.

use anyhow::Result;
use burn::prelude::*;
use rand::{rngs::StdRng, Rng};

use crate::ml::model::Wavenet;
use crate::ml::state::TensorEntry;

fn xavier_bound(shape: &[usize]) -> f32 {
    let receptive: usize = shape[2..].iter().product();
    let fan_in = shape[1] * receptive;
    let fan_out = shape[0] * receptive;
    (6.0 / (fan_in + fan_out).max(1) as f32).sqrt()
}

fn reinitialise(entry: &mut TensorEntry, rng: &mut StdRng) {
    if !entry.trainable {
        return;
    }
    if entry.shape.len() >= 2 {
        let bound = xavier_bound(&entry.shape);
        for v in entry.values.iter_mut() {
            *v = rng.gen_range(-bound..=bound);
        }
    } else {
        for v in entry.values.iter_mut() {
            *v = rng.gen::<f32>();
        }
    }
}

/// Draw all trainable parameters of `model` from `rng`.
pub fn initialize_parameters<B: Backend>(model: Wavenet<B>, rng: &mut StdRng) -> Result<Wavenet<B>> {
    let mut state = model.state_dict()?;
    for (_, entry) in state.entries_mut() {
        reinitialise(entry, rng);
    }
    let (model, report) = model.load_state_dict(&state);
    tracing::debug!(
        "Initialised {} parameter tensors ({} values)",
        report.applied.len(),
        state.num_values()
    );
    Ok(model)
}
