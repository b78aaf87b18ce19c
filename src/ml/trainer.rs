// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Adam + MSE over shuffled mini-batches, driven by the pure
// schedule in domain::schedule:
//
//   epoch ─ train (TrainBackend = Autodiff<Wgpu>)
//           forward → MSE → backward → clip ‖g‖ ≤ 10 → Adam step
//     │
//     └─ every 10th epoch: model.valid() (inner backend, TNorm
//        uses running stats) → refresh BestRecord → print block
//        → checkpoint if the summed val RMSE strictly dropped
//
// After the schedule stops, the best checkpoint is merged back
// into the model and evaluated once more from an unset record.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::RunConfig;
use crate::data::{batcher::WindowBatcher, generator::gen_batch};
use crate::domain::fingerprint::Fingerprint;
use crate::domain::metrics::{BestRecord, Evaluation};
use crate::domain::schedule::{run_schedule, EpochDriver, LoopSummary, RoundOutcome, RoundReport};
use crate::domain::traits::WindowSource;
use crate::domain::window::Split;
use crate::infra::{
    checkpoint::CheckpointStore,
    metrics::{RoundLogger, RoundMetrics},
    report::print_block,
};
use crate::ml::{clip::clip_grad_norm, evaluator, init::initialize_parameters, model::Wavenet, ExecutionContext};

/// What a finished training run reports.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub summary: LoopSummary,
    /// Metrics of the reloaded best checkpoint
    pub best: Evaluation,
    pub checkpoint: PathBuf,
}

// ─── BurnDriver ───────────────────────────────────────────────────────────────
// Does the tensor work for each step of the schedule.
struct BurnDriver<'a, B: AutodiffBackend, S: WindowSource, O> {
    model: Wavenet<B>,
    optim: O,
    source: &'a S,
    store: &'a CheckpointStore,
    logger: RoundLogger,
    ctx: &'a mut ExecutionContext<B>,
    fingerprint: Fingerprint,
    cfg: &'a RunConfig,
    record: BestRecord,
    last_train_loss: f64,
}

impl<B, S, O> EpochDriver for BurnDriver<'_, B, S, O>
where
    B: AutodiffBackend,
    S: WindowSource,
    O: Optimizer<Wavenet<B>, B>,
{
    fn train_epoch(&mut self, epoch: usize) -> Result<()> {
        let batcher = WindowBatcher::<B>::new(self.ctx.device.clone(), self.source.shape());
        let windows = self.source.get_data(Split::Train);
        let loss_fn = MseLoss::new();

        let mut loss_sum = 0.0f64;
        let mut batches = 0usize;
        let mut clipped = 0usize;

        for items in gen_batch(windows, self.cfg.batch_size, true, true, &mut self.ctx.rng) {
            let batch = batcher.batch(items);
            let pred = self.model.forward(batch.history);
            let loss = loss_fn.forward(pred, batch.target, Reduction::Mean);

            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &self.model);
            let (grads, norm) = clip_grad_norm::<B, _>(&self.model, grads, self.cfg.clip_norm);
            if norm > self.cfg.clip_norm {
                clipped += 1;
            }
            self.model = self.optim.step(self.cfg.lr, self.model.clone(), grads);
        }

        self.last_train_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
        tracing::debug!(
            "Epoch {}: train_loss={:.6} over {} batches ({} clipped)",
            epoch,
            self.last_train_loss,
            batches,
            clipped
        );
        Ok(())
    }

    fn validate(&mut self, epoch: usize) -> Result<f64> {
        let model = self.model.valid();
        evaluator::update(
            &model,
            self.source,
            self.cfg.test_batch_size,
            &self.ctx.device,
            &mut self.record,
        )?;

        let n_pred = self.cfg.n_pred;
        print_block(&format!("Epoch {epoch}:"), &self.record.val(n_pred), &self.record.test(n_pred));

        // an unset record (NaN predictions) must never count as an improvement
        Ok(self
            .record
            .evaluation()
            .map(|e| e.val.rmse_sum())
            .unwrap_or(f64::NAN))
    }

    fn save_checkpoint(&mut self, epoch: usize) -> Result<()> {
        let state = self.model.state_dict()?;
        self.store.save(&self.fingerprint, &state)?;
        tracing::info!("Checkpoint saved at epoch {}", epoch);
        Ok(())
    }

    fn on_round(&mut self, report: &RoundReport) -> Result<()> {
        let stalled_rounds = match report.outcome {
            RoundOutcome::Improved => 0,
            RoundOutcome::Stalled { stalled } => stalled,
            RoundOutcome::Exhausted => self.cfg.patience,
        };
        let n_pred = self.cfg.n_pred;
        self.logger.log(&RoundMetrics {
            epoch: report.epoch,
            train_loss: self.last_train_loss,
            total_val_rmse: self.record.val(n_pred).rmse_sum(),
            total_test_rmse: self.record.test(n_pred).rmse_sum(),
            improved: report.outcome == RoundOutcome::Improved,
            stalled_rounds,
        })
    }
}

/// Merge the checkpoint stored for `fingerprint` into `model` and score it
/// from an unset record.
pub fn reload_best<B: Backend, S: WindowSource>(
    model: Wavenet<B>,
    store: &CheckpointStore,
    fingerprint: &Fingerprint,
    source: &S,
    batch_size: usize,
    device: &B::Device,
) -> Result<Evaluation> {
    let state = store
        .load(fingerprint)
        .context("Cannot reload the best checkpoint")?;
    let (model, report) = model.load_state_dict(&state);
    tracing::debug!("Reloaded {} tensors from the best checkpoint", report.applied.len());
    evaluator::evaluate(&model, source, batch_size, device)
}

/// Train a fresh model on `source` and report the best checkpoint.
pub fn run_training<B, S>(
    cfg: &RunConfig,
    source: &S,
    store: &CheckpointStore,
    ctx: &mut ExecutionContext<B>,
) -> Result<TrainingOutcome>
where
    B: AutodiffBackend,
    S: WindowSource,
{
    let fingerprint = cfg.fingerprint();
    let model_cfg = cfg.model_config();

    // ── Build model ───────────────────────────────────────────────────────────
    let model: Wavenet<B> = model_cfg.init(&ctx.device);
    let model = initialize_parameters(model, &mut ctx.rng)?;
    tracing::info!(
        "Model ready: {} layers, {} hidden channels, receptive field {}",
        cfg.n_layers,
        cfg.hidden_channels,
        model_cfg.receptive_field()
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let optim = AdamConfig::new().init::<B, Wavenet<B>>();

    store.save_config(&fingerprint, cfg)?;
    let logger = RoundLogger::new(store.rounds_path(&fingerprint))?;
    tracing::info!("Run log: '{}'", logger.csv_path().display());

    // flush anything queued on the device before the first epoch
    ctx.sync();

    let schedule = cfg.schedule();
    let mut driver = BurnDriver {
        model,
        optim,
        source,
        store,
        logger,
        ctx,
        fingerprint: fingerprint.clone(),
        cfg,
        record: BestRecord::new(),
        last_train_loss: f64::NAN,
    };
    let summary = run_schedule(&schedule, &mut driver)?;
    tracing::info!(
        "Training stopped ({:?}) after {} epochs, {} validation rounds",
        summary.state,
        summary.epochs_run,
        summary.rounds
    );

    // ── Reload the best checkpoint ────────────────────────────────────────────
    // the file on disk may belong to an earlier run of the same fingerprint
    if summary.checkpoint_epochs.is_empty() {
        bail!(
            "Training of '{}' wrote no checkpoint ({} epochs, {} validation rounds)",
            fingerprint,
            summary.epochs_run,
            summary.rounds
        );
    }
    let best = reload_best(
        driver.model.valid(),
        store,
        &fingerprint,
        source,
        cfg.test_batch_size,
        &driver.ctx.device,
    )?;
    print_block("Best Results:", &best.val, &best.test);

    Ok(TrainingOutcome {
        summary,
        best,
        checkpoint: store.path(&fingerprint),
    })
}
