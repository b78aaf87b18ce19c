// ============================================================
// Layer 2 — EvalUseCase
// ============================================================
// Scores several trained versions of one configuration:
//
//   for v in versions:
//       fresh model → merge checkpoint {fingerprint}_v{v}
//                   → evaluate from an unset record
//                   → print "Version: v" block
//   print "Overall:" block (elementwise mean of val and test)
//
// A missing checkpoint stops the loop and fails the command,
// naming the version.

use anyhow::Result;
use burn::prelude::*;

use crate::application::train_use_case::RunConfig;
use crate::data::dataset::data_gen;
use crate::domain::traits::WindowSource;
use crate::infra::{checkpoint::CheckpointStore, report::print_block};
use crate::ml::{
    aggregator::{aggregate_versions, Aggregate},
    evaluator,
    init::initialize_parameters,
    ExecutionContext, EvalBackend,
};

/// Evaluate `versions` of `cfg`'s configuration against `source`.
pub fn evaluate_versions<B: Backend, S: WindowSource>(
    cfg: &RunConfig,
    versions: &[u32],
    source: &S,
    store: &CheckpointStore,
    ctx: &mut ExecutionContext<B>,
) -> Result<Aggregate> {
    let base = cfg.fingerprint();
    let model_cfg = cfg.model_config();

    let aggregate = aggregate_versions(versions, |version| {
        let fp = base.with_version(version);
        let state = store.load(&fp)?;

        let model = initialize_parameters(model_cfg.init::<B>(&ctx.device), &mut ctx.rng)?;
        let (model, report) = model.load_state_dict(&state);
        if !report.is_complete() {
            tracing::warn!(
                "Partial load of '{}': {} missing, {} mismatched, {} unused",
                fp,
                report.missing.len(),
                report.mismatched.len(),
                report.unused.len()
            );
        }

        let evaluation = evaluator::evaluate(&model, source, cfg.test_batch_size, &ctx.device)?;
        print_block(&format!("Version: {version}"), &evaluation.val, &evaluation.test);
        Ok(evaluation)
    })?;

    print_block("Overall:", &aggregate.mean_val, &aggregate.mean_test);
    Ok(aggregate)
}

pub struct EvalUseCase {
    config: RunConfig,
    versions: Vec<u32>,
}

impl EvalUseCase {
    pub fn new(config: RunConfig, versions: Vec<u32>) -> Self {
        Self { config, versions }
    }

    pub fn execute(&self) -> Result<Aggregate> {
        let cfg = &self.config;
        cfg.validate()?;

        tracing::info!("Loading series from '{}'", cfg.data_path.display());
        let dataset = data_gen(&cfg.data_path, &cfg.day_split(), cfg.shape())?;
        let store = CheckpointStore::new(&cfg.checkpoint_dir)?;

        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        let mut ctx = ExecutionContext::<EvalBackend>::new(device, cfg.seed);

        tracing::info!("Evaluating versions {:?} of '{}'", self.versions, cfg.fingerprint());
        evaluate_versions(cfg, &self.versions, &dataset, &store, &mut ctx)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ForecastError;
    use crate::ml::evaluator::tests::tiny_dataset;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn tiny_config(dir: &std::path::Path) -> RunConfig {
        RunConfig {
            n_his: 2,
            n_pred: 1,
            n_route: 2,
            n_layers: 1,
            hidden_channels: 4,
            test_batch_size: 2,
            checkpoint_dir: dir.to_path_buf(),
            ..RunConfig::default()
        }
    }

    /// Store a randomly initialised model as `version`.
    fn save_version(cfg: &RunConfig, store: &CheckpointStore, ctx: &mut ExecutionContext<TestBackend>, version: u32) {
        let model = initialize_parameters(cfg.model_config().init::<TestBackend>(&ctx.device), &mut ctx.rng).unwrap();
        store
            .save(&cfg.fingerprint().with_version(version), &model.state_dict().unwrap())
            .unwrap();
    }

    #[test]
    fn test_each_version_is_scored_from_its_own_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let store = CheckpointStore::new(dir.path()).unwrap();
        let mut ctx = ExecutionContext::<TestBackend>::new(Default::default(), 3);
        save_version(&cfg, &store, &mut ctx, 0);
        save_version(&cfg, &store, &mut ctx, 1);

        let data = tiny_dataset();
        let agg = evaluate_versions(&cfg, &[0, 1], &data, &store, &mut ctx).unwrap();
        assert_eq!(agg.per_version.len(), 2);
        assert_eq!(agg.mean_val.n_pred(), 1);

        // the mean lies between the two versions
        let (a, b) = (&agg.per_version[0].1.test, &agg.per_version[1].1.test);
        let (lo, hi) = if a.rmse_sum() < b.rmse_sum() { (a, b) } else { (b, a) };
        assert!(lo.rmse_sum() <= agg.mean_test.rmse_sum() + 1e-9);
        assert!(agg.mean_test.rmse_sum() <= hi.rmse_sum() + 1e-9);
    }

    #[test]
    fn test_missing_version_fails_with_its_number() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let store = CheckpointStore::new(dir.path()).unwrap();
        let mut ctx = ExecutionContext::<TestBackend>::new(Default::default(), 3);
        save_version(&cfg, &store, &mut ctx, 0);
        save_version(&cfg, &store, &mut ctx, 1);
        save_version(&cfg, &store, &mut ctx, 3);

        let data = tiny_dataset();
        let err = evaluate_versions(&cfg, &[0, 1, 2, 3], &data, &store, &mut ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ForecastError>(),
            Some(ForecastError::CheckpointNotFound { version: 2, .. })
        ));
    }
}
