// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run in order:
//
//   Step 1: Validate the RunConfig                     (Layer 2)
//   Step 2: Load the CSV, split by days, z-score       (Layer 4 - data)
//   Step 3: Open the checkpoint store                  (Layer 6 - infra)
//   Step 4: Seed the device context                    (Layer 5 - ml)
//   Step 5: Run the training loop, reload the best     (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{dataset::data_gen, splitter::DaySplit};
use crate::domain::{
    error::ForecastError,
    fingerprint::Fingerprint,
    schedule::Schedule,
    window::{Split, WindowShape},
};
use crate::infra::checkpoint::CheckpointStore;
use crate::ml::{
    model::WavenetConfig,
    trainer::{run_training, TrainingOutcome},
    ExecutionContext, TrainBackend,
};

// ─── Run Configuration ───────────────────────────────────────────────────────
// Built once from the command line and passed by reference.
// Serialisable so the effective values can be stored next to
// every checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub model: String,
    pub snorm: bool,
    pub tnorm: bool,
    pub n_his: usize,
    pub n_pred: usize,
    pub n_layers: usize,
    pub hidden_channels: usize,
    pub version: u32,

    pub data_path: PathBuf,
    pub n_route: usize,
    pub day_slot: usize,
    pub n_train: usize,
    pub n_val: usize,
    pub n_test: usize,

    pub batch_size: usize,
    pub test_batch_size: usize,
    pub lr: f64,
    pub clip_norm: f64,
    pub max_epochs: usize,
    pub validate_every: usize,
    pub patience: usize,
    pub seed: u64,
    pub checkpoint_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: "wavenet".to_string(),
            snorm: true,
            tnorm: true,
            n_his: 16,
            n_pred: 3,
            n_layers: 4,
            hidden_channels: 16,
            version: 0,

            data_path: PathBuf::from("data/electricity.csv"),
            n_route: 336,
            day_slot: 24,
            n_train: 78,
            n_val: 7,
            n_test: 7,

            batch_size: 8,
            test_batch_size: 48,
            lr: 1e-4,
            clip_norm: 10.0,
            max_epochs: 1000,
            validate_every: 10,
            patience: 5,
            seed: 1337,
            checkpoint_dir: PathBuf::from("checkpoints"),
        }
    }
}

impl RunConfig {
    /// Reject configurations that cannot produce a single window or batch.
    pub fn validate(&self) -> Result<(), ForecastError> {
        let positive = [
            ("n_his", self.n_his),
            ("n_pred", self.n_pred),
            ("n_layers", self.n_layers),
            ("hidden_channels", self.hidden_channels),
            ("n_route", self.n_route),
            ("batch_size", self.batch_size),
            ("test_batch_size", self.test_batch_size),
            ("n_train", self.n_train),
            ("n_val", self.n_val),
            ("n_test", self.n_test),
            ("max_epochs", self.max_epochs),
            ("validate_every", self.validate_every),
            ("patience", self.patience),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ForecastError::InvalidConfig(format!("{name} must be at least 1")));
        }
        if self.n_his + self.n_pred > self.day_slot {
            return Err(ForecastError::InvalidConfig(format!(
                "n_his + n_pred ({}) exceeds the {} slots of a day",
                self.n_his + self.n_pred,
                self.day_slot
            )));
        }
        if self.lr <= 0.0 || self.clip_norm <= 0.0 {
            return Err(ForecastError::InvalidConfig(
                "lr and clip_norm must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            model: self.model.clone(),
            snorm: self.snorm,
            tnorm: self.tnorm,
            hidden_channels: self.hidden_channels,
            n_layers: self.n_layers,
            n_his: self.n_his,
            n_pred: self.n_pred,
            version: self.version,
        }
    }

    pub fn shape(&self) -> WindowShape {
        WindowShape::new(self.n_his, self.n_pred, self.n_route)
    }

    pub fn day_split(&self) -> DaySplit {
        DaySplit {
            n_train: self.n_train,
            n_val: self.n_val,
            n_test: self.n_test,
            day_slot: self.day_slot,
        }
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            max_epochs: self.max_epochs,
            validate_every: self.validate_every,
            patience: self.patience,
        }
    }

    pub fn model_config(&self) -> WavenetConfig {
        WavenetConfig::new(self.n_route, self.n_pred, self.hidden_channels, self.n_layers)
            .with_snorm(self.snorm)
            .with_tnorm(self.tnorm)
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: RunConfig,
}

impl TrainUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingOutcome> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 2: Data ──────────────────────────────────────────────────────
        tracing::info!("Loading series from '{}'", cfg.data_path.display());
        let dataset = data_gen(&cfg.data_path, &cfg.day_split(), cfg.shape())?;
        tracing::info!(
            "Windows: {} train, {} val, {} test",
            dataset.len(Split::Train),
            dataset.len(Split::Val),
            dataset.len(Split::Test)
        );

        // ── Step 3: Checkpoints ───────────────────────────────────────────────
        let store = CheckpointStore::new(&cfg.checkpoint_dir)?;
        let fp = cfg.fingerprint();
        if store.exists(&fp) {
            tracing::warn!("Overwriting existing checkpoint '{}'", store.path(&fp).display());
        }

        // ── Step 4–5: Train ───────────────────────────────────────────────────
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        let mut ctx = ExecutionContext::<TrainBackend>::new(device, cfg.seed);

        let outcome = run_training(cfg, &dataset, &store, &mut ctx)?;
        tracing::info!("Training summary: {:?}", outcome.summary);
        Ok(outcome)
    }
}
