// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores named parameter state, one file per
// configuration fingerprint:
//
//   checkpoints/
//     wavenet_s1_t0_hc16_l4_his16_pred3_v0.json         ← parameters
//     wavenet_s1_t0_hc16_l4_his16_pred3_v0.config.json  ← RunConfig
//     wavenet_s1_t0_hc16_l4_his16_pred3_v0.rounds.csv   ← run log
//
// Saving overwrites. The parameter file holds a StateDict as
// JSON, so loading can MERGE into a model instead of requiring
// an exact architecture match (see ml::state).

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::application::train_use_case::RunConfig;
use crate::domain::{error::ForecastError, fingerprint::Fingerprint};
use crate::ml::state::StateDict;

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Create the store, creating `dir` (like `mkdir -p`) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Where the parameters of `fp` live.
    pub fn path(&self, fp: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{fp}.json"))
    }

    pub fn config_path(&self, fp: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{fp}.config.json"))
    }

    pub fn rounds_path(&self, fp: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{fp}.rounds.csv"))
    }

    pub fn exists(&self, fp: &Fingerprint) -> bool {
        self.path(fp).is_file()
    }

    /// Write `state` for `fp`, replacing any earlier checkpoint.
    pub fn save(&self, fp: &Fingerprint, state: &StateDict) -> Result<()> {
        let path = self.path(fp);
        let json = serde_json::to_string(state)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        tracing::debug!("Saved checkpoint '{}' ({} tensors)", path.display(), state.len());
        Ok(())
    }

    /// Read the state stored for `fp`.
    ///
    /// A missing file is a [`ForecastError::CheckpointNotFound`] naming the version.
    pub fn load(&self, fp: &Fingerprint) -> Result<StateDict> {
        let path = self.path(fp);
        if !path.is_file() {
            return Err(ForecastError::CheckpointNotFound { version: fp.version, path }.into());
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;
        let state: StateDict = serde_json::from_str(&json)
            .with_context(|| format!("Corrupt checkpoint '{}'", path.display()))?;
        if state.is_empty() {
            tracing::warn!("Checkpoint '{}' holds no tensors", path.display());
        }
        tracing::debug!("Loaded checkpoint '{}' ({} tensors)", path.display(), state.len());
        Ok(state)
    }

    /// Record the configuration a checkpoint was trained with.
    pub fn save_config(&self, fp: &Fingerprint, cfg: &RunConfig) -> Result<()> {
        let path = self.config_path(fp);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }
}
