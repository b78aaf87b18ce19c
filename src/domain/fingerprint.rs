// ============================================================
// Layer 3 — Checkpoint Fingerprint
// ============================================================
// Encodes a hyperparameter configuration plus a version into
// the string every checkpoint file is named after:
//
//   {model}_s{snorm}_t{tnorm}_hc{hidden}_l{layers}_his{n_his}_pred{n_pred}_v{version}
//
// Booleans are written as 0/1, e.g. `wavenet_s1_t0_hc16_l4_his16_pred3_v2`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub model: String,
    pub snorm: bool,
    pub tnorm: bool,
    pub hidden_channels: usize,
    pub n_layers: usize,
    pub n_his: usize,
    pub n_pred: usize,
    pub version: u32,
}

impl Fingerprint {
    /// Same configuration, different run.
    pub fn with_version(&self, version: u32) -> Self {
        Self { version, ..self.clone() }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_s{}_t{}_hc{}_l{}_his{}_pred{}_v{}",
            self.model,
            u8::from(self.snorm),
            u8::from(self.tnorm),
            self.hidden_channels,
            self.n_layers,
            self.n_his,
            self.n_pred,
            self.version,
        )
    }
}
