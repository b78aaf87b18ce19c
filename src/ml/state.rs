// ============================================================
// Layer 5 — Named Parameter State
// ============================================================
// A StateDict maps dotted parameter names to flat f32 values:
//
//   "start_conv.weight"            → shape [16, 1, 1, 1]
//   "layers.0.tnorm.running_mean"  → shape [1, 16, 336, 1]
//   ...
//
// Saving exports every parameter and running statistic by name.
// Loading is a MERGE over two named maps:
//
//   applied    = names in the model ∩ names in the state (same shape)
//   missing    = names only in the model  → keep initialised value
//   mismatched = same name, other shape   → keep initialised value
//   unused     = names only in the state  → ignored
//
// This lets a checkpoint from a smaller architecture seed a
// larger one without failing.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use burn::{
    module::{Param, RunningState},
    nn::conv::Conv2d,
    prelude::*,
    tensor::TensorData,
};
use serde::{Deserialize, Serialize};

/// One named tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorEntry {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
    /// false for running statistics, which the optimiser never touches
    pub trainable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    entries: BTreeMap<String, TensorEntry>,
}

impl StateDict {
    pub fn get(&self, name: &str) -> Option<&TensorEntry> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: TensorEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&String, &mut TensorEntry)> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of scalars.
    pub fn num_values(&self) -> usize {
        self.entries.values().map(|e| e.values.len()).sum()
    }
}

/// What a merge applied and what it left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub applied: Vec<String>,
    pub missing: Vec<String>,
    pub mismatched: Vec<String>,
    pub unused: Vec<String>,
}

impl MergeReport {
    /// Record the state entries no model parameter asked for.
    pub fn finish(&mut self, state: &StateDict) {
        self.unused = state
            .names()
            .filter(|name| {
                !self.applied.iter().any(|a| a == name) && !self.mismatched.iter().any(|m| m == name)
            })
            .map(str::to_string)
            .collect();
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty() && self.unused.is_empty()
    }
}

/// Modules whose parameters can be exported to and merged from a StateDict.
pub trait NamedParams<B: Backend>: Sized {
    fn export(&self, prefix: &str, state: &mut StateDict) -> Result<()>;

    fn merge(self, prefix: &str, state: &StateDict, report: &mut MergeReport) -> Self;
}

pub fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn to_entry<B: Backend, const D: usize>(tensor: Tensor<B, D>, trainable: bool) -> Result<TensorEntry> {
    let shape = tensor.dims().to_vec();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))?;
    Ok(TensorEntry { shape, values, trainable })
}

enum Lookup<B: Backend, const D: usize> {
    Found(Tensor<B, D>),
    Missing,
    Mismatch(Vec<usize>),
}

fn lookup<B: Backend, const D: usize>(
    state: &StateDict,
    name: &str,
    shape: [usize; D],
    device: &B::Device,
) -> Lookup<B, D> {
    match state.get(name) {
        None => Lookup::Missing,
        Some(entry) if entry.shape != shape.to_vec() || entry.values.len() != entry.shape.iter().product::<usize>() => {
            Lookup::Mismatch(entry.shape.clone())
        }
        Some(entry) => Lookup::Found(Tensor::from_data(
            TensorData::new(entry.values.clone(), shape),
            device,
        )),
    }
}

pub fn export_param<B: Backend, const D: usize>(
    state: &mut StateDict,
    name: String,
    param: &Param<Tensor<B, D>>,
) -> Result<()> {
    state.insert(name, to_entry(param.val(), true)?);
    Ok(())
}

pub fn export_running<B: Backend, const D: usize>(
    state: &mut StateDict,
    name: String,
    running: &RunningState<Tensor<B, D>>,
) -> Result<()> {
    state.insert(name, to_entry(running.value_sync(), false)?);
    Ok(())
}

pub fn merge_param<B: Backend, const D: usize>(
    state: &StateDict,
    name: String,
    param: Param<Tensor<B, D>>,
    report: &mut MergeReport,
) -> Param<Tensor<B, D>> {
    let current = param.val();
    match lookup::<B, D>(state, &name, current.dims(), &current.device()) {
        Lookup::Found(tensor) => {
            report.applied.push(name);
            Param::from_tensor(tensor)
        }
        Lookup::Missing => {
            report.missing.push(name);
            param
        }
        Lookup::Mismatch(found) => {
            tracing::warn!("Skipping '{}': stored shape {:?}, model shape {:?}", name, found, current.dims());
            report.mismatched.push(name);
            param
        }
    }
}

pub fn merge_running<B: Backend, const D: usize>(
    state: &StateDict,
    name: String,
    running: RunningState<Tensor<B, D>>,
    report: &mut MergeReport,
) -> RunningState<Tensor<B, D>> {
    let current = running.value();
    match lookup::<B, D>(state, &name, current.dims(), &current.device()) {
        Lookup::Found(tensor) => {
            report.applied.push(name);
            RunningState::new(tensor)
        }
        Lookup::Missing => {
            report.missing.push(name);
            running
        }
        Lookup::Mismatch(found) => {
            tracing::warn!("Skipping '{}': stored shape {:?}, model shape {:?}", name, found, current.dims());
            report.mismatched.push(name);
            running
        }
    }
}

impl<B: Backend> NamedParams<B> for Conv2d<B> {
    fn export(&self, prefix: &str, state: &mut StateDict) -> Result<()> {
        export_param(state, join(prefix, "weight"), &self.weight)?;
        if let Some(bias) = &self.bias {
            export_param(state, join(prefix, "bias"), bias)?;
        }
        Ok(())
    }

    fn merge(mut self, prefix: &str, state: &StateDict, report: &mut MergeReport) -> Self {
        self.weight = merge_param(state, join(prefix, "weight"), self.weight, report);
        self.bias = self
            .bias
            .map(|bias| merge_param(state, join(prefix, "bias"), bias, report));
        self
    }
}
