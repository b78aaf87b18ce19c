// ============================================================
// Layer 5 — Gated Dilated Convolution Forecaster
// ============================================================
// A WaveNet-style stack over [batch, channels, series, time]:
//
//   history [B, n_his, N]
//      │  → [B, 1, N, n_his], left zero-pad to receptive field
//      ▼
//   start_conv (1x1) → hidden channels
//      │
//      ▼  repeated n_layers times, dilation 1, 2, 4, ...
//   ┌───────────────────────────────────────────────────────┐
//   │ concat(x, TNorm(x)?, SNorm(x)?)                        │
//   │ tanh(filter_conv) * sigmoid(gate_conv)                 │
//   │ skip  += skip_conv(...)      (trailing steps)          │
//   │ x      = residual_conv(...) + x (trailing steps)       │
//   └───────────────────────────────────────────────────────┘
//      │
//      ▼
//   relu(skip) → end_conv_1 → relu → end_conv_2 (n_pred ch)
//      │  last time step
//      ▼
//   prediction [B, n_pred, N]
//
// SNorm normalises across series, TNorm across batch and time
// (with running statistics for evaluation).

use burn::{
    module::{Param, RunningState},
    nn::conv::{Conv2d, Conv2dConfig},
    prelude::*,
    tensor::activation::{relu, sigmoid},
};

use crate::ml::state::{export_param, export_running, join, merge_param, merge_running, MergeReport, NamedParams, StateDict};

const NORM_EPS: f64 = 1e-5;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct WavenetConfig {
    /// Number of parallel series
    pub n_route: usize,
    /// Output horizons
    pub n_pred: usize,
    /// Width of every hidden convolution
    pub hidden_channels: usize,
    /// Dilated layers; dilation doubles per layer
    pub n_layers: usize,
    #[config(default = 2)]
    pub kernel_size: usize,
    #[config(default = false)]
    pub snorm: bool,
    #[config(default = false)]
    pub tnorm: bool,
    #[config(default = 0.1)]
    pub tnorm_momentum: f64,
}

impl WavenetConfig {
    /// Steps of history the stack can see: 1 + Σ (k-1)·2^i.
    pub fn receptive_field(&self) -> usize {
        1 + (0..self.n_layers)
            .map(|i| (self.kernel_size - 1) << i)
            .sum::<usize>()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Wavenet<B> {
        let c = self.hidden_channels;
        let branches = 1 + usize::from(self.snorm) + usize::from(self.tnorm);

        let layers = (0..self.n_layers)
            .map(|i| WaveLayer {
                tnorm: self.tnorm.then(|| TNorm::new(c, self.n_route, self.tnorm_momentum, device)),
                snorm: self.snorm.then(|| SNorm::new(c, device)),
                filter_conv: Conv2dConfig::new([branches * c, c], [1, self.kernel_size])
                    .with_dilation([1, 1 << i])
                    .init(device),
                gate_conv: Conv2dConfig::new([branches * c, c], [1, self.kernel_size])
                    .with_dilation([1, 1 << i])
                    .init(device),
                residual_conv: Conv2dConfig::new([c, c], [1, 1]).init(device),
                skip_conv: Conv2dConfig::new([c, c], [1, 1]).init(device),
            })
            .collect();

        Wavenet {
            start_conv: Conv2dConfig::new([1, c], [1, 1]).init(device),
            layers,
            end_conv_1: Conv2dConfig::new([c, c], [1, 1]).init(device),
            end_conv_2: Conv2dConfig::new([c, self.n_pred], [1, 1]).init(device),
            receptive_field: self.receptive_field(),
        }
    }
}

// ─── Spatial normalisation ────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SNorm<B: Backend> {
    gamma: Param<Tensor<B, 1>>,
    beta: Param<Tensor<B, 1>>,
}

impl<B: Backend> SNorm<B> {
    fn new(channels: usize, device: &B::Device) -> Self {
        Self {
            gamma: Param::from_tensor(Tensor::ones([channels], device)),
            beta: Param::from_tensor(Tensor::zeros([channels], device)),
        }
    }

    /// x: [B, C, N, T], normalised over N (unbiased variance).
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, c, _, _] = x.dims();
        let mean = x.clone().mean_dim(2);
        let var = x.clone().var(2);
        let x_norm = (x - mean) / var.add_scalar(NORM_EPS).sqrt();
        x_norm * self.gamma.val().reshape([1, c, 1, 1]) + self.beta.val().reshape([1, c, 1, 1])
    }
}

impl<B: Backend> NamedParams<B> for SNorm<B> {
    fn export(&self, prefix: &str, state: &mut StateDict) -> anyhow::Result<()> {
        export_param(state, join(prefix, "gamma"), &self.gamma)?;
        export_param(state, join(prefix, "beta"), &self.beta)
    }

    fn merge(mut self, prefix: &str, state: &StateDict, report: &mut MergeReport) -> Self {
        self.gamma = merge_param(state, join(prefix, "gamma"), self.gamma, report);
        self.beta = merge_param(state, join(prefix, "beta"), self.beta, report);
        self
    }
}

// ─── Temporal normalisation ───────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct TNorm<B: Backend> {
    gamma: Param<Tensor<B, 4>>,
    beta: Param<Tensor<B, 4>>,
    running_mean: RunningState<Tensor<B, 4>>,
    running_var: RunningState<Tensor<B, 4>>,
    momentum: f64,
}

impl<B: Backend> TNorm<B> {
    fn new(channels: usize, n_route: usize, momentum: f64, device: &B::Device) -> Self {
        let shape = [1, channels, n_route, 1];
        Self {
            gamma: Param::from_tensor(Tensor::ones(shape, device)),
            beta: Param::from_tensor(Tensor::zeros(shape, device)),
            running_mean: RunningState::new(Tensor::zeros(shape, device)),
            running_var: RunningState::new(Tensor::ones(shape, device)),
            momentum,
        }
    }

    /// x: [B, C, N, T], normalised over B and T per (channel, series).
    ///
    /// With autodiff enabled the batch statistics are used and folded into
    /// the running statistics; otherwise the running statistics are used.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let (mean, var) = if B::ad_enabled() {
            self.batch_statistics(x.clone())
        } else {
            let device = x.device();
            (
                self.running_mean.value().to_device(&device),
                self.running_var.value().to_device(&device),
            )
        };
        let x_norm = (x - mean) / var.add_scalar(NORM_EPS).sqrt();
        x_norm * self.gamma.val() + self.beta.val()
    }

    fn batch_statistics(&self, x: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let [batch, _, _, time] = x.dims();
        let device = x.device();

        let mean = x.clone().mean_dim(0).mean_dim(3);
        let var = (x - mean.clone()).powf_scalar(2.0).mean_dim(0).mean_dim(3);

        let n = (batch * time) as f64;
        let correction = if n > 1.0 { n / (n - 1.0) } else { 1.0 };
        let m = self.momentum;

        let running_mean = self.running_mean.value_sync().to_device(&device);
        let running_var = self.running_var.value_sync().to_device(&device);
        self.running_mean.update(
            running_mean
                .mul_scalar(1.0 - m)
                .add(mean.clone().detach().mul_scalar(m))
                .detach(),
        );
        self.running_var.update(
            running_var
                .mul_scalar(1.0 - m)
                .add(var.clone().detach().mul_scalar(m * correction))
                .detach(),
        );

        (mean, var)
    }
}

impl<B: Backend> NamedParams<B> for TNorm<B> {
    fn export(&self, prefix: &str, state: &mut StateDict) -> anyhow::Result<()> {
        export_param(state, join(prefix, "gamma"), &self.gamma)?;
        export_param(state, join(prefix, "beta"), &self.beta)?;
        export_running(state, join(prefix, "running_mean"), &self.running_mean)?;
        export_running(state, join(prefix, "running_var"), &self.running_var)
    }

    fn merge(mut self, prefix: &str, state: &StateDict, report: &mut MergeReport) -> Self {
        self.gamma = merge_param(state, join(prefix, "gamma"), self.gamma, report);
        self.beta = merge_param(state, join(prefix, "beta"), self.beta, report);
        self.running_mean = merge_running(state, join(prefix, "running_mean"), self.running_mean, report);
        self.running_var = merge_running(state, join(prefix, "running_var"), self.running_var, report);
        self
    }
}

// ─── One dilated layer ────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct WaveLayer<B: Backend> {
    tnorm: Option<TNorm<B>>,
    snorm: Option<SNorm<B>>,
    filter_conv: Conv2d<B>,
    gate_conv: Conv2d<B>,
    residual_conv: Conv2d<B>,
    skip_conv: Conv2d<B>,
}

impl<B: Backend> WaveLayer<B> {
    /// Returns the new hidden state and the updated skip accumulator.
    fn forward(&self, x: Tensor<B, 4>, skip: Option<Tensor<B, 4>>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let residual = x.clone();

        let mut branches = vec![x.clone()];
        if let Some(tnorm) = &self.tnorm {
            branches.push(tnorm.forward(x.clone()));
        }
        if let Some(snorm) = &self.snorm {
            branches.push(snorm.forward(x.clone()));
        }
        let x = Tensor::cat(branches, 1);

        let filter = self.filter_conv.forward(x.clone()).tanh();
        let gate = sigmoid(self.gate_conv.forward(x));
        let x = filter * gate;

        let s = self.skip_conv.forward(x.clone());
        let [_, _, _, t_out] = s.dims();
        let skip = match skip {
            Some(prev) => trailing(prev, t_out) + s,
            None => s,
        };

        let x = self.residual_conv.forward(x) + trailing(residual, t_out);
        (x, skip)
    }
}

impl<B: Backend> NamedParams<B> for WaveLayer<B> {
    fn export(&self, prefix: &str, state: &mut StateDict) -> anyhow::Result<()> {
        if let Some(tnorm) = &self.tnorm {
            tnorm.export(&join(prefix, "tnorm"), state)?;
        }
        if let Some(snorm) = &self.snorm {
            snorm.export(&join(prefix, "snorm"), state)?;
        }
        self.filter_conv.export(&join(prefix, "filter_conv"), state)?;
        self.gate_conv.export(&join(prefix, "gate_conv"), state)?;
        self.residual_conv.export(&join(prefix, "residual_conv"), state)?;
        self.skip_conv.export(&join(prefix, "skip_conv"), state)
    }

    fn merge(mut self, prefix: &str, state: &StateDict, report: &mut MergeReport) -> Self {
        self.tnorm = self.tnorm.map(|m| m.merge(&join(prefix, "tnorm"), state, report));
        self.snorm = self.snorm.map(|m| m.merge(&join(prefix, "snorm"), state, report));
        self.filter_conv = self.filter_conv.merge(&join(prefix, "filter_conv"), state, report);
        self.gate_conv = self.gate_conv.merge(&join(prefix, "gate_conv"), state, report);
        self.residual_conv = self.residual_conv.merge(&join(prefix, "residual_conv"), state, report);
        self.skip_conv = self.skip_conv.merge(&join(prefix, "skip_conv"), state, report);
        self
    }
}

/// Keep the last `len` steps of the time axis.
fn trailing<B: Backend>(x: Tensor<B, 4>, len: usize) -> Tensor<B, 4> {
    let [b, c, n, t] = x.dims();
    x.slice([0..b, 0..c, 0..n, t - len..t])
}

// ─── Full model ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Wavenet<B: Backend> {
    start_conv: Conv2d<B>,
    layers: Vec<WaveLayer<B>>,
    end_conv_1: Conv2d<B>,
    end_conv_2: Conv2d<B>,
    receptive_field: usize,
}

impl<B: Backend> Wavenet<B> {
    /// history: [batch, n_his, n_route] → prediction: [batch, n_pred, n_route]
    pub fn forward(&self, history: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, n_his, n_route] = history.dims();
        let device = history.device();

        // [B, T, N] → [B, 1, N, T]
        let mut x = history.swap_dims(1, 2).unsqueeze_dim::<4>(1);
        if n_his < self.receptive_field {
            let pad = Tensor::zeros([batch, 1, n_route, self.receptive_field - n_his], &device);
            x = Tensor::cat(vec![pad, x], 3);
        }

        let mut x = self.start_conv.forward(x);
        let mut skip = None;
        for layer in &self.layers {
            let (next, acc) = layer.forward(x, skip);
            x = next;
            skip = Some(acc);
        }
        let skip = skip.unwrap_or(x);

        let out = self.end_conv_2.forward(relu(self.end_conv_1.forward(relu(skip))));
        let [_, n_pred, _, t_out] = out.dims();
        out.slice([0..batch, 0..n_pred, 0..n_route, t_out - 1..t_out])
            .reshape([batch, n_pred, n_route])
    }

    /// Snapshot of every parameter and running statistic, by name.
    pub fn state_dict(&self) -> anyhow::Result<StateDict> {
        let mut state = StateDict::default();
        self.export("", &mut state)?;
        Ok(state)
    }

    /// Apply the entries of `state` that this model also declares.
    pub fn load_state_dict(self, state: &StateDict) -> (Self, MergeReport) {
        let mut report = MergeReport::default();
        let model = self.merge("", state, &mut report);
        report.finish(state);
        (model, report)
    }
}

impl<B: Backend> NamedParams<B> for Wavenet<B> {
    fn export(&self, prefix: &str, state: &mut StateDict) -> anyhow::Result<()> {
        self.start_conv.export(&join(prefix, "start_conv"), state)?;
        for (i, layer) in self.layers.iter().enumerate() {
            layer.export(&join(prefix, &format!("layers.{i}")), state)?;
        }
        self.end_conv_1.export(&join(prefix, "end_conv_1"), state)?;
        self.end_conv_2.export(&join(prefix, "end_conv_2"), state)
    }

    fn merge(mut self, prefix: &str, state: &StateDict, report: &mut MergeReport) -> Self {
        self.start_conv = self.start_conv.merge(&join(prefix, "start_conv"), state, report);
        self.layers = self
            .layers
            .into_iter()
            .enumerate()
            .map(|(i, layer)| layer.merge(&join(prefix, &format!("layers.{i}")), state, report))
            .collect();
        self.end_conv_1 = self.end_conv_1.merge(&join(prefix, "end_conv_1"), state, report);
        self.end_conv_2 = self.end_conv_2.merge(&join(prefix, "end_conv_2"), state, report);
        self
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn config(snorm: bool, tnorm: bool) -> WavenetConfig {
        WavenetConfig::new(3, 2, 4, 2).with_snorm(snorm).with_tnorm(tnorm)
    }

    #[test]
    fn test_receptive_field() {
        assert_eq!(WavenetConfig::new(1, 1, 1, 4).receptive_field(), 16);
        assert_eq!(WavenetConfig::new(1, 1, 1, 2).receptive_field(), 4);
    }

    #[test]
    fn test_forward_shape_with_exact_receptive_field() {
        let device = Default::default();
        let model = config(true, true).init::<TestBackend>(&device);
        let history = Tensor::<TestBackend, 3>::random([5, 4, 3], burn::tensor::Distribution::Default, &device);
        assert_eq!(model.forward(history).dims(), [5, 2, 3]);
    }

    #[test]
    fn test_forward_pads_short_history() {
        let device = Default::default();
        let model = config(false, false).init::<TestBackend>(&device);
        let history = Tensor::<TestBackend, 3>::zeros([2, 2, 3], &device);
        assert_eq!(model.forward(history).dims(), [2, 2, 3]);
    }

    #[test]
    fn test_forward_accepts_longer_history() {
        let device = Default::default();
        let model = config(true, false).init::<TestBackend>(&device);
        let history = Tensor::<TestBackend, 3>::ones([1, 7, 3], &device);
        assert_eq!(model.forward(history).dims(), [1, 2, 3]);
    }

    #[test]
    fn test_tnorm_forward_updates_running_stats() {
        let device = Default::default();
        let model = config(false, true).init::<TestAutodiffBackend>(&device);
        let before = model.state_dict().unwrap();

        let history = Tensor::<TestAutodiffBackend, 3>::random(
            [4, 4, 3],
            burn::tensor::Distribution::Uniform(1.0, 2.0),
            &device,
        );
        let _ = model.forward(history);
        let after = model.state_dict().unwrap();
        assert_ne!(
            before.get("layers.0.tnorm.running_mean"),
            after.get("layers.0.tnorm.running_mean")
        );
        // learnable affine parameters are untouched by a forward pass
        assert_eq!(before.get("layers.0.tnorm.gamma"), after.get("layers.0.tnorm.gamma"));
    }

    #[test]
    fn test_state_dict_names() {
        let device = Default::default();
        let model = config(true, true).init::<TestBackend>(&device);
        let state = model.state_dict().unwrap();
        for name in [
            "start_conv.weight",
            "start_conv.bias",
            "layers.0.tnorm.gamma",
            "layers.0.tnorm.running_var",
            "layers.1.snorm.beta",
            "layers.1.filter_conv.weight",
            "end_conv_2.bias",
        ] {
            assert!(state.get(name).is_some(), "missing {name}");
        }
        // filter conv sees x, TNorm(x) and SNorm(x): 3 * 4 input channels
        assert_eq!(state.get("layers.0.filter_conv.weight").unwrap().shape, vec![4, 12, 1, 2]);
    }
}
