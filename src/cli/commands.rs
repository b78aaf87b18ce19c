// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `eval`, which share
// one flattened set of model / data / optimisation flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for bad values
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::train_use_case::RunConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train one version of a configuration
    Train(TrainArgs),

    /// Evaluate several trained versions and average them
    Eval(EvalArgs),
}

/// Flags shared by `train` and `eval`.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model family, used as the checkpoint name prefix
    #[arg(long, default_value = "wavenet")]
    pub model: String,

    /// Spatial normalisation branch (0 or 1)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub snorm: u8,

    /// Temporal normalisation branch (0 or 1)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=1))]
    pub tnorm: u8,

    /// Length of the history window, in slots
    #[arg(long, default_value_t = 16)]
    pub n_his: usize,

    /// Number of horizons to forecast
    #[arg(long, default_value_t = 3)]
    pub n_pred: usize,

    /// Dilated layers (dilation doubles per layer)
    #[arg(long, default_value_t = 4)]
    pub n_layers: usize,

    #[arg(long, default_value_t = 16)]
    pub hidden_channels: usize,

    /// Independent run index, part of the checkpoint name
    #[arg(long, default_value_t = 0)]
    pub version: u32,

    /// Headerless CSV: one row per slot, one column per series
    #[arg(long, default_value = "data/electricity.csv")]
    pub data_path: PathBuf,

    /// Number of series (CSV columns)
    #[arg(long, default_value_t = 336)]
    pub n_route: usize,

    /// Slots per day
    #[arg(long, default_value_t = 24)]
    pub day_slot: usize,

    #[arg(long, default_value_t = 78)]
    pub n_train: usize,

    #[arg(long, default_value_t = 7)]
    pub n_val: usize,

    #[arg(long, default_value_t = 7)]
    pub n_test: usize,

    /// Evaluation batch size
    #[arg(long, default_value_t = 48)]
    pub test_batch_size: usize,

    /// Seed for batch order, initialisation and the backend
    #[arg(long, default_value_t = 1337)]
    pub seed: u64,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Global gradient-norm ceiling
    #[arg(long, default_value_t = 10.0)]
    pub clip_norm: f64,

    #[arg(long, default_value_t = 1000)]
    pub max_epochs: usize,

    /// Validate every N epochs
    #[arg(long, default_value_t = 10)]
    pub validate_every: usize,

    /// Validation rounds without improvement before stopping
    #[arg(long, default_value_t = 5)]
    pub patience: usize,
}

/// All arguments for the `eval` command.
#[derive(Args, Debug)]
pub struct EvalArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Versions to evaluate, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = [0u32, 1, 2, 3, 4, 5])]
    pub versions: Vec<u32>,
}

/// Shared flags over the defaults. The application layer never sees clap types.
impl From<ModelArgs> for RunConfig {
    fn from(a: ModelArgs) -> Self {
        RunConfig {
            model: a.model,
            snorm: a.snorm == 1,
            tnorm: a.tnorm == 1,
            n_his: a.n_his,
            n_pred: a.n_pred,
            n_layers: a.n_layers,
            hidden_channels: a.hidden_channels,
            version: a.version,
            data_path: a.data_path,
            n_route: a.n_route,
            day_slot: a.day_slot,
            n_train: a.n_train,
            n_val: a.n_val,
            n_test: a.n_test,
            test_batch_size: a.test_batch_size,
            seed: a.seed,
            checkpoint_dir: a.checkpoint_dir,
            ..RunConfig::default()
        }
    }
}

impl From<TrainArgs> for RunConfig {
    fn from(a: TrainArgs) -> Self {
        RunConfig {
            batch_size: a.batch_size,
            lr: a.lr,
            clip_norm: a.clip_norm,
            max_epochs: a.max_epochs,
            validate_every: a.validate_every,
            patience: a.patience,
            ..RunConfig::from(a.model)
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_run_config() {
        let cli = Cli::try_parse_from(["st-forecast", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(RunConfig::from(args), RunConfig::default());
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::try_parse_from([
            "st-forecast", "train", "--snorm", "0", "--n-his", "12", "--version", "2", "--lr", "0.001",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = RunConfig::from(args);
        assert!(!cfg.snorm);
        assert!(cfg.tnorm);
        assert_eq!(cfg.n_his, 12);
        assert_eq!(cfg.version, 2);
        assert_eq!(cfg.lr, 0.001);
        assert_eq!(cfg.fingerprint().to_string(), "wavenet_s0_t1_hc16_l4_his12_pred3_v2");
    }

    #[test]
    fn test_eval_versions() {
        let cli = Cli::try_parse_from(["st-forecast", "eval"]).unwrap();
        let Commands::Eval(args) = cli.command else { panic!("expected eval") };
        assert_eq!(args.versions, vec![0, 1, 2, 3, 4, 5]);

        let cli = Cli::try_parse_from(["st-forecast", "eval", "--versions", "1,3"]).unwrap();
        let Commands::Eval(args) = cli.command else { panic!("expected eval") };
        assert_eq!(args.versions, vec![1, 3]);
    }

    #[test]
    fn test_norm_flag_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["st-forecast", "train", "--tnorm", "2"]).is_err());
    }
}
