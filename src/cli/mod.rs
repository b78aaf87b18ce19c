// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains one version and reports its best metrics
//   2. `eval`  — scores several trained versions and their mean
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvalArgs, TrainArgs};

use crate::application::{
    eval_use_case::EvalUseCase,
    train_use_case::{RunConfig, TrainUseCase},
};

#[derive(Parser, Debug)]
#[command(
    name = "st-forecast",
    version = "0.1.0",
    about = "Train and evaluate a multi-horizon forecaster over many parallel series."
)]
pub struct Cli {
    /// The subcommand to run (train or eval)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Eval(args) => run_eval(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    let cfg = RunConfig::from(args);
    tracing::info!("Training '{}' on {}", cfg.fingerprint(), cfg.data_path.display());

    let outcome = TrainUseCase::new(cfg).execute()?;

    let summary = &outcome.summary;
    println!(
        "Stopped: {:?} after {} epochs ({} validation rounds, checkpoints at {:?})",
        summary.state, summary.epochs_run, summary.rounds, summary.checkpoint_epochs
    );
    println!("Checkpoint: {}", outcome.checkpoint.display());
    Ok(())
}

fn run_eval(args: EvalArgs) -> Result<()> {
    let cfg = RunConfig::from(args.model);
    let aggregate = EvalUseCase::new(cfg, args.versions).execute()?;
    tracing::info!("Evaluated {} versions", aggregate.per_version.len());
    Ok(())
}
