// ============================================================
// Layer 3 — Training Schedule and Early Stopping
// ============================================================
// The control logic of a training run, free of any tensor code:
//
//   epoch 0 ─ train ─ validate ─┬─ improved → checkpoint, reset counter
//   epoch 1 ─ train             └─ stalled  → counter += 1
//   ...                                        counter == patience → stop
//   epoch 10 ─ train ─ validate ...
//
// A validation round happens on every epoch divisible by
// `validate_every`. The counter and the epoch ceiling are only
// checked at epoch boundaries.
//
// The actual work (one epoch of optimisation, one validation pass,
// writing a checkpoint) is delegated to an EpochDriver, so the
// state machine can be exercised with scripted RMSE sequences.

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Running,
    StoppedEarly,
    StoppedMaxEpoch,
}

/// Epoch ceiling, validation cadence and patience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub max_epochs: usize,
    pub validate_every: usize,
    pub patience: usize,
}

impl Default for Schedule {
    fn default() -> Self {
        Self { max_epochs: 1000, validate_every: 10, patience: 5 }
    }
}

impl Schedule {
    pub fn is_validation_epoch(&self, epoch: usize) -> bool {
        epoch % self.validate_every.max(1) == 0
    }
}

/// What a validation round did to the stopping state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundOutcome {
    /// Strictly below every earlier round
    Improved,
    /// No improvement; `stalled` consecutive rounds so far
    Stalled { stalled: usize },
    /// Patience used up
    Exhausted,
}

/// Tracks the running minimum of the summed validation RMSE.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    min_rmse: Option<f64>,
    stalled: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self { patience, min_rmse: None, stalled: 0 }
    }

    pub fn observe(&mut self, total_rmse: f64) -> RoundOutcome {
        let improved = match self.min_rmse {
            None => !total_rmse.is_nan(),
            Some(min) => total_rmse < min,
        };
        if improved {
            self.min_rmse = Some(total_rmse);
            self.stalled = 0;
            return RoundOutcome::Improved;
        }
        self.stalled += 1;
        if self.stalled >= self.patience {
            RoundOutcome::Exhausted
        } else {
            RoundOutcome::Stalled { stalled: self.stalled }
        }
    }

    pub fn min_rmse(&self) -> Option<f64> {
        self.min_rmse
    }
}

/// One validation round as seen by the driver's bookkeeping hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundReport {
    pub epoch: usize,
    pub total_rmse: f64,
    pub outcome: RoundOutcome,
}

/// The work a training run performs at each step of the schedule.
pub trait EpochDriver {
    /// One full pass of optimisation over the training split.
    fn train_epoch(&mut self, epoch: usize) -> Result<()>;

    /// Refresh the best record and return its summed validation RMSE.
    fn validate(&mut self, epoch: usize) -> Result<f64>;

    /// Persist the current parameters.
    fn save_checkpoint(&mut self, epoch: usize) -> Result<()>;

    /// Called after every validation round, once the checkpoint (if any) is written.
    fn on_round(&mut self, _report: &RoundReport) -> Result<()> {
        Ok(())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSummary {
    pub state: LoopState,
    pub epochs_run: usize,
    pub rounds: usize,
    pub checkpoint_epochs: Vec<usize>,
    pub min_rmse: Option<f64>,
}

/// Drive `driver` through the schedule until early stop or the epoch ceiling.
pub fn run_schedule<D: EpochDriver>(schedule: &Schedule, driver: &mut D) -> Result<LoopSummary> {
    let mut state = LoopState::Running;
    let mut stopper = EarlyStopping::new(schedule.patience);
    let mut epochs_run = 0;
    let mut rounds = 0;
    let mut checkpoint_epochs = Vec::new();

    for epoch in 0..schedule.max_epochs {
        driver.train_epoch(epoch)?;
        epochs_run += 1;

        if !schedule.is_validation_epoch(epoch) {
            continue;
        }

        let total_rmse = driver.validate(epoch)?;
        rounds += 1;
        let outcome = stopper.observe(total_rmse);

        if outcome == RoundOutcome::Improved {
            driver.save_checkpoint(epoch)?;
            checkpoint_epochs.push(epoch);
        }
        driver.on_round(&RoundReport { epoch, total_rmse, outcome })?;

        if outcome == RoundOutcome::Exhausted {
            tracing::info!(
                "No improvement for {} validation rounds, stopping at epoch {}",
                schedule.patience,
                epoch
            );
            state = LoopState::StoppedEarly;
            break;
        }
    }

    if state == LoopState::Running {
        tracing::info!("Reached the epoch ceiling ({})", schedule.max_epochs);
        state = LoopState::StoppedMaxEpoch;
    }

    Ok(LoopSummary {
        state,
        epochs_run,
        rounds,
        checkpoint_epochs,
        min_rmse: stopper.min_rmse(),
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed summed-RMSE sequence, one value per validation round.
    struct Scripted {
        rmse: Vec<f64>,
        round: usize,
        trained: Vec<usize>,
        saved: Vec<usize>,
        reports: Vec<RoundReport>,
    }

    impl Scripted {
        fn new(rmse: Vec<f64>) -> Self {
            Self { rmse, round: 0, trained: vec![], saved: vec![], reports: vec![] }
        }
    }

    impl EpochDriver for Scripted {
        fn train_epoch(&mut self, epoch: usize) -> Result<()> {
            self.trained.push(epoch);
            Ok(())
        }

        fn validate(&mut self, _epoch: usize) -> Result<f64> {
            let v = self.rmse.get(self.round).copied().unwrap_or(f64::MAX);
            self.round += 1;
            Ok(v)
        }

        fn save_checkpoint(&mut self, epoch: usize) -> Result<()> {
            self.saved.push(epoch);
            Ok(())
        }

        fn on_round(&mut self, report: &RoundReport) -> Result<()> {
            self.reports.push(*report);
            Ok(())
        }
    }

    #[test]
    fn test_checkpoints_follow_strict_running_minimum() {
        let schedule = Schedule { max_epochs: 50, ..Schedule::default() };
        let mut driver = Scripted::new(vec![5.0, 4.0, 4.5, 3.0, 3.5]);
        let summary = run_schedule(&schedule, &mut driver).unwrap();

        // rounds 0, 1 and 3 improve
        assert_eq!(driver.saved, vec![0, 10, 30]);
        assert_eq!(summary.checkpoint_epochs, vec![0, 10, 30]);
        assert_eq!(summary.rounds, 5);
        assert_eq!(summary.min_rmse, Some(3.0));
        assert_eq!(summary.state, LoopState::StoppedMaxEpoch);
    }

    #[test]
    fn test_worsening_validation_stops_at_epoch_50() {
        let schedule = Schedule::default();
        let worsening: Vec<f64> = (0..100).map(|i| 1.0 + i as f64).collect();
        let mut driver = Scripted::new(worsening);
        let summary = run_schedule(&schedule, &mut driver).unwrap();

        assert_eq!(summary.state, LoopState::StoppedEarly);
        assert_eq!(summary.rounds, 6);
        assert_eq!(summary.epochs_run, 51);
        assert_eq!(driver.trained.last(), Some(&50));
        assert_eq!(driver.saved, vec![0]);
        assert_eq!(driver.reports.last().unwrap().outcome, RoundOutcome::Exhausted);
    }

    #[test]
    fn test_equal_rmse_counts_as_stalled() {
        let mut stopper = EarlyStopping::new(5);
        assert_eq!(stopper.observe(2.0), RoundOutcome::Improved);
        assert_eq!(stopper.observe(2.0), RoundOutcome::Stalled { stalled: 1 });
        assert_eq!(stopper.min_rmse(), Some(2.0));
    }

    #[test]
    fn test_improvement_resets_counter() {
        let schedule = Schedule { max_epochs: 200, ..Schedule::default() };
        // 4 stalls, an improvement, 4 more stalls: never 5 in a row
        let rmse = vec![3.0, 4.0, 4.0, 4.0, 4.0, 2.0, 5.0, 5.0, 5.0, 5.0, 1.0];
        let mut driver = Scripted::new(rmse);
        let summary = run_schedule(&schedule, &mut driver).unwrap();

        assert_eq!(summary.checkpoint_epochs, vec![0, 50, 100]);
        // after round 10 the scripted values run out (f64::MAX): 5 stalls → stop
        assert_eq!(summary.state, LoopState::StoppedEarly);
        assert_eq!(summary.epochs_run, 151);
    }

    #[test]
    fn test_epoch_ceiling_without_validation_beyond_first() {
        let schedule = Schedule { max_epochs: 5, ..Schedule::default() };
        let mut driver = Scripted::new(vec![1.0]);
        let summary = run_schedule(&schedule, &mut driver).unwrap();
        assert_eq!(summary.state, LoopState::StoppedMaxEpoch);
        assert_eq!(summary.epochs_run, 5);
        assert_eq!(summary.rounds, 1);
    }

    #[test]
    fn test_nan_never_counts_as_improvement() {
        let mut stopper = EarlyStopping::new(2);
        assert_eq!(stopper.observe(f64::NAN), RoundOutcome::Stalled { stalled: 1 });
        assert_eq!(stopper.observe(f64::NAN), RoundOutcome::Exhausted);
        assert_eq!(stopper.min_rmse(), None);
    }
}
