// ============================================================
// Layer 4 — Day-wise Train/Val/Test Splitter
// ============================================================
// Cuts the series into three consecutive ranges of whole days
// and slides a window inside each day:
//
//   |---- n_train days ----|-- n_val --|-- n_test --|
//
//   one day (day_slot slots), n_frame = n_his + n_pred:
//   [w0 ......]
//    [w1 ......]
//     ...
//           [w_last ..]      day_slot - n_frame + 1 windows
//
// Windows never cross a day boundary, and splits never share
// a slot, so nothing leaks from val/test into training.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::data::loader::SeriesTable;
use crate::domain::window::Window;

/// How many days go to each split, and how many slots make a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySplit {
    pub n_train: usize,
    pub n_val: usize,
    pub n_test: usize,
    pub day_slot: usize,
}

impl DaySplit {
    pub fn total_days(&self) -> usize {
        self.n_train + self.n_val + self.n_test
    }

    /// Windows per day for a given frame length.
    pub fn windows_per_day(&self, n_frame: usize) -> usize {
        (self.day_slot + 1).saturating_sub(n_frame)
    }
}

/// Slide an `n_frame` window over `n_days` days starting at day `offset`.
pub fn seq_gen(
    table: &SeriesTable,
    offset: usize,
    n_days: usize,
    n_frame: usize,
    day_slot: usize,
) -> Result<Vec<Window>> {
    if n_frame == 0 || n_frame > day_slot {
        bail!("window of {n_frame} steps does not fit in a day of {day_slot} slots");
    }
    let needed = (offset + n_days) * day_slot;
    if needed > table.n_slots() {
        bail!(
            "need {needed} slots for days {offset}..{}, series has {}",
            offset + n_days,
            table.n_slots()
        );
    }

    let n_slot = day_slot - n_frame + 1;
    let mut windows = Vec::with_capacity(n_days * n_slot);
    for day in 0..n_days {
        for j in 0..n_slot {
            let start = (day + offset) * day_slot + j;
            windows.push(Window::new(table.rows(start, start + n_frame).to_vec()));
        }
    }
    Ok(windows)
}

/// Produce the raw (not yet normalised) train, val and test windows.
pub fn split_by_days(
    table: &SeriesTable,
    split: &DaySplit,
    n_frame: usize,
) -> Result<(Vec<Window>, Vec<Window>, Vec<Window>)> {
    let train = seq_gen(table, 0, split.n_train, n_frame, split.day_slot)?;
    let val = seq_gen(table, split.n_train, split.n_val, n_frame, split.day_slot)?;
    let test = seq_gen(
        table,
        split.n_train + split.n_val,
        split.n_test,
        n_frame,
        split.day_slot,
    )?;

    tracing::debug!(
        "Day split over {} days ({} windows per day): {} train, {} val, {} test windows",
        split.total_days(),
        split.windows_per_day(n_frame),
        train.len(),
        val.len(),
        test.len()
    );
    Ok((train, val, test))
}
