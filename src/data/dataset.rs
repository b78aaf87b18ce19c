use std::path::Path;

use anyhow::{Context, Result};

use crate::data::loader::CsvLoader;
use crate::data::splitter::{split_by_days, DaySplit};
use crate::domain::error::ForecastError;
use crate::domain::traits::WindowSource;
use crate::domain::window::{Split, Window, WindowShape, ZScore};

/// The three z-scored splits plus the statistics used to produce them.
#[derive(Debug, Clone)]
pub struct WindowDataset {
    train: Vec<Window>,
    val: Vec<Window>,
    test: Vec<Window>,
    stats: ZScore,
    shape: WindowShape,
}

impl WindowDataset {
    /// Normalise raw splits with statistics fitted on `train` only.
    pub fn from_raw(
        train: Vec<Window>,
        val: Vec<Window>,
        test: Vec<Window>,
        shape: WindowShape,
    ) -> Result<Self, ForecastError> {
        for (split, windows) in [(Split::Train, &train), (Split::Val, &val), (Split::Test, &test)] {
            if windows.is_empty() {
                return Err(ForecastError::EmptySplit(split));
            }
            if let Some(bad) = windows.iter().find(|w| w.values().len() != shape.window_len()) {
                return Err(ForecastError::ShapeMismatch {
                    expected: vec![shape.n_frame(), shape.n_route],
                    found: vec![bad.values().len()],
                });
            }
        }

        let stats = ZScore::fit(&train);
        let norm = |ws: Vec<Window>| -> Vec<Window> {
            ws.iter()
                .map(|w| w.map(|v| stats.normalize(v as f64) as f32))
                .collect()
        };

        Ok(Self {
            train: norm(train),
            val: norm(val),
            test: norm(test),
            stats,
            shape,
        })
    }

    pub fn len(&self, split: Split) -> usize {
        self.get_data(split).len()
    }
}

impl WindowSource for WindowDataset {
    fn get_data(&self, split: Split) -> &[Window] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    fn shape(&self) -> WindowShape {
        self.shape
    }

    fn stats(&self) -> ZScore {
        self.stats
    }
}

/// CSV file → day-wise windows → z-scored splits.
pub fn data_gen(path: impl AsRef<Path>, split: &DaySplit, shape: WindowShape) -> Result<WindowDataset> {
    let path = path.as_ref();
    let table = CsvLoader::new(path, shape.n_route).load()?;
    let (train, val, test) = split_by_days(&table, split, shape.n_frame())
        .with_context(|| format!("Cannot cut '{}' into day windows", path.display()))?;
    let dataset = WindowDataset::from_raw(train, val, test, shape)?;

    tracing::info!(
        "Dataset ready: {} train, {} val, {} test windows (mean={:.3}, std={:.3})",
        dataset.len(Split::Train),
        dataset.len(Split::Val),
        dataset.len(Split::Test),
        dataset.stats.mean,
        dataset.stats.std,
    );
    Ok(dataset)
}
