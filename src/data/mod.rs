// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the raw CSV file to device-ready batches:
//
//   series.csv
//       │
//       ▼
//   CsvLoader         → reads the slot x series table
//       │
//       ▼
//   splitter          → whole-day train / val / test ranges,
//       │               sliding windows inside each day
//       ▼
//   WindowDataset     → z-scored splits (train statistics)
//       │
//       ▼
//   gen_batch         → shuffled / ordered mini-batches per pass
//       │
//       ▼
//   WindowBatcher     → history / target tensors
//
// Reference: Burn Book §4 (Datasets and Batchers)

/// Reads the headerless series CSV
pub mod loader;

/// Day-wise split and window extraction
pub mod splitter;

/// Normalised splits behind the WindowSource trait
pub mod dataset;

/// Lazy per-pass mini-batch iteration
pub mod generator;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
