// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any one business
// layer:
//
//   checkpoint.rs — Parameter state per fingerprint
//                   JSON StateDict files plus the effective
//                   RunConfig, in one directory.
//
//   metrics.rs    — Run log
//                   One CSV row per validation round for
//                   later plotting.
//
//   report.rs     — Console report
//                   (val, test) metric lines per horizon and
//                   the summed-RMSE summary.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Rust Book §12 (I/O and File Handling)

/// Checkpoint saving and loading
pub mod checkpoint;

/// Validation round CSV logger
pub mod metrics;

/// Metric formatting for stdout
pub mod report;
