// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define what the system
// works with: windows of a multivariate series, the metric
// vectors a forecast is scored with, the best-so-far record,
// and the fingerprint that names a checkpoint.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Everything here is unit-testable without a device.

// Splits, windows and z-score statistics
pub mod window;

// Per-horizon MAPE / MAE / RMSE vectors and the best record
pub mod metrics;

// Deterministic checkpoint naming
pub mod fingerprint;

// Validation-round scheduling and early stopping
pub mod schedule;

// Errors callers match on
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
