// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training one version, or scoring several).
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow and the RunConfig it consumes
pub mod train_use_case;

// The multi-version evaluation workflow
pub mod eval_use_case;
