// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that describe what the
// pipeline works with:
//
//   token.rs    — token types and the shared padding sentinel
//   formula.rs  — OPT trees and formulas as they arrive on disk
//   sequence.rs — the multi-channel Sequence record
//   sample.rs   — raw article / task sample JSON shapes
//   options.rs  — the configuration surface (TrainOptions)
//   traits.rs   — seams other layers implement
//
// Rules for this layer:
//   - NO Burn tensor types here
//   - NO file I/O
//   - Only data and the invariants that keep it consistent

/// Token types and special ids
pub mod token;

/// OPT formula trees
pub mod formula;

/// Multi-channel token sequences
pub mod sequence;

/// Raw article and downstream-task samples
pub mod sample;

/// Pipeline configuration
pub mod options;

/// Core abstractions (traits) that other layers implement
pub mod traits;
