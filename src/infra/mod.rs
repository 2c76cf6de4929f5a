// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches disk outside the raw data files:
//
//   tokenizer_store.rs  — the GPT-2 text tokenizer (loaded from
//                         tokenizer.json) and the formula symbol
//                         vocabulary (built once, then reloaded)
//
//   experiment_store.rs — per-experiment options.json and the
//                         summary of the last prepare run
//
//   metrics.rs          — evaluation reports, classification
//                         scores, preds.txt / labels.txt
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Text tokenizer and formula vocabulary persistence
pub mod tokenizer_store;

/// Experiment options and summaries
pub mod experiment_store;

/// Evaluation scores and output files
pub mod metrics;
