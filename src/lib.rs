// ============================================================
// mathgpt-pipeline
// ============================================================
// Turns articles and downstream-task samples that mix text with
// formula trees into multi-channel token sequences, and batches
// them for a formula-aware GPT-2 model.
//
//   Layer 1 — cli          argument parsing and printing
//   Layer 2 — application  vocab / prepare / inspect workflows
//   Layer 3 — domain       tokens, formulas, sequences, options
//   Layer 4 — data         tokenizers, datasets, collation
//   Layer 5 — ml           model seams and evaluation loops
//   Layer 6 — infra        tokenizer, vocab and experiment files
#![recursion_limit = "256"]

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
