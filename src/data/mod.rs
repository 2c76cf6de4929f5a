// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from extracted article JSON to tensor batches.
//
//   article / task JSON
//       │
//       ▼
//   ArticleLoader       → reads articles, problems and task samples
//       │
//       ▼
//   SequenceTokenizer   → text runs via the subword tokenizer,
//       │                 formulas via the FormulaTokenizer
//       ▼
//   Splitter            → chunks of at most max_seq_len, never
//       │                 cutting through a formula
//       ▼
//   dataset::*          → one builder per task, Burn Dataset impls
//       │
//       ▼
//   Collator            → pads and stacks into a CollatedBatch
//       │
//       ▼
//   trim_batch          → column windows for evaluation
//
// decode.rs turns predicted ids back into text and formulas.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Per-type symbol vocabulary for formula tokens
pub mod vocab;

/// OPT tree → formula token sequence
pub mod formula_tokenizer;

/// Token ids → text and rebuilt formulas
pub mod decode;

/// Text with formula placeholders → Sequence
pub mod sequence_tokenizer;

/// Formula-preserving sequence splitting and train/val splits
pub mod splitter;

/// Tree-position encodings
pub mod position;

/// Dataset builders for pretraining and the downstream tasks
pub mod dataset;

/// Collator and batch trimmer
pub mod batcher;

/// Sharding and Burn DataLoader construction
pub mod dataloader;

/// Reads article and sample JSON from disk
pub mod loader;

#[cfg(test)]
pub(crate) mod test_support;
