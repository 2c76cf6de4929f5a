// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Each use case strings the other layers together for one CLI
// command:
//
//   vocab   → build the formula symbol vocabulary
//   prepare → build train/val datasets for a task and dry-run
//             the data loaders
//   inspect → tokenize one article and show every token
//
// Rules for this layer:
//   - No tensor or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Formula vocabulary building
pub mod vocab_use_case;

// Dataset construction for pretraining and downstream tasks
pub mod prepare_use_case;

// Single-article tokenization report
pub mod inspect_use_case;
