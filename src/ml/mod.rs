// ============================================================
// Layer 5 — ML / Evaluation Layer (Burn)
// ============================================================
// The math GPT-2 model is not part of this crate; this layer
// describes what evaluation needs from it and runs the
// evaluation passes over collated batches:
//
//   model.rs     — LanguageModel, Generator and Classifier traits
//
//   evaluator.rs — sliding-window perplexity, next-token accuracy,
//                  generation exact match, classification scores
//
// Reference: Burn Book §5 (Training)
//            Radford et al. (2019) Language Models are
//            Unsupervised Multitask Learners

/// Capabilities evaluation requires from a model
pub mod model;

/// Evaluation passes over a Dataset<Sequence>
pub mod evaluator;
