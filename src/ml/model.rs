// ============================================================
// Layer 5 — Model Seams
// ============================================================
// The GPT-2 model itself lives outside this crate. Evaluation
// only needs three capabilities from it, each over a
// CollatedBatch:
//
//   LanguageModel → loss against given labels, argmax predictions
//   Generator     → continue a prompt batch
//   Classifier    → loss and class logits
//
// A model that supports several tasks implements several traits.

use anyhow::Result;
use burn::tensor::{backend::Backend, Int, Tensor};

use crate::data::batcher::CollatedBatch;

/// Next-token model over the hybrid text/formula vocabulary.
pub trait LanguageModel<B: Backend> {
    /// Mean cross-entropy of predicting `labels` [batch, seq] from
    /// the batch. Targets equal to PADDING_TOKEN_ID are ignored.
    fn loss(&self, batch: &CollatedBatch<B>, labels: Tensor<B, 2, Int>) -> Tensor<B, 1>;

    /// Most likely (token type, token id) of the token after each
    /// position, both [batch, seq].
    fn predict(&self, batch: &CollatedBatch<B>) -> (Tensor<B, 2, Int>, Tensor<B, 2, Int>);
}

pub trait Generator<B: Backend> {
    /// Extend every row of `prompt` until it ends or reaches
    /// `max_len` tokens. Returns prompt followed by continuation.
    fn generate(&self, prompt: &CollatedBatch<B>, max_len: usize) -> Result<CollatedBatch<B>>;
}

pub trait Classifier<B: Backend> {
    /// Mean loss against `cls_labels` and logits [batch, num_classes].
    fn classify(&self, batch: &CollatedBatch<B>) -> (Tensor<B, 1>, Tensor<B, 2>);
}
