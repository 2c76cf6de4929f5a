// ============================================================
// Layer 4 — Collator
// ============================================================
// Implements Burn's Batcher trait: Vec<Sequence> → CollatedBatch.
//
// Sequences in a batch have different lengths, so every channel
// is right-padded to the longest one:
//
//   channel          pad value
//   token_ids        -100 (never a real id; ignored by the loss)
//   token_types      TEXT (a real type, harmless once masked)
//   pos_vecs/levels  0
//   gpt_tokens       -100
//   gen_labels       -100
//
//   attention_mask   1 for real tokens, 0 for padding
//
// Each channel is built as one flat host Vec, then turned into a
// tensor and reshaped:
//   [s1_t1, s1_t2, ..., s1_tW, s2_t1, ..., sN_tW] → [N, W]
//
// Task-specific outputs:
//   generative      gen_labels = token_ids with the prompt masked
//   classification  cls_labels = one label per sequence
//
// Every sequence in a batch must have been built under the same
// options. A batch that breaks this is a fatal precondition
// violation: `collate` reports it, the Batcher impl panics on it.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Bool, Int, Tensor},
};
use thiserror::Error;

use crate::data::position::encode_pos;
use crate::domain::options::{DownstreamTask, TrainOptions, Tpe};
use crate::domain::sequence::Sequence;
use crate::domain::token::{TokenType, PADDING_TOKEN_ID};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollateError {
    #[error("cannot collate an empty batch")]
    EmptyBatch,
    #[error("sequence '{0}' has no prompt_length but the task is generative")]
    MissingPromptLength(String),
    #[error("sequence '{0}' has no label but the task is classification")]
    MissingLabel(String),
    #[error("sequence '{0}' has no sub-token channel but shared embeddings are enabled")]
    MissingSubTokens(String),
    #[error("sequence '{name}' has pos_vec width {found}, expected {expected}")]
    PosVecWidth {
        name: String,
        found: usize,
        expected: usize,
    },
    #[error("window {start}..{end} is empty")]
    EmptyWindow { start: usize, end: usize },
}

// ─── CollatedBatch ────────────────────────────────────────────────────────────
/// A padded batch. Tensors are [batch, seq] unless noted.
#[derive(Debug, Clone)]
pub struct CollatedBatch<B: Backend> {
    /// Provenance of each row
    pub sources: Vec<String>,
    pub token_ids: Tensor<B, 2, Int>,
    pub token_types: Tensor<B, 2, Int>,
    /// [batch, seq, max_formula_depth]
    pub pos_vecs: Tensor<B, 3, Int>,
    pub pos_levels: Tensor<B, 2, Int>,
    /// [batch, seq, encoding width]; only when a tree-position encoding is set
    pub pos_encodings: Option<Tensor<B, 3>>,
    /// [batch, seq, max sub-tokens]; only with shared embeddings
    pub gpt_tokens: Option<Tensor<B, 3, Int>>,
    pub use_shared_emb: Option<Tensor<B, 2, Bool>>,
    pub attention_mask: Tensor<B, 2, Int>,
    /// Unpadded length of each row
    pub sequence_lengths: Vec<usize>,
    pub prompt_lengths: Option<Vec<usize>>,
    pub gen_labels: Option<Tensor<B, 2, Int>>,
    /// [batch]
    pub cls_labels: Option<Tensor<B, 1, Int>>,
}

impl<B: Backend> CollatedBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.sources.len()
    }

    /// Padded length of the sequence axis
    pub fn width(&self) -> usize {
        self.token_ids.dims()[1]
    }
}

// ─── Collator ─────────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Collator<B: Backend> {
    device: B::Device,
    task: Option<DownstreamTask>,
    options: TrainOptions,
}

impl<B: Backend> Collator<B> {
    /// `task` is None for pretraining batches.
    pub fn new(device: B::Device, task: Option<DownstreamTask>, options: TrainOptions) -> Self {
        Self { device, task, options }
    }

    fn check(&self, sequence: &Sequence) -> Result<(), CollateError> {
        let name = || sequence.name.clone();
        match self.task {
            Some(task) if task.is_classification() && sequence.meta.label.is_none() => {
                return Err(CollateError::MissingLabel(name()));
            }
            Some(task) if !task.is_classification() && sequence.meta.prompt_length.is_none() => {
                return Err(CollateError::MissingPromptLength(name()));
            }
            _ => {}
        }
        if self.options.shared_emb && !sequence.has_shared_emb() {
            return Err(CollateError::MissingSubTokens(name()));
        }
        let depth = self.options.max_formula_depth;
        if let Some(bad) = sequence.pos_vecs().iter().find(|p| p.len() != depth) {
            return Err(CollateError::PosVecWidth { name: name(), found: bad.len(), expected: depth });
        }
        Ok(())
    }

    pub fn collate(&self, items: &[Sequence]) -> Result<CollatedBatch<B>, CollateError> {
        if items.is_empty() {
            return Err(CollateError::EmptyBatch);
        }
        for sequence in items {
            self.check(sequence)?;
        }

        let batch_size = items.len();
        let width = items.iter().map(Sequence::len).max().unwrap_or(0).max(1);
        let depth = self.options.max_formula_depth;
        let cells = batch_size * width;

        let mut token_ids = vec![PADDING_TOKEN_ID; cells];
        let mut token_types = vec![TokenType::Text.id(); cells];
        let mut pos_vecs = vec![0i32; cells * depth];
        let mut pos_levels = vec![0i32; cells];
        let mut attention_mask = vec![0i32; cells];

        let encoding_width = self.options.pos_encoding_width();
        let mut pos_encodings = (self.options.tpe != Tpe::None).then(|| vec![0f32; cells * encoding_width]);

        let sub_width = items
            .iter()
            .filter_map(Sequence::gpt_tokens)
            .flat_map(|subs| subs.iter().map(Vec::len))
            .max()
            .unwrap_or(0)
            .max(1);
        let mut gpt_tokens = self.options.shared_emb.then(|| vec![PADDING_TOKEN_ID; cells * sub_width]);
        let mut use_shared_emb = self.options.shared_emb.then(|| vec![0i32; cells]);

        let generative = self.task.is_some_and(|t| !t.is_classification());
        let mut gen_labels = generative.then(|| vec![PADDING_TOKEN_ID; cells]);
        let mut prompt_lengths = Vec::new();
        let mut cls_labels = Vec::new();

        for (row, sequence) in items.iter().enumerate() {
            let prompt_length = sequence.meta.prompt_length.unwrap_or(0);
            if generative {
                prompt_lengths.push(prompt_length);
            }
            if let Some(label) = sequence.meta.label.filter(|_| self.task.is_some_and(|t| t.is_classification())) {
                cls_labels.push(label as i32);
            }

            for col in 0..sequence.len() {
                let cell = row * width + col;
                let id = sequence.token_ids()[col] as i32;
                let kind = sequence.token_types()[col];
                let pos_vec = &sequence.pos_vecs()[col];

                token_ids[cell] = id;
                token_types[cell] = kind.id();
                pos_levels[cell] = sequence.pos_levels()[col] as i32;
                attention_mask[cell] = 1;
                for (slot, &p) in pos_vecs[cell * depth..(cell + 1) * depth].iter_mut().zip(pos_vec) {
                    *slot = p as i32;
                }

                if let Some(encodings) = pos_encodings.as_mut() {
                    if kind.is_formula_node() {
                        let encoded = encode_pos(pos_vec, &self.options);
                        encodings[cell * encoding_width..(cell + 1) * encoding_width].copy_from_slice(&encoded);
                    }
                }

                if let (Some(gpt), Some(shared), Some(subs)) =
                    (gpt_tokens.as_mut(), use_shared_emb.as_mut(), sequence.gpt_tokens())
                {
                    let subs = &subs[col];
                    for (k, &sub) in subs.iter().enumerate() {
                        gpt[cell * sub_width + k] = sub as i32;
                    }
                    shared[cell] = i32::from(!subs.is_empty());
                }

                if let Some(labels) = gen_labels.as_mut() {
                    if col >= prompt_length {
                        labels[cell] = id;
                    }
                }
            }
        }

        let device = &self.device;
        let int2 = |data: &[i32]| Tensor::<B, 1, Int>::from_ints(data, device).reshape([batch_size, width]);

        Ok(CollatedBatch {
            sources: items.iter().map(|s| s.name.clone()).collect(),
            token_ids: int2(token_ids.as_slice()),
            token_types: int2(token_types.as_slice()),
            pos_vecs: Tensor::<B, 1, Int>::from_ints(pos_vecs.as_slice(), device).reshape([batch_size, width, depth]),
            pos_levels: int2(pos_levels.as_slice()),
            pos_encodings: pos_encodings.map(|data| {
                Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([batch_size, width, encoding_width])
            }),
            gpt_tokens: gpt_tokens.map(|data| {
                Tensor::<B, 1, Int>::from_ints(data.as_slice(), device).reshape([batch_size, width, sub_width])
            }),
            use_shared_emb: use_shared_emb.map(|data| int2(data.as_slice()).equal_elem(1)),
            attention_mask: int2(attention_mask.as_slice()),
            sequence_lengths: items.iter().map(Sequence::len).collect(),
            prompt_lengths: generative.then_some(prompt_lengths),
            gen_labels: gen_labels.map(|data| int2(data.as_slice())),
            cls_labels: (!cls_labels.is_empty())
                .then(|| Tensor::<B, 1, Int>::from_ints(cls_labels.as_slice(), device)),
        })
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<Sequence, CollatedBatch<B>> for Collator<B> {
    fn batch(&self, items: Vec<Sequence>) -> CollatedBatch<B> {
        match self.collate(&items) {
            Ok(batch) => batch,
            Err(err) => panic!("Cannot collate batch: {err}"),
        }
    }
}

// ─── Batch Trimmer ────────────────────────────────────────────────────────────
/// Window `[start, end)` of every sequence-axis channel.
///
/// `end` is clamped to the batch width. Row lengths become
/// `min(end - start, max(len - start, 0))`; prompt lengths, class
/// labels and sources pass through unchanged.
pub fn trim_batch<B: Backend>(
    batch: &CollatedBatch<B>,
    start: usize,
    end: usize,
) -> Result<CollatedBatch<B>, CollateError> {
    let end = end.min(batch.width());
    if start >= end {
        return Err(CollateError::EmptyWindow { start, end });
    }
    let rows = 0..batch.batch_size();

    let window2 = |t: &Tensor<B, 2, Int>| t.clone().slice([rows.clone(), start..end]);

    Ok(CollatedBatch {
        sources: batch.sources.clone(),
        token_ids: window2(&batch.token_ids),
        token_types: window2(&batch.token_types),
        pos_vecs: batch.pos_vecs.clone().slice([rows.clone(), start..end]),
        pos_levels: window2(&batch.pos_levels),
        pos_encodings: batch.pos_encodings.clone().map(|t| t.slice([rows.clone(), start..end])),
        gpt_tokens: batch.gpt_tokens.clone().map(|t| t.slice([rows.clone(), start..end])),
        use_shared_emb: batch.use_shared_emb.clone().map(|t| t.slice([rows.clone(), start..end])),
        attention_mask: window2(&batch.attention_mask),
        sequence_lengths: batch
            .sequence_lengths
            .iter()
            .map(|&len| (end - start).min(len.saturating_sub(start)))
            .collect(),
        prompt_lengths: batch.prompt_lengths.clone(),
        gen_labels: batch.gen_labels.as_ref().map(window2),
        cls_labels: batch.cls_labels.clone(),
    })
}
