// ============================================================
// Layer 5 — Evaluation
// ============================================================
// Four evaluation passes over a Dataset<Sequence>:
//
//   evaluate_lm           sliding-window perplexity
//   evaluate_lm_accuracy  next-token (type, id) accuracy
//   evaluate_gen_task     exact match + preds.txt / labels.txt
//   evaluate_cls_task     accuracy + macro F1
//
// Sliding windows, for len 5, stride 2, max_seq_len 3:
//
//   tokens   0 1 2 3 4
//   win 1    T T               targets 0..2
//   win 2      c T T           context 1, targets 2..4
//   win 3          c T         context 3, target 4
//
// Context columns (c) are fed to the model but their labels are
// PADDING_TOKEN_ID, so every token is scored exactly once:
//
//   perplexity = exp( Σ loss_w · targets_w / Σ len )
//
// Reference: Burn Book §5 (Training, validation loop)

use std::path::Path;

use anyhow::{anyhow, ensure, Result};
use burn::{
    data::dataset::Dataset,
    tensor::{backend::Backend, ElementConversion, Int, Tensor},
};

use crate::data::batcher::{trim_batch, CollatedBatch, Collator};
use crate::data::dataset::progress_bar;
use crate::data::decode::decode_sequence;
use crate::data::vocab::FormulaVocab;
use crate::domain::options::TrainOptions;
use crate::domain::sequence::Sequence;
use crate::domain::token::{TokenType, PADDING_TOKEN_ID};
use crate::domain::traits::TextTokenizer;
use crate::infra::metrics::{accuracy, macro_f1, write_generations, EvalReport};
use crate::ml::model::{Classifier, Generator, LanguageModel};

/// One perplexity window: columns `start..end`, of which the last
/// `target_len` are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
    pub target_len: usize,
}

pub fn sliding_windows(len: usize, stride: usize, max_len: usize) -> Vec<Window> {
    (0..len)
        .step_by(stride.max(1))
        .map(|split| {
            let end = (split + stride).min(len);
            Window { start: (split + stride).saturating_sub(max_len), end, target_len: end - split }
        })
        .collect()
}

// ─── Language modelling ───────────────────────────────────────────────────────
pub fn evaluate_lm<B, M, D>(model: &M, dataset: &D, collator: &Collator<B>, options: &TrainOptions) -> Result<EvalReport>
where
    B: Backend,
    M: LanguageModel<B>,
    D: Dataset<Sequence>,
{
    let stride = options.effective_stride();
    let mut total_loss = 0.0;
    let mut windows = 0usize;
    let mut nll = 0.0;
    let mut total_len = 0usize;
    let pb = progress_bar(dataset.len(), "perplexity");

    // One sequence per batch: padding would skew the per-window mean
    for sequence in dataset.iter() {
        let batch = collator.collate(std::slice::from_ref(&sequence))?;
        let len = batch.width();
        total_len += len;

        for window in sliding_windows(len, stride, options.max_seq_len) {
            let sub = trim_batch(&batch, window.start, window.end)?;
            let context = window.end - window.start - window.target_len;
            let labels = mask_context(sub.token_ids.clone(), context);
            let loss = model.loss(&sub, labels).into_scalar().elem::<f64>();
            total_loss += loss;
            windows += 1;
            nll += loss * window.target_len as f64;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    ensure!(total_len > 0, "nothing to evaluate: the dataset has no tokens");
    let perplexity = (nll / total_len as f64).exp();
    tracing::info!("Perplexity over {} tokens ({} windows): {:.3}", total_len, windows, perplexity);
    Ok(EvalReport::new(total_loss / windows as f64).with("Perplexity", perplexity))
}

fn mask_context<B: Backend>(labels: Tensor<B, 2, Int>, context: usize) -> Tensor<B, 2, Int> {
    if context == 0 {
        return labels;
    }
    let [rows, cols] = labels.dims();
    let mask = Tensor::<B, 1, Int>::arange(0..cols as i64, &labels.device())
        .lower_elem(context as i64)
        .reshape([1, cols])
        .expand([rows, cols]);
    labels.mask_fill(mask, PADDING_TOKEN_ID)
}

pub fn evaluate_lm_accuracy<B, M, D>(
    model: &M,
    dataset: &D,
    collator: &Collator<B>,
    options: &TrainOptions,
) -> Result<EvalReport>
where
    B: Backend,
    M: LanguageModel<B>,
    D: Dataset<Sequence>,
{
    let sequences: Vec<Sequence> = dataset.iter().collect();
    let mut total_loss = 0.0;
    let mut batches = 0usize;
    let mut correct = 0usize;
    let mut targets = 0usize;

    for chunk in sequences.chunks(options.batch_size.max(1)) {
        let batch = collator.collate(chunk)?;
        let labels = batch.gen_labels.clone().unwrap_or_else(|| batch.token_ids.clone());
        total_loss += model.loss(&batch, labels.clone()).into_scalar().elem::<f64>();
        batches += 1;

        let (type_preds, token_preds) = model.predict(&batch);
        let type_preds = host_rows(type_preds);
        let token_preds = host_rows(token_preds);
        let type_targets = host_rows(batch.token_types.clone());
        let token_targets = host_rows(labels);

        // Position i predicts the token at i + 1
        for row in 0..batch.batch_size() {
            for i in 1..batch.width() {
                if token_targets[row][i] == PADDING_TOKEN_ID as i64 {
                    continue;
                }
                targets += 1;
                if type_preds[row][i - 1] == type_targets[row][i] && token_preds[row][i - 1] == token_targets[row][i] {
                    correct += 1;
                }
            }
        }
    }

    ensure!(batches > 0, "nothing to evaluate: the dataset is empty");
    let accuracy = if targets == 0 { 0.0 } else { correct as f64 / targets as f64 };
    tracing::info!("Next-token accuracy: {}/{} ({:.3})", correct, targets, accuracy);
    Ok(EvalReport::new(total_loss / batches as f64).with("Accuracy", accuracy))
}

// ─── Generation ───────────────────────────────────────────────────────────────
/// Generate a continuation for every prompt and compare it with the
/// reference. Decoded predictions and references are written to
/// `out_dir`. The collator must be built for a generative task.
pub fn evaluate_gen_task<B, M, D>(
    model: &M,
    dataset: &D,
    collator: &Collator<B>,
    options: &TrainOptions,
    text_tokenizer: &dyn TextTokenizer,
    vocab: &FormulaVocab,
    out_dir: &Path,
) -> Result<EvalReport>
where
    B: Backend,
    M: Generator<B>,
    D: Dataset<Sequence>,
{
    let mut predictions = Vec::with_capacity(dataset.len());
    let mut labels = Vec::with_capacity(dataset.len());
    let mut exact = 0usize;
    let pb = progress_bar(dataset.len(), "generate");

    // One prompt at a time: prompts differ in length
    for sequence in dataset.iter() {
        let batch = collator.collate(std::slice::from_ref(&sequence))?;
        let split = batch
            .prompt_lengths
            .as_ref()
            .and_then(|p| p.first().copied())
            .ok_or_else(|| anyhow!("sequence '{}' has no prompt length", sequence.name))?;

        let prompt = trim_batch(&batch, 0, split)?;
        let generated = model.generate(&prompt, options.max_seq_len)?;
        let label = continuation(&batch, split, options.max_seq_len)?;
        let prediction = continuation(&generated, split, options.max_seq_len)?;

        if prediction == label {
            exact += 1;
        }
        predictions.push(decode_sequence(&prediction.0, &prediction.1, text_tokenizer, vocab)?);
        labels.push(decode_sequence(&label.0, &label.1, text_tokenizer, vocab)?);
        pb.inc(1);
    }
    pb.finish_and_clear();

    ensure!(!labels.is_empty(), "nothing to evaluate: the dataset is empty");
    write_generations(out_dir, &predictions, &labels)?;
    let accuracy = exact as f64 / labels.len() as f64;
    tracing::info!("Exact match: {}/{} ({:.3})", exact, labels.len(), accuracy);
    Ok(EvalReport::new(0.0).with("Exact Match Accuracy", accuracy))
}

// ─── Classification ───────────────────────────────────────────────────────────
pub fn evaluate_cls_task<B, M, D>(
    model: &M,
    dataset: &D,
    collator: &Collator<B>,
    options: &TrainOptions,
) -> Result<EvalReport>
where
    B: Backend,
    M: Classifier<B>,
    D: Dataset<Sequence>,
{
    let sequences: Vec<Sequence> = dataset.iter().collect();
    let mut total_loss = 0.0;
    let mut batches = 0usize;
    let mut predictions = Vec::with_capacity(sequences.len());
    let mut labels = Vec::with_capacity(sequences.len());

    for chunk in sequences.chunks(options.batch_size.max(1)) {
        let batch = collator.collate(chunk)?;
        let cls_labels = batch
            .cls_labels
            .clone()
            .ok_or_else(|| anyhow!("classification batch has no labels"))?;
        let (loss, logits) = model.classify(&batch);
        total_loss += loss.into_scalar().elem::<f64>();
        batches += 1;

        predictions.extend(logits.argmax(1).flatten::<1>(0, 1).into_data().iter::<i64>());
        labels.extend(cls_labels.into_data().iter::<i64>());
    }

    ensure!(batches > 0, "nothing to evaluate: the dataset is empty");
    let acc = accuracy(&predictions, &labels);
    let f1 = macro_f1(&predictions, &labels);
    tracing::info!("Classification over {} samples: accuracy {:.3}, F1 {:.3}", labels.len(), acc, f1);
    Ok(EvalReport::new(total_loss / batches as f64).with("Accuracy", acc).with("F1", f1))
}

// ─── Helpers ──────────────────────────────────────────────────────────────────
fn host_rows<B: Backend>(tensor: Tensor<B, 2, Int>) -> Vec<Vec<i64>> {
    let [_, cols] = tensor.dims();
    let flat: Vec<i64> = tensor.into_data().iter::<i64>().collect();
    flat.chunks(cols.max(1)).map(<[i64]>::to_vec).collect()
}

/// Tokens of the first row after the prompt, up to `max_len`. Empty
/// when the prompt alone reaches `max_len` or the row ends at the prompt.
fn continuation<B: Backend>(
    batch: &CollatedBatch<B>,
    split: usize,
    max_len: usize,
) -> Result<(Vec<u32>, Vec<TokenType>)> {
    if split >= batch.width().min(max_len) {
        return Ok((Vec::new(), Vec::new()));
    }
    Ok(first_row(&trim_batch(batch, split, max_len)?))
}

/// Unpadded ids and types of the first row.
fn first_row<B: Backend>(batch: &CollatedBatch<B>) -> (Vec<u32>, Vec<TokenType>) {
    let len = batch.sequence_lengths.first().copied().unwrap_or(0);
    let ids = host_rows(batch.token_ids.clone()).into_iter().next().unwrap_or_default();
    let types = host_rows(batch.token_types.clone()).into_iter().next().unwrap_or_default();
    ids.into_iter()
        .zip(types)
        .take(len)
        .filter_map(|(id, kind)| Some((u32::try_from(id).ok()?, TokenType::from_id(kind)?)))
        .unzip()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs};

    use burn::backend::NdArray;

    use super::*;
    use crate::data::dataset::{solving::build_solving_dataset, BuildStats, SequenceDataset};
    use crate::data::sequence_tokenizer::SequenceTokenizer;
    use crate::data::test_support::{options_with_depth, WordTokenizer};
    use crate::domain::options::DownstreamTask;
    use crate::domain::sample::{SolvingTaskSample, TaggedText};
    use crate::domain::sequence::{SequenceMeta, Token};

    type TB = NdArray;

    fn text_seq(name: &str, ids: &[u32], depth: usize) -> Sequence {
        let mut s = Sequence::new(name, false);
        for &id in ids {
            s.push_token(Token::flat(id, TokenType::Text, depth, false));
        }
        s
    }

    fn shift_left(t: Tensor<TB, 2, Int>) -> Tensor<TB, 2, Int> {
        let [rows, cols] = t.dims();
        if cols < 2 {
            return t;
        }
        Tensor::cat(vec![t.clone().slice([0..rows, 1..cols]), t.slice([0..rows, cols - 1..cols])], 1)
    }

    /// Loss = number of scored targets; predicts the true next token.
    struct Oracle;

    impl LanguageModel<TB> for Oracle {
        fn loss(&self, _batch: &CollatedBatch<TB>, labels: Tensor<TB, 2, Int>) -> Tensor<TB, 1> {
            let device = labels.device();
            let scored = labels.into_data().iter::<i64>().filter(|&v| v != PADDING_TOKEN_ID as i64).count();
            Tensor::from_floats([scored as f32], &device)
        }

        fn predict(&self, batch: &CollatedBatch<TB>) -> (Tensor<TB, 2, Int>, Tensor<TB, 2, Int>) {
            (shift_left(batch.token_types.clone()), shift_left(batch.token_ids.clone()))
        }
    }

    /// Predicts the current token again.
    struct Stuck;

    impl LanguageModel<TB> for Stuck {
        fn loss(&self, _batch: &CollatedBatch<TB>, labels: Tensor<TB, 2, Int>) -> Tensor<TB, 1> {
            Tensor::from_floats([1.0f32], &labels.device())
        }

        fn predict(&self, batch: &CollatedBatch<TB>) -> (Tensor<TB, 2, Int>, Tensor<TB, 2, Int>) {
            (batch.token_types.clone(), batch.token_ids.clone())
        }
    }

    #[test]
    fn test_sliding_windows_cover_every_token_once() {
        let windows: Vec<_> = sliding_windows(5, 2, 3).into_iter().map(|w| (w.start, w.end, w.target_len)).collect();
        assert_eq!(windows, vec![(0, 2, 2), (1, 4, 2), (3, 5, 1)]);

        let windows = sliding_windows(4, 4, 4);
        assert_eq!(windows, vec![Window { start: 0, end: 4, target_len: 4 }]);
        assert!(sliding_windows(0, 4, 4).is_empty());
    }

    #[test]
    fn test_perplexity_scores_only_window_targets() {
        let options = TrainOptions { max_seq_len: 3, stride: Some(2), max_formula_depth: 4, ..TrainOptions::default() };
        let collator = Collator::<TB>::new(Default::default(), None, options.clone());
        let dataset = SequenceDataset::new(vec![text_seq("a", &[1, 2, 3, 4, 5], 4)], BuildStats::default());

        let report = evaluate_lm(&Oracle, &dataset, &collator, &options).unwrap();
        // scored targets per window: 2, 2, 1
        assert!((report.loss - 5.0 / 3.0).abs() < 1e-9);
        let expected = (9.0f64 / 5.0).exp();
        assert!((report.metric("Perplexity").unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_accuracy_skips_padding() {
        let options = TrainOptions { batch_size: 2, max_formula_depth: 4, ..TrainOptions::default() };
        let collator = Collator::<TB>::new(Default::default(), None, options.clone());
        let dataset = SequenceDataset::new(
            vec![text_seq("a", &[1, 2, 3, 4], 4), text_seq("b", &[5, 6], 4)],
            BuildStats::default(),
        );

        let report = evaluate_lm_accuracy(&Oracle, &dataset, &collator, &options).unwrap();
        assert_eq!(report.metric("Accuracy"), Some(1.0));
        assert_eq!(report.loss, 6.0);

        let report = evaluate_lm_accuracy(&Stuck, &dataset, &collator, &options).unwrap();
        assert_eq!(report.metric("Accuracy"), Some(0.0));
    }

    /// Returns the stored reference for known prompts, the bare prompt otherwise.
    struct Parrot {
        answers: HashMap<String, Sequence>,
        collator: Collator<TB>,
    }

    impl Generator<TB> for Parrot {
        fn generate(&self, prompt: &CollatedBatch<TB>, _max_len: usize) -> Result<CollatedBatch<TB>> {
            match self.answers.get(&prompt.sources[0]) {
                Some(full) => Ok(self.collator.collate(std::slice::from_ref(full))?),
                None => Ok(prompt.clone()),
            }
        }
    }

    #[test]
    fn test_gen_task_exact_match_and_outputs() {
        let words = WordTokenizer::default();
        let vocab = FormulaVocab::default();
        let options = options_with_depth(4);
        let tokenizer = SequenceTokenizer::new(&words, &vocab, &options);

        let sample = |name: &str| {
            let mut s = tokenizer.tokenize_text("what is it the answer").unwrap();
            s.name = name.to_string();
            s.meta = SequenceMeta::with_prompt_length(3);
            s
        };
        let dataset = SequenceDataset::new(vec![sample("a"), sample("b")], BuildStats::default());
        let collator = Collator::<TB>::new(Default::default(), Some(DownstreamTask::Headlines), options.clone());
        let parrot = Parrot { answers: HashMap::from([("a".to_string(), sample("a"))]), collator: collator.clone() };

        let out = tempfile::tempdir().unwrap();
        let report = evaluate_gen_task(&parrot, &dataset, &collator, &options, &words, &vocab, out.path()).unwrap();

        assert_eq!(report.metric("Exact Match Accuracy"), Some(0.5));
        assert_eq!(fs::read_to_string(out.path().join("labels.txt")).unwrap(), "the answer\nthe answer");
        assert_eq!(fs::read_to_string(out.path().join("preds.txt")).unwrap(), "the answer\n");
    }

    #[test]
    fn test_gen_task_survives_prompts_longer_than_the_window() {
        let words = WordTokenizer::default();
        let vocab = FormulaVocab::default();
        let options = TrainOptions { max_seq_len: 6, ..options_with_depth(4) };
        let tokenizer = SequenceTokenizer::new(&words, &vocab, &options);

        let samples = [
            // prompt: Question: a b c d e f [SEP] Solution: (9 tokens)
            SolvingTaskSample {
                problem: TaggedText::plain("a b c d e f"),
                steps: TaggedText::plain("s"),
                answer: TaggedText::plain("1"),
            },
            // prompt: Question: x [SEP] Solution: (4 tokens)
            SolvingTaskSample {
                problem: TaggedText::plain("x"),
                steps: TaggedText::plain("y"),
                answer: TaggedText::plain("z"),
            },
        ];
        let dataset = build_solving_dataset(&samples, &tokenizer).unwrap();
        assert_eq!(dataset.stats().trimmed_sequences, 2);

        let collator = Collator::<TB>::new(Default::default(), Some(DownstreamTask::Solving), options.clone());
        let parrot = Parrot { answers: HashMap::new(), collator: collator.clone() };
        let out = tempfile::tempdir().unwrap();
        let report = evaluate_gen_task(&parrot, &dataset, &collator, &options, &words, &vocab, out.path()).unwrap();

        // the long prompt leaves nothing to predict, so its empty label matches
        assert_eq!(report.metric("Exact Match Accuracy"), Some(0.5));
        assert_eq!(fs::read_to_string(out.path().join("labels.txt")).unwrap(), "\ny [SEP]");
        assert_eq!(fs::read_to_string(out.path().join("preds.txt")).unwrap(), "\n");
    }

    /// Always picks class 1.
    struct AlwaysOne;

    impl Classifier<TB> for AlwaysOne {
        fn classify(&self, batch: &CollatedBatch<TB>) -> (Tensor<TB, 1>, Tensor<TB, 2>) {
            let rows = batch.batch_size();
            let device = batch.token_ids.device();
            let logits: Vec<f32> = (0..rows).flat_map(|_| [0.0, 1.0, 0.0]).collect();
            (
                Tensor::from_floats([0.5f32], &device),
                Tensor::<TB, 1>::from_floats(logits.as_slice(), &device).reshape([rows, 3]),
            )
        }
    }

    #[test]
    fn test_cls_task_accuracy_and_f1() {
        let options = TrainOptions { batch_size: 2, num_classes: 3, max_formula_depth: 4, ..TrainOptions::default() };
        let collator = Collator::<TB>::new(Default::default(), Some(DownstreamTask::AnswerScoring), options.clone());
        let sequences = [0, 1, 1, 2]
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let mut s = text_seq(&format!("s{i}"), &[1, 2], 4);
                s.meta = SequenceMeta::with_label(label);
                s
            })
            .collect();
        let dataset = SequenceDataset::new(sequences, BuildStats::default());

        let report = evaluate_cls_task(&AlwaysOne, &dataset, &collator, &options).unwrap();
        assert_eq!(report.loss, 0.5);
        assert_eq!(report.metric("Accuracy"), Some(0.5));
        assert!((report.metric("F1").unwrap() - 2.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        let options = TrainOptions::default();
        let collator = Collator::<TB>::new(Default::default(), None, options.clone());
        let dataset = SequenceDataset::default();
        assert!(evaluate_lm(&Oracle, &dataset, &collator, &options).is_err());
        assert!(evaluate_lm_accuracy(&Oracle, &dataset, &collator, &options).is_err());
    }
}
