// ============================================================
// Layer 4 — Sequence Datasets
// ============================================================
// Five builders turn raw samples into model-ready Sequences.
// All of them implement Burn's Dataset<Sequence>, so any of them
// can be handed to the same collator and data loader:
//
//   pretrain        articles → split into max_seq_len chunks
//   gen_task        headline prompt/label pairs
//   answer_scoring  graded answers, assembled per fetch
//   feedback        problem + answer → feedback
//   solving         problem → steps + final answer
//
// Shared rules:
//   - every textual field goes through the sequence tokenizer
//   - when a sample is too long, the EARLIEST component is
//     trimmed with the splitter, never the label
//   - missing formulas and trimmed samples are counted and
//     logged once the dataset is built
//
// Reference: Burn Book §4 (Datasets)

use burn::data::dataset::Dataset;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

use crate::data::splitter::split_sequence;
use crate::domain::sequence::Sequence;

pub mod answer_scoring;
pub mod feedback;
pub mod gen_task;
pub mod pretrain;
pub mod solving;

/// Construction-time failures. Raised for inconsistent input,
/// never for ordinary data-quality gaps.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("cannot trim {overflow} tokens from a {len}-token {component}")]
    ComponentTooShort {
        component: &'static str,
        len: usize,
        overflow: usize,
    },
    #[error("sample references unknown problem '{0}'")]
    UnknownProblem(String),
    #[error("problem id '{0}' is not an integer")]
    BadProblemId(String),
    #[error("grade {grade} is outside 0..{num_classes}")]
    GradeOutOfRange { grade: usize, num_classes: usize },
}

/// Aggregate counts reported after construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Placeholders whose formula was absent
    pub missing_formulas: usize,
    /// Samples that were trimmed, split, or (solving) overflowed
    pub trimmed_sequences: usize,
    /// Formulas lost to trimming or to oversized-formula drops
    pub dropped_formulas: usize,
}

impl BuildStats {
    pub fn log(&self, dataset: &str, sequences: usize) {
        tracing::info!(
            "{} dataset: {} sequences, {} missing formulas, {} trimmed, {} formulas dropped",
            dataset,
            sequences,
            self.missing_formulas,
            self.trimmed_sequences,
            self.dropped_formulas,
        );
    }
}

// ─── SequenceDataset ──────────────────────────────────────────────────────────
/// Sequences fully built at construction time.
#[derive(Debug, Clone, Default)]
pub struct SequenceDataset {
    sequences: Vec<Sequence>,
    stats: BuildStats,
}

impl SequenceDataset {
    pub fn new(sequences: Vec<Sequence>, stats: BuildStats) -> Self {
        Self { sequences, stats }
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }
}

impl Dataset<Sequence> for SequenceDataset {
    fn get(&self, index: usize) -> Option<Sequence> {
        self.sequences.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.sequences.len()
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────
/// Shorten `component` by at least `overflow` tokens, keeping its
/// head and never cutting inside a formula.
pub(crate) fn trim_component(
    component: &Sequence,
    overflow: usize,
    name: &'static str,
    stats: &mut BuildStats,
) -> Result<Sequence, DatasetError> {
    let too_short = || DatasetError::ComponentTooShort {
        component: name,
        len: component.len(),
        overflow,
    };
    if overflow >= component.len() {
        return Err(too_short());
    }

    let trimmed = split_sequence(component, component.len() - overflow)
        .into_iter()
        .next()
        .ok_or_else(too_short)?;

    stats.trimmed_sequences += 1;
    stats.dropped_formulas +=
        component.count_formulas(0, component.len()) - trimmed.count_formulas(0, trimmed.len());
    Ok(trimmed)
}

pub(crate) fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] {msg:<16!} {wide_bar} {pos}/{len}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb
}
