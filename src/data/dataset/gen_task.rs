// ============================================================
// Layer 4 — Generative Task Dataset (headlines)
// ============================================================
//   "Question: " prompt | "[SEP] Summary: " | label <|endoftext|>
//   └──────────── prompt_length ──────────┘
//
// The prompt is the component trimmed when a sample is too long.
//
// Region extraction (eval_formulas / eval_text) turns one sample
// into several, each with a single region of the label as its
// target and everything before that region as context:
//
//   label:  T T [ f f ] T T T [ g ] T
//   eval_formulas → targets "f f ]" and "g ]"
//   eval_text     → targets "T T T [" (a text run after a formula,
//                   up to and including the next formula start)
//
// In baseline mode formulas are plain text, so the delimiters are
// found by matching the tokenized " <m>" / " </m>" markers.
// Extraction stops at the first text region of two tokens or
// fewer. A prompt trimmed for one region stays trimmed for the
// following regions of the same sample.

use anyhow::Result;

use crate::data::dataset::{progress_bar, trim_component, BuildStats, SequenceDataset};
use crate::data::sequence_tokenizer::SequenceTokenizer;
use crate::domain::sample::GenTaskSample;
use crate::domain::sequence::{Sequence, SequenceMeta};
use crate::domain::token::{TokenType, EOS_TOKEN, SEP_TOKEN};

/// Where a formula starts or ends in a label.
enum Delimiter {
    /// Structured mode: a marker token type
    Marker(TokenType),
    /// Baseline mode: any of several text token runs
    Text(Vec<Vec<u32>>),
}

impl Delimiter {
    /// Index just past the first occurrence in `sequence`.
    fn find_after(&self, sequence: &Sequence) -> Option<usize> {
        match self {
            Delimiter::Marker(kind) => sequence.token_types().iter().position(|t| t == kind).map(|i| i + 1),
            Delimiter::Text(patterns) => {
                let ids = sequence.token_ids();
                (0..ids.len()).find_map(|i| {
                    patterns
                        .iter()
                        .find(|p| !p.is_empty() && ids[i..].starts_with(p))
                        .map(|p| i + p.len())
                })
            }
        }
    }
}

struct Regions {
    formula_start: Delimiter,
    formula_end: Delimiter,
}

impl Regions {
    fn new(tokenizer: &SequenceTokenizer) -> Result<Self> {
        if !tokenizer.options().baseline {
            return Ok(Self {
                formula_start: Delimiter::Marker(TokenType::StartFormula),
                formula_end: Delimiter::Marker(TokenType::EndFormula),
            });
        }
        let ids = |text: &str| -> Result<Vec<u32>> { Ok(tokenizer.tokenize_text(text)?.token_ids().to_vec()) };
        Ok(Self {
            formula_start: Delimiter::Text(vec![ids(" <m>")?, ids("<m>")?]),
            formula_end: Delimiter::Text(vec![ids(" </m>")?, ids("</m>")?]),
        })
    }

    /// (context, target) pairs for every region of `label`.
    fn extract(&self, mut context: Sequence, mut label: Sequence, formulas: bool) -> Vec<(Sequence, Sequence)> {
        let (opens, closes) = if formulas {
            (&self.formula_start, &self.formula_end)
        } else {
            (&self.formula_end, &self.formula_start)
        };

        let mut pairs = Vec::new();
        while let Some(start) = opens.find_after(&label) {
            let (head, rest) = label.split_at(start);
            context += &head;
            let end = closes.find_after(&rest).unwrap_or(rest.len());
            let (region, remainder) = rest.split_at(end);
            label = remainder;

            if !formulas && region.len() <= 2 {
                break;
            }
            pairs.push((context.clone(), region.clone()));
            context += &region;
        }
        pairs
    }
}

pub fn build_gen_task_dataset(samples: &[GenTaskSample], tokenizer: &SequenceTokenizer) -> Result<SequenceDataset> {
    let options = tokenizer.options();
    let regions = Regions::new(tokenizer)?;
    let mut stats = BuildStats::default();
    let mut sequences = Vec::with_capacity(samples.len());
    let mut min_label_len = usize::MAX;
    let pb = progress_bar(samples.len(), "headlines");

    for sample in samples {
        let (mut prompt, missing) = tokenizer.tokenize_tagged("Question: ", &sample.prompt, "")?;
        stats.missing_formulas += missing;
        let intermediate = tokenizer.tokenize_text(&format!("{SEP_TOKEN} Summary: "))?;
        let (label, missing) = tokenizer.tokenize_tagged("", &sample.label, EOS_TOKEN)?;
        stats.missing_formulas += missing;
        min_label_len = min_label_len.min(label.len());

        let pairs = if options.eval_formulas || options.eval_text {
            regions.extract(intermediate, label, options.eval_formulas)
        } else {
            vec![(intermediate, label)]
        };

        for (intermediate, label) in pairs {
            let total = prompt.len() + intermediate.len() + label.len();
            if total > options.max_seq_len {
                prompt = trim_component(&prompt, total - options.max_seq_len, "prompt", &mut stats)?;
            }

            let mut sequence = prompt.clone() + &intermediate + &label;
            sequence.meta = SequenceMeta::with_prompt_length(prompt.len() + intermediate.len());
            sequences.push(sequence);
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    stats.log("headlines", sequences.len());
    if !samples.is_empty() {
        tracing::info!("Min label length: {}", min_label_len);
    }
    Ok(SequenceDataset::new(sequences, stats))
}
