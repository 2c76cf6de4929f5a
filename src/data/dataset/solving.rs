// ============================================================
// Layer 4 — Problem Solving Dataset
// ============================================================
//   "Question: " problem " [SEP] Solution: " | steps " [SEP] Final Answer: " | answer <|endoftext|>
//   └──────────── prompt_length ───────────┘
//
// Unlike the other builders nothing is trimmed here: a solution
// is never cut short. Sequences over max_seq_len are counted and
// left for the consumer's windowing.

use anyhow::Result;

use crate::data::dataset::{progress_bar, BuildStats, SequenceDataset};
use crate::data::sequence_tokenizer::SequenceTokenizer;
use crate::domain::sample::SolvingTaskSample;
use crate::domain::sequence::SequenceMeta;
use crate::domain::token::{EOS_TOKEN, SEP_TOKEN};

pub fn build_solving_dataset(samples: &[SolvingTaskSample], tokenizer: &SequenceTokenizer) -> Result<SequenceDataset> {
    let max_seq_len = tokenizer.options().max_seq_len;
    let mut stats = BuildStats::default();
    let mut sequences = Vec::with_capacity(samples.len());
    let pb = progress_bar(samples.len(), "solving");

    for sample in samples {
        let (problem, missing) =
            tokenizer.tokenize_tagged("Question: ", &sample.problem, &format!(" {SEP_TOKEN} Solution: "))?;
        stats.missing_formulas += missing;
        let (steps, missing) = tokenizer.tokenize_tagged("", &sample.steps, &format!(" {SEP_TOKEN} Final Answer: "))?;
        stats.missing_formulas += missing;
        let (answer, missing) = tokenizer.tokenize_tagged("", &sample.answer, EOS_TOKEN)?;
        stats.missing_formulas += missing;

        let prompt_length = problem.len();
        let mut sequence = problem + &steps + &answer;
        if sequence.len() > max_seq_len {
            stats.trimmed_sequences += 1;
        }
        sequence.meta = SequenceMeta::with_prompt_length(prompt_length);
        sequences.push(sequence);
        pb.inc(1);
    }
    pb.finish_and_clear();

    stats.log("solving", sequences.len());
    if stats.trimmed_sequences > 0 {
        tracing::warn!(
            "{} solving sequences exceed max_seq_len ({}) and were kept whole",
            stats.trimmed_sequences,
            max_seq_len
        );
    }
    Ok(SequenceDataset::new(sequences, stats))
}
