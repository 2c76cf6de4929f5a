// ============================================================
// Layer 4 — Feedback Dataset
// ============================================================
//   "Question: " problem | " [SEP] Answer: " answer " [SEP] Feedback: " | feedback <|endoftext|>
//   └─────────────────────── prompt_length ─────────────────────────┘
//
// Problems are tokenized once and shared between the samples that
// reference them. On overflow the problem is trimmed for that
// sample only.

use std::collections::HashMap;

use anyhow::Result;

use crate::data::dataset::{progress_bar, trim_component, BuildStats, DatasetError, SequenceDataset};
use crate::data::sequence_tokenizer::SequenceTokenizer;
use crate::domain::sample::{Article, FeedbackTaskSample};
use crate::domain::sequence::SequenceMeta;
use crate::domain::token::{EOS_TOKEN, SEP_TOKEN};

pub fn build_feedback_dataset(
    samples: &[FeedbackTaskSample],
    problems: &HashMap<String, Article>,
    tokenizer: &SequenceTokenizer,
) -> Result<SequenceDataset> {
    let max_seq_len = tokenizer.options().max_seq_len;
    let mut stats = BuildStats::default();

    let mut problem_seqs = HashMap::with_capacity(problems.len());
    for (id, problem) in problems {
        let (sequence, missing) = tokenizer.tokenize_tagged("Question: ", problem, "")?;
        stats.missing_formulas += missing;
        problem_seqs.insert(id.as_str(), sequence);
    }

    let mut sequences = Vec::with_capacity(samples.len());
    let mut shortest_feedback = usize::MAX;
    let mut longest_feedback = 0;
    let pb = progress_bar(samples.len(), "feedback");

    for sample in samples {
        let problem = problem_seqs
            .get(sample.problem_id.as_str())
            .ok_or_else(|| DatasetError::UnknownProblem(sample.problem_id.clone()))?;
        let (answer, missing) = tokenizer.tokenize_tagged(
            &format!(" {SEP_TOKEN} Answer: "),
            &sample.answer,
            &format!(" {SEP_TOKEN} Feedback: "),
        )?;
        stats.missing_formulas += missing;
        let (feedback, missing) = tokenizer.tokenize_tagged("", &sample.feedback, EOS_TOKEN)?;
        stats.missing_formulas += missing;
        shortest_feedback = shortest_feedback.min(feedback.len());
        longest_feedback = longest_feedback.max(feedback.len());

        let total = problem.len() + answer.len() + feedback.len();
        let problem = if total > max_seq_len {
            trim_component(problem, total - max_seq_len, "problem", &mut stats)?
        } else {
            problem.clone()
        };

        let prompt_length = problem.len() + answer.len();
        let mut sequence = problem + &answer + &feedback;
        sequence.meta = SequenceMeta::with_prompt_length(prompt_length);
        sequences.push(sequence);
        pb.inc(1);
    }
    pb.finish_and_clear();

    stats.log("feedback", sequences.len());
    if !samples.is_empty() {
        tracing::info!("Shortest feedback: {}, longest feedback: {}", shortest_feedback, longest_feedback);
    }
    Ok(SequenceDataset::new(sequences, stats))
}
