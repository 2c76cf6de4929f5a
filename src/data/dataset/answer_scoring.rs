// ============================================================
// Layer 4 — Answer Scoring Dataset (classification)
// ============================================================
// Each fetch assembles a fresh prompt around one graded answer:
//
//   Question: <problem>
//    [SEP] Possible scores: Wrong Poor Fair Good Excellent
//    [SEP] Example: <answer> Score: Fair        ┐ sampled from other
//    [SEP] Example: <answer> Score: Wrong       ┘ answers to the problem
//    [SEP] Score this answer: <answer> [CLS]
//
// label = the answer's grade.
//
// Examples come from a bank grouped by problem and grade. For
// each grade up to five examples are drawn (never the answer
// being scored); the first of each grade goes into an "initial"
// group so every grade gets a chance to appear, the rest into an
// "additional" group. Both groups are shuffled and appended,
// initial first, until the next example would overflow
// max_seq_len.
//
// Answers and problems are capped at half of what the fixed
// scaffold leaves free, so the answer and problem always fit.
//
// Sampling randomness is explicit. `sample_with` takes any Rng;
// the Dataset impl seeds a StdRng from (seed, epoch, index), so
// a fetch is reproducible no matter which loader worker runs it.
// Call `set_epoch` between epochs to draw new examples.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::data::dataset::{progress_bar, trim_component, BuildStats, DatasetError};
use crate::data::sequence_tokenizer::SequenceTokenizer;
use crate::domain::sample::{AnswerScoringSample, Article};
use crate::domain::sequence::{Sequence, SequenceMeta};
use crate::domain::token::{CLS_TOKEN, SEP_TOKEN};

const SCORE_NAMES: [&str; 5] = ["Wrong", "Poor", "Fair", "Good", "Excellent"];
const EXAMPLES_PER_GRADE: usize = 5;

/// Fixed text wrapped around every sample, tokenized once.
struct Scaffold {
    question: Sequence,
    scores: Sequence,
    example_prefix: Sequence,
    answer_prefix: Sequence,
    cls: Sequence,
    grade_scores: Vec<Sequence>,
}

impl Scaffold {
    fn new(tokenizer: &SequenceTokenizer, num_classes: usize) -> Result<Self> {
        let grade_scores = (0..num_classes)
            .map(|grade| {
                let score = SCORE_NAMES.get(grade).map_or_else(|| grade.to_string(), |s| s.to_string());
                tokenizer.tokenize_text(&format!(" Score: {score}"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            question: tokenizer.tokenize_text("Question: ")?,
            scores: tokenizer.tokenize_text(&format!(" {SEP_TOKEN} Possible scores: {}", SCORE_NAMES.join(" ")))?,
            example_prefix: tokenizer.tokenize_text(&format!(" {SEP_TOKEN} Example: "))?,
            answer_prefix: tokenizer.tokenize_text(&format!(" {SEP_TOKEN} Score this answer: "))?,
            cls: tokenizer.tokenize_text(&format!(" {CLS_TOKEN}"))?,
            grade_scores,
        })
    }

    /// Tokens every assembled sequence spends on fixed text.
    fn fixed_len(&self) -> usize {
        self.question.len() + self.scores.len() + self.answer_prefix.len() + self.cls.len()
    }
}

pub struct AnswerScoringDataset {
    answers: Vec<Sequence>,
    problems: HashMap<i64, Sequence>,
    /// problem_id → grade → example answers
    example_bank: HashMap<i64, Vec<Vec<Sequence>>>,
    scaffold: Scaffold,
    max_seq_len: usize,
    seed: u64,
    epoch: AtomicU64,
    stats: BuildStats,
}

impl AnswerScoringDataset {
    /// `examples` are tokenized answers (usually another split's
    /// `answers()`); when absent the answers themselves are the bank.
    pub fn new(
        samples: &[AnswerScoringSample],
        problems: &HashMap<String, Article>,
        tokenizer: &SequenceTokenizer,
        examples: Option<&[Sequence]>,
    ) -> Result<Self> {
        let options = tokenizer.options();
        let num_classes = options.num_classes;
        let scaffold = Scaffold::new(tokenizer, num_classes)?;
        let max_component_len = options.max_seq_len.saturating_sub(scaffold.fixed_len()) / 2;
        let mut stats = BuildStats::default();

        let mut problem_seqs = HashMap::with_capacity(problems.len());
        for (id, problem) in problems {
            let problem_id: i64 = id.parse().map_err(|_| DatasetError::BadProblemId(id.clone()))?;
            let (mut sequence, missing) = tokenizer.tokenize_tagged("", problem, "")?;
            stats.missing_formulas += missing;
            if sequence.len() > max_component_len {
                sequence = trim_component(&sequence, sequence.len() - max_component_len, "problem", &mut stats)?;
            }
            problem_seqs.insert(problem_id, sequence);
        }

        let mut answers = Vec::with_capacity(samples.len());
        let pb = progress_bar(samples.len(), "answer scoring");
        for sample in samples {
            if sample.grade >= num_classes {
                return Err(DatasetError::GradeOutOfRange { grade: sample.grade, num_classes }.into());
            }
            if !problem_seqs.contains_key(&sample.problem_id) {
                return Err(DatasetError::UnknownProblem(sample.problem_id.to_string()).into());
            }

            let (mut sequence, missing) = tokenizer.tokenize_tagged("", &sample.answer, "")?;
            stats.missing_formulas += missing;
            if sequence.len() > max_component_len {
                sequence = trim_component(&sequence, sequence.len() - max_component_len, "answer", &mut stats)?;
            }
            sequence.meta = SequenceMeta {
                label: Some(sample.grade),
                problem_id: Some(sample.problem_id),
                problem_log_id: Some(sample.problem_log_id),
                ..SequenceMeta::default()
            };
            answers.push(sequence);
            pb.inc(1);
        }
        pb.finish_and_clear();

        let mut example_bank: HashMap<i64, Vec<Vec<Sequence>>> = HashMap::new();
        for example in examples.unwrap_or(&answers) {
            let (Some(problem_id), Some(grade)) = (example.meta.problem_id, example.meta.label) else {
                continue;
            };
            if grade >= num_classes {
                return Err(DatasetError::GradeOutOfRange { grade, num_classes }.into());
            }
            example_bank
                .entry(problem_id)
                .or_insert_with(|| vec![Vec::new(); num_classes])[grade]
                .push(example.clone());
        }

        stats.log("answer scoring", answers.len());
        Ok(Self {
            answers,
            problems: problem_seqs,
            example_bank,
            scaffold,
            max_seq_len: options.max_seq_len,
            seed: options.seed,
            epoch: AtomicU64::new(0),
            stats,
        })
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    /// Tokenized answers with their grades, usable as another dataset's example bank.
    pub fn answers(&self) -> &[Sequence] {
        &self.answers
    }

    pub fn set_epoch(&self, epoch: u64) {
        self.epoch.store(epoch, Ordering::Relaxed);
    }

    /// Assemble the sequence for `index` drawing examples from `rng`.
    pub fn sample_with<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Option<Sequence> {
        let answer = self.answers.get(index)?;
        let problem_id = answer.meta.problem_id?;
        let problem = self.problems.get(&problem_id)?;

        let mut initial: Vec<&Sequence> = Vec::new();
        let mut additional: Vec<&Sequence> = Vec::new();
        if let Some(grades) = self.example_bank.get(&problem_id) {
            for examples in grades {
                let candidates: Vec<&Sequence> = examples
                    .iter()
                    .filter(|e| e.meta.problem_log_id != answer.meta.problem_log_id)
                    .collect();
                let mut picked = candidates
                    .choose_multiple(rng, candidates.len().min(EXAMPLES_PER_GRADE))
                    .copied();
                if let Some(first) = picked.next() {
                    initial.push(first);
                    additional.extend(picked);
                }
            }
        }
        initial.shuffle(rng);
        additional.shuffle(rng);

        let s = &self.scaffold;
        let mut used = s.fixed_len() + problem.len() + answer.len();
        let mut sequence = s.question.clone() + problem + &s.scores;
        for example in initial.into_iter().chain(additional) {
            let grade = example.meta.label.unwrap_or_default();
            let example_seq = s.example_prefix.clone() + example + &s.grade_scores[grade];
            if used + example_seq.len() > self.max_seq_len {
                break;
            }
            used += example_seq.len();
            sequence += &example_seq;
        }
        sequence += &s.answer_prefix;
        sequence += answer;
        sequence += &s.cls;

        sequence.meta = SequenceMeta {
            label: answer.meta.label,
            problem_id: answer.meta.problem_id,
            problem_log_id: answer.meta.problem_log_id,
            ..SequenceMeta::default()
        };
        Some(sequence)
    }

    fn rng_for(&self, index: usize) -> StdRng {
        let epoch = self.epoch.load(Ordering::Relaxed);
        let stream = (epoch << 32) ^ index as u64;
        StdRng::seed_from_u64(self.seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

impl Dataset<Sequence> for AnswerScoringDataset {
    fn get(&self, index: usize) -> Option<Sequence> {
        self.sample_with(index, &mut self.rng_for(index))
    }

    fn len(&self) -> usize {
        self.answers.len()
    }
}
