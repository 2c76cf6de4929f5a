// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Builds the train and validation datasets for one task and
// checks that every batch collates:
//
//   Step 1: Validate and save options     (Layer 6 - infra)
//   Step 2: Load tokenizer + vocabulary   (Layer 6 - infra)
//   Step 3: Load articles or samples      (Layer 4 - data)
//   Step 4: Train / validation split      (Layer 4 - data)
//   Step 5: Build datasets                (Layer 4 - data)
//   Step 6: One pass of each data loader  (Layer 4 - data)
//   Step 7: Save summary                  (Layer 6 - infra)
//
// Pretraining builds the formula vocabulary from its articles
// when none exists yet; the downstream tasks expect it to be
// there already.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::Collator,
    dataloader::build_data_loader,
    dataset::{
        answer_scoring::AnswerScoringDataset, feedback::build_feedback_dataset, gen_task::build_gen_task_dataset,
        pretrain::build_pretrain_dataset, solving::build_solving_dataset, BuildStats,
    },
    loader::{load_json, load_problems, ArticleLoader},
    sequence_tokenizer::SequenceTokenizer,
    splitter::split_train_val,
};
use crate::domain::options::{DownstreamTask, TrainOptions};
use crate::domain::sample::{AnswerScoringSample, FeedbackTaskSample, GenTaskSample, SolvingTaskSample};
use crate::domain::sequence::Sequence;
use crate::domain::traits::ArticleSource;
use crate::infra::{experiment_store::ExperimentStore, tokenizer_store::TokenizerStore};

/// CPU backend used to dry-run collation.
type PipelineBackend = burn::backend::NdArray;

// ─── Prepare Configuration ───────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct PrepareConfig {
    pub name: String,
    pub experiment_dir: PathBuf,
    pub tokenizer_dir: PathBuf,
    /// Article directory (pretraining) or task sample JSON
    pub data: PathBuf,
    /// Problem statements, for answer scoring and feedback
    pub problems: Option<PathBuf>,
    /// None means pretraining
    pub task: Option<DownstreamTask>,
    pub train_fraction: f64,
    pub max_articles: Option<usize>,
    pub options: TrainOptions,
}

/// Counts for one built dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub sequences: usize,
    pub batches: usize,
    /// Widest collated batch
    pub longest: usize,
    pub missing_formulas: usize,
    pub trimmed_sequences: usize,
    pub dropped_formulas: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareSummary {
    pub task: String,
    pub train: DatasetSummary,
    pub val: DatasetSummary,
}

// ─── PrepareUseCase ───────────────────────────────────────────────────────────
pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PrepareSummary> {
        let cfg = &self.config;
        let options = &cfg.options;

        // ── Step 1: Options ───────────────────────────────────────────────────
        options.validate()?;
        let store = ExperimentStore::new(&cfg.experiment_dir, &cfg.name);
        store.save_options(options)?;

        // ── Step 2: Text tokenizer ────────────────────────────────────────────
        let tokenizers = TokenizerStore::new(&cfg.tokenizer_dir);
        let text_tokenizer = tokenizers.load_text_tokenizer()?;

        // ── Steps 3-6: per task ───────────────────────────────────────────────
        let (train, val) = match cfg.task {
            None => {
                let articles = ArticleLoader::new(&cfg.data).with_limit(cfg.max_articles).load_all()?;
                let vocab =
                    tokenizers.load_or_build_vocab(&articles, options.max_formula_depth, options.min_symbol_count)?;
                let tokenizer = SequenceTokenizer::new(&text_tokenizer, &vocab, options);
                let (train, val) = self.split(articles);
                // Validation articles stay whole for sliding-window perplexity
                let train = build_pretrain_dataset(&train, &tokenizer, Some(options.max_seq_len))?;
                let val = build_pretrain_dataset(&val, &tokenizer, None)?;
                (self.summarize(train.stats(), train)?, self.summarize(val.stats(), val)?)
            }
            Some(task) => {
                let vocab = tokenizers.load_vocab()?;
                let tokenizer = SequenceTokenizer::new(&text_tokenizer, &vocab, options);
                self.prepare_task(task, &tokenizer)?
            }
        };

        // ── Step 7: Summary ───────────────────────────────────────────────────
        let summary = PrepareSummary {
            task: cfg.task.map_or_else(|| "pretrain".to_string(), |t| t.to_string()),
            train,
            val,
        };
        store.save_summary(&summary)?;
        tracing::info!("Prepared '{}' in '{}'", summary.task, store.dir().display());
        Ok(summary)
    }

    fn prepare_task(
        &self,
        task: DownstreamTask,
        tokenizer: &SequenceTokenizer,
    ) -> Result<(DatasetSummary, DatasetSummary)> {
        let data = self.config.data.as_path();
        match task {
            DownstreamTask::Headlines => {
                let (train, val) = self.split(load_json::<Vec<GenTaskSample>>(data)?);
                let train = build_gen_task_dataset(&train, tokenizer)?;
                let val = build_gen_task_dataset(&val, tokenizer)?;
                Ok((self.summarize(train.stats(), train)?, self.summarize(val.stats(), val)?))
            }
            DownstreamTask::AnswerScoring => {
                let problems = load_problems(self.problems_path(task)?)?;
                let (train, val) = self.split(load_json::<Vec<AnswerScoringSample>>(data)?);
                let train = AnswerScoringDataset::new(&train, &problems, tokenizer, None)?;
                // Validation answers draw their examples from the training split
                let val = AnswerScoringDataset::new(&val, &problems, tokenizer, Some(train.answers()))?;
                Ok((self.summarize(train.stats(), train)?, self.summarize(val.stats(), val)?))
            }
            DownstreamTask::Feedback => {
                let problems = load_problems(self.problems_path(task)?)?;
                let (train, val) = self.split(load_json::<Vec<FeedbackTaskSample>>(data)?);
                let train = build_feedback_dataset(&train, &problems, tokenizer)?;
                let val = build_feedback_dataset(&val, &problems, tokenizer)?;
                Ok((self.summarize(train.stats(), train)?, self.summarize(val.stats(), val)?))
            }
            DownstreamTask::Solving => {
                let (train, val) = self.split(load_json::<Vec<SolvingTaskSample>>(data)?);
                let train = build_solving_dataset(&train, tokenizer)?;
                let val = build_solving_dataset(&val, tokenizer)?;
                Ok((self.summarize(train.stats(), train)?, self.summarize(val.stats(), val)?))
            }
        }
    }

    fn problems_path(&self, task: DownstreamTask) -> Result<&Path> {
        self.config
            .problems
            .as_deref()
            .with_context(|| format!("the {task} task needs a problems file"))
    }

    fn split<T>(&self, samples: Vec<T>) -> (Vec<T>, Vec<T>) {
        let (train, val) = split_train_val(samples, self.config.train_fraction, self.config.options.seed);
        tracing::info!("Split: {} train, {} validation", train.len(), val.len());
        (train, val)
    }

    /// Run one pass of the data loader over `dataset`.
    fn summarize<D>(&self, stats: BuildStats, dataset: D) -> Result<DatasetSummary>
    where
        D: Dataset<Sequence> + 'static,
    {
        let options = &self.config.options;
        let sequences = dataset.len();
        let collator = Collator::<PipelineBackend>::new(Default::default(), self.config.task, options.clone());
        let loader = build_data_loader(dataset, collator, options, true, false);

        let mut batches = 0;
        let mut longest = 0;
        for batch in loader.iter() {
            batches += 1;
            longest = longest.max(batch.width());
        }
        tracing::debug!("{} sequences in {} batches, widest {}", sequences, batches, longest);

        Ok(DatasetSummary {
            sequences,
            batches,
            longest,
            missing_formulas: stats.missing_formulas,
            trimmed_sequences: stats.trimmed_sequences,
            dropped_formulas: stats.dropped_formulas,
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::data::test_support::write_word_tokenizer;
    use crate::data::vocab::FormulaVocab;

    const CIRCLE_ARTICLE: &str = r#"{
        "text": "area of a circle [_mathGPT_formula_]",
        "formulas": {"0": {"tex": "r^2", "opt": ["O!", "^", [["V!", "r", null], ["N!", "2", null]]]}}
    }"#;

    fn config(root: &Path, task: Option<DownstreamTask>, data: PathBuf) -> PrepareConfig {
        PrepareConfig {
            name: "run".into(),
            experiment_dir: root.join("experiments"),
            tokenizer_dir: root.join("tokenizer"),
            data,
            problems: None,
            task,
            train_fraction: 0.5,
            max_articles: None,
            options: TrainOptions { max_seq_len: 8, batch_size: 2, max_formula_depth: 4, ..TrainOptions::default() },
        }
    }

    fn tokenizer_dir(root: &Path) {
        let dir = root.join("tokenizer");
        fs::create_dir_all(&dir).unwrap();
        write_word_tokenizer(&dir, &["area", "of", "a", "circle", "Question", "Solution", "Final", "Answer"]);
    }

    #[test]
    fn test_pretrain_builds_vocab_and_chunks() {
        let root = tempfile::tempdir().unwrap();
        tokenizer_dir(root.path());
        let articles = root.path().join("articles");
        fs::create_dir_all(&articles).unwrap();
        for name in ["a", "b", "c", "d"] {
            fs::write(articles.join(format!("{name}.json")), CIRCLE_ARTICLE).unwrap();
        }

        let summary = PrepareUseCase::new(config(root.path(), None, articles)).execute().unwrap();

        assert_eq!(summary.task, "pretrain");
        assert!(summary.train.sequences > 2);
        assert!(summary.train.longest <= 8);
        assert!(summary.train.batches > 0);
        assert_eq!(summary.val.sequences, 2);
        assert!(root.path().join("tokenizer").join("vocab.json").exists());
        assert!(root.path().join("experiments/run/options.json").exists());
        assert!(root.path().join("experiments/run/summary.json").exists());
    }

    #[test]
    fn test_solving_task_uses_the_saved_vocab() {
        let root = tempfile::tempdir().unwrap();
        tokenizer_dir(root.path());
        TokenizerStore::new(root.path().join("tokenizer")).save_vocab(&FormulaVocab::default()).unwrap();
        let samples = root.path().join("solving.json");
        let sample = r#"{"problem": {"text": "area"}, "steps": {"text": "of a"}, "answer": {"text": "circle"}}"#;
        fs::write(&samples, format!("[{sample}, {sample}, {sample}, {sample}]")).unwrap();

        let summary = PrepareUseCase::new(config(root.path(), Some(DownstreamTask::Solving), samples))
            .execute()
            .unwrap();

        assert_eq!(summary.task, "solving");
        assert_eq!(summary.train.sequences + summary.val.sequences, 4);
        assert_eq!(summary.train.batches, 1);
    }

    #[test]
    fn test_feedback_without_problems_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        tokenizer_dir(root.path());
        TokenizerStore::new(root.path().join("tokenizer")).save_vocab(&FormulaVocab::default()).unwrap();
        let samples = root.path().join("feedback.json");
        fs::write(&samples, "[]").unwrap();

        let use_case = PrepareUseCase::new(config(root.path(), Some(DownstreamTask::Feedback), samples));
        assert!(use_case.execute().is_err());
    }

    #[test]
    fn test_invalid_options_are_rejected_before_any_io() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = config(root.path(), None, root.path().join("articles"));
        cfg.options.batch_size = 0;

        assert!(PrepareUseCase::new(cfg).execute().is_err());
        assert!(!root.path().join("experiments").exists());
    }
}
