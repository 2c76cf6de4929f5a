// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `vocab`, `prepare` and
// `inspect`, and all their configurable flags.
//
// The pipeline knobs live in `OptionsArgs`, flattened into both
// `prepare` and `inspect` so an article is inspected with exactly
// the flags a dataset would be built with.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::{
    inspect_use_case::InspectConfig, prepare_use_case::PrepareConfig, vocab_use_case::VocabConfig,
};
use crate::domain::options::{DownstreamTask, Tpe, TrainOptions};
use crate::domain::token::FORMULA_IDENTIFIER;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the formula symbol vocabulary from an article corpus
    Vocab(VocabArgs),

    /// Build train/validation datasets and dry-run their data loaders
    Prepare(PrepareArgs),

    /// Tokenize one article and print every token
    Inspect(InspectArgs),
}

// ─── Pipeline Options ─────────────────────────────────────────────────────────
#[derive(Args, Debug, Clone)]
pub struct OptionsArgs {
    /// Context window, in tokens
    #[arg(long, default_value_t = 1024)]
    pub max_seq_len: usize,

    /// Sliding-window stride for perplexity (defaults to max_seq_len)
    #[arg(long)]
    pub stride: Option<usize>,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    /// Render formulas as LaTeX text instead of tree tokens
    #[arg(long)]
    pub baseline: bool,

    /// With --baseline, render the decoded tree instead of the raw TeX
    #[arg(long)]
    pub post_proc: bool,

    /// Attach the subword ids of each formula symbol
    #[arg(long)]
    pub shared_emb: bool,

    /// Tree position encoding: none, forte, sin_part or sin_add
    #[arg(long, default_value = "none")]
    pub tpe: Tpe,

    /// Evaluate formula regions of generation labels only
    #[arg(long, conflicts_with = "eval_text")]
    pub eval_formulas: bool,

    /// Evaluate text regions of generation labels only
    #[arg(long)]
    pub eval_text: bool,

    #[arg(long, default_value_t = 5)]
    pub num_classes: usize,

    /// Shard data loaders by --rank / --world-size
    #[arg(long)]
    pub ddp: bool,

    #[arg(long, default_value_t = 0)]
    pub rank: usize,

    #[arg(long, default_value_t = 1)]
    pub world_size: usize,

    #[arg(long, default_value_t = 32)]
    pub max_formula_depth: usize,

    #[arg(long, default_value_t = 64)]
    pub max_formula_width: usize,

    /// Width of sinusoidal tree position encodings
    #[arg(long, default_value_t = 768)]
    pub emb_size: usize,

    /// Placeholder standing for the next formula in article text
    #[arg(long, default_value = FORMULA_IDENTIFIER)]
    pub formula_marker: String,

    #[arg(long, default_value_t = 1)]
    pub min_symbol_count: usize,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    #[arg(long, default_value_t = 221)]
    pub seed: u64,
}

/// The data layer never sees clap types, only TrainOptions.
impl From<OptionsArgs> for TrainOptions {
    fn from(a: OptionsArgs) -> Self {
        TrainOptions {
            max_seq_len:       a.max_seq_len,
            stride:            a.stride,
            batch_size:        a.batch_size,
            baseline:          a.baseline,
            post_proc:         a.post_proc,
            shared_emb:        a.shared_emb,
            tpe:               a.tpe,
            eval_formulas:     a.eval_formulas,
            eval_text:         a.eval_text,
            num_classes:       a.num_classes,
            ddp:               a.ddp,
            rank:              a.rank,
            world_size:        a.world_size,
            max_formula_depth: a.max_formula_depth,
            max_formula_width: a.max_formula_width,
            emb_size:          a.emb_size,
            formula_marker:    a.formula_marker,
            min_symbol_count:  a.min_symbol_count,
            num_workers:       a.num_workers,
            seed:              a.seed,
        }
    }
}

// ─── vocab ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct VocabArgs {
    /// Directory of article JSON files
    #[arg(long, default_value = "data/articles")]
    pub articles_dir: PathBuf,

    /// Directory holding tokenizer.json; vocab.json is written here
    #[arg(long, default_value = "ref_data")]
    pub tokenizer_dir: PathBuf,

    #[arg(long)]
    pub max_articles: Option<usize>,

    #[arg(long, default_value_t = 32)]
    pub max_formula_depth: usize,

    /// Symbols seen fewer times than this map to [UNK]
    #[arg(long, default_value_t = 1)]
    pub min_symbol_count: usize,

    /// Replace an existing vocab.json
    #[arg(long)]
    pub rebuild: bool,
}

impl From<VocabArgs> for VocabConfig {
    fn from(a: VocabArgs) -> Self {
        VocabConfig {
            articles_dir:      a.articles_dir,
            tokenizer_dir:     a.tokenizer_dir,
            max_articles:      a.max_articles,
            max_formula_depth: a.max_formula_depth,
            min_symbol_count:  a.min_symbol_count,
            rebuild:           a.rebuild,
        }
    }
}

// ─── prepare ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Experiment name; options and summary go to <experiment-dir>/<name>
    #[arg(long)]
    pub name: String,

    /// Downstream task; omit for pretraining
    #[arg(long)]
    pub task: Option<DownstreamTask>,

    /// Article directory (pretraining) or task sample JSON file
    #[arg(long)]
    pub data: PathBuf,

    /// Problem statements JSON (answer_scoring and feedback)
    #[arg(long)]
    pub problems: Option<PathBuf>,

    #[arg(long, default_value = "results")]
    pub experiment_dir: PathBuf,

    #[arg(long, default_value = "ref_data")]
    pub tokenizer_dir: PathBuf,

    /// Share of samples that go to the training split
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    #[arg(long)]
    pub max_articles: Option<usize>,

    #[command(flatten)]
    pub options: OptionsArgs,
}

impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            name:           a.name,
            experiment_dir: a.experiment_dir,
            tokenizer_dir:  a.tokenizer_dir,
            data:           a.data,
            problems:       a.problems,
            task:           a.task,
            train_fraction: a.train_fraction,
            max_articles:   a.max_articles,
            options:        a.options.into(),
        }
    }
}

// ─── inspect ──────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Article JSON file
    #[arg(long)]
    pub article: PathBuf,

    #[arg(long, default_value = "ref_data")]
    pub tokenizer_dir: PathBuf,

    /// Number of token rows to print
    #[arg(long, default_value_t = 64)]
    pub limit: usize,

    #[command(flatten)]
    pub options: OptionsArgs,
}

impl From<InspectArgs> for InspectConfig {
    fn from(a: InspectArgs) -> Self {
        InspectConfig {
            article:       a.article,
            tokenizer_dir: a.tokenizer_dir,
            limit:         a.limit,
            options:       a.options.into(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    #[test]
    fn test_option_defaults_match_train_options() {
        let cli = Cli::try_parse_from(["mathgpt-pipeline", "inspect", "--article", "a.json"]).unwrap();
        let Commands::Inspect(args) = cli.command else { panic!("expected inspect") };
        assert_eq!(TrainOptions::from(args.options), TrainOptions::default());
    }

    #[test]
    fn test_prepare_parses_task_and_tpe() {
        let cli = Cli::try_parse_from([
            "mathgpt-pipeline",
            "prepare",
            "--name",
            "scoring",
            "--task",
            "answer_scoring",
            "--data",
            "answers.json",
            "--tpe",
            "sin_add",
            "--stride",
            "512",
        ])
        .unwrap();
        let Commands::Prepare(args) = cli.command else { panic!("expected prepare") };
        let config = PrepareConfig::from(args);
        assert_eq!(config.task, Some(DownstreamTask::AnswerScoring));
        assert_eq!(config.options.tpe, Tpe::SinAdd);
        assert_eq!(config.options.stride, Some(512));
        assert_eq!(config.experiment_dir, PathBuf::from("results"));
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        let parsed = Cli::try_parse_from(["mathgpt-pipeline", "prepare", "--name", "x", "--task", "essays", "--data", "d"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_eval_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "mathgpt-pipeline",
            "inspect",
            "--article",
            "a.json",
            "--eval-formulas",
            "--eval-text",
        ]);
        assert!(parsed.is_err());
    }
}
