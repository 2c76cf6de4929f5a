// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All pipeline logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `vocab`   — builds the formula symbol vocabulary
//   2. `prepare` — builds datasets for pretraining or a task
//   3. `inspect` — shows how one article is tokenized
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InspectArgs, PrepareArgs, VocabArgs};

use crate::application::{
    inspect_use_case::{InspectReport, InspectUseCase},
    prepare_use_case::{DatasetSummary, PrepareUseCase},
    vocab_use_case::VocabUseCase,
};
use crate::domain::token::TokenType;

#[derive(Parser, Debug)]
#[command(
    name = "mathgpt-pipeline",
    version = "0.1.0",
    about = "Build formula-aware token sequences and batches for a math GPT-2 model."
)]
pub struct Cli {
    /// The subcommand to run (vocab, prepare or inspect)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Vocab(args)   => run_vocab(args),
            Commands::Prepare(args) => run_prepare(args),
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

fn run_vocab(args: VocabArgs) -> Result<()> {
    tracing::info!("Building formula vocabulary from: {}", args.articles_dir.display());

    let summary = VocabUseCase::new(args.into()).execute()?;

    println!("Articles read: {}", summary.articles);
    println!("OP symbols:    {}", summary.op);
    println!("VAR symbols:   {}", summary.var);
    println!("NUM symbols:   {}", summary.num);
    Ok(())
}

fn run_prepare(args: PrepareArgs) -> Result<()> {
    tracing::info!("Preparing '{}' from: {}", args.name, args.data.display());

    let summary = PrepareUseCase::new(args.into()).execute()?;

    println!("Task: {}", summary.task);
    print_dataset("train", &summary.train);
    print_dataset("val", &summary.val);
    Ok(())
}

fn print_dataset(split: &str, s: &DatasetSummary) {
    println!(
        "  {:<5} {} sequences in {} batches (widest {}), {} missing formulas, {} trimmed, {} formulas dropped",
        split, s.sequences, s.batches, s.longest, s.missing_formulas, s.trimmed_sequences, s.dropped_formulas
    );
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let report = InspectUseCase::new(args.into()).execute()?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &InspectReport) {
    println!(
        "{}: {} tokens, {} formulas, {} missing",
        report.name, report.tokens, report.formulas, report.missing_formulas
    );
    println!("{:<6} {:<6} {:<7} {:<16} {:<6} pos_vec", "idx", "type", "id", "symbol", "level");
    for row in &report.rows {
        println!(
            "{:<6} {:<6} {:<7} {:<16} {:<6} {:?}",
            row.index,
            type_label(row.kind),
            row.id,
            row.symbol,
            row.level,
            row.pos_vec
        );
    }
    if report.rows.len() < report.tokens {
        println!("... {} more", report.tokens - report.rows.len());
    }
    println!("\nDecoded:\n{}", report.decoded);
}

fn type_label(kind: TokenType) -> &'static str {
    match kind {
        TokenType::Text         => "TEXT",
        TokenType::StartFormula => "START",
        TokenType::EndFormula   => "STOP",
        TokenType::Var          => "VAR",
        TokenType::Num          => "NUM",
        TokenType::Op           => "OP",
        TokenType::End          => "END",
    }
}
