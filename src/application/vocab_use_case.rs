// ============================================================
// Layer 2 — VocabUseCase
// ============================================================
// Builds the formula symbol vocabulary from an article corpus:
//
//   Step 1: Load articles              (Layer 4 - data)
//   Step 2: Count symbols, keep those
//           seen min_symbol_count times (Layer 4 - data)
//   Step 3: Save vocab.json            (Layer 6 - infra)
//
// An existing vocab.json is kept unless `rebuild` is set.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use crate::data::{loader::ArticleLoader, vocab::FormulaVocab};
use crate::domain::token::TokenType;
use crate::domain::traits::ArticleSource;
use crate::infra::tokenizer_store::TokenizerStore;

#[derive(Debug, Clone)]
pub struct VocabConfig {
    pub articles_dir: PathBuf,
    pub tokenizer_dir: PathBuf,
    pub max_articles: Option<usize>,
    pub max_formula_depth: usize,
    pub min_symbol_count: usize,
    pub rebuild: bool,
}

/// Table sizes of the resulting vocabulary, [UNK] included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabSummary {
    pub articles: usize,
    pub op: usize,
    pub var: usize,
    pub num: usize,
}

pub struct VocabUseCase {
    config: VocabConfig,
}

impl VocabUseCase {
    pub fn new(config: VocabConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<VocabSummary> {
        let cfg = &self.config;

        let vocab_path = cfg.tokenizer_dir.join("vocab.json");
        if cfg.rebuild && vocab_path.exists() {
            fs::remove_file(&vocab_path).with_context(|| format!("Cannot remove '{}'", vocab_path.display()))?;
            tracing::info!("Rebuilding formula vocabulary");
        }

        let articles = ArticleLoader::new(&cfg.articles_dir).with_limit(cfg.max_articles).load_all()?;
        let vocab: FormulaVocab = TokenizerStore::new(&cfg.tokenizer_dir).load_or_build_vocab(
            &articles,
            cfg.max_formula_depth,
            cfg.min_symbol_count,
        )?;

        Ok(VocabSummary {
            articles: articles.len(),
            op: vocab.size(TokenType::Op),
            var: vocab.size(TokenType::Var),
            num: vocab.size(TokenType::Num),
        })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn setup(root: &std::path::Path, opt: &str) {
        let articles = root.join("articles");
        fs::create_dir_all(&articles).unwrap();
        let body = format!(r#"{{"text": "x", "formulas": {{"0": {{"tex": "", "opt": {opt}}}}}}}"#);
        fs::write(articles.join("a.json"), body).unwrap();
    }

    fn config(root: &std::path::Path, rebuild: bool) -> VocabConfig {
        VocabConfig {
            articles_dir: root.join("articles"),
            tokenizer_dir: root.join("tokenizer"),
            max_articles: None,
            max_formula_depth: 8,
            min_symbol_count: 1,
            rebuild,
        }
    }

    #[test]
    fn test_counts_symbols_per_type() {
        let root = tempfile::tempdir().unwrap();
        setup(root.path(), r#"["O!", "^", [["V!", "r", null], ["N!", "2", null]]]"#);

        let summary = VocabUseCase::new(config(root.path(), false)).execute().unwrap();
        assert_eq!(summary, VocabSummary { articles: 1, op: 2, var: 2, num: 2 });
    }

    #[test]
    fn test_existing_vocab_is_kept_unless_rebuilding() {
        let root = tempfile::tempdir().unwrap();
        setup(root.path(), r#"["V!", "x", null]"#);
        VocabUseCase::new(config(root.path(), false)).execute().unwrap();

        setup(root.path(), r#"["O!", "+", [["V!", "x", null], ["V!", "y", null]]]"#);
        let kept = VocabUseCase::new(config(root.path(), false)).execute().unwrap();
        assert_eq!(kept.var, 2);
        assert_eq!(kept.op, 1);

        let rebuilt = VocabUseCase::new(config(root.path(), true)).execute().unwrap();
        assert_eq!(rebuilt.var, 3);
        assert_eq!(rebuilt.op, 2);
    }
}
