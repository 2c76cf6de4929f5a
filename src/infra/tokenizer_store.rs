// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Persists the two vocabularies a pipeline run depends on:
//
//   <dir>/tokenizer.json  the pretrained GPT-2 BPE tokenizer, in
//                         HuggingFace format (never rebuilt here)
//   <dir>/vocab.json      the formula symbol vocabulary, built
//                         from the article corpus on first use
//
// Both must be the same between dataset preparation and
// evaluation, otherwise formula and text ids silently shift.
//
// Reference: Radford et al. (2019) GPT-2 byte-level BPE

use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use tokenizers::Tokenizer;

use crate::data::loader::load_json;
use crate::data::vocab::{FormulaVocab, SymbolCounter};
use crate::domain::sample::NamedArticle;
use crate::domain::traits::TextTokenizer;

/// The HuggingFace tokenizer is the production TextTokenizer.
/// Calls go through the deref to `TokenizerImpl`; `Tokenizer::encode`
/// would resolve back to this trait.
impl TextTokenizer for Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = (**self).encode(text, false).map_err(|e| anyhow!("Tokenization failed: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        (**self).decode(ids, false).map_err(|e| anyhow!("Decoding failed: {e}"))
    }
}

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load the text tokenizer from `<dir>/tokenizer.json`.
    pub fn load_text_tokenizer(&self) -> Result<Tokenizer> {
        let path = self.dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&path)
            .map_err(|e| anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))?;
        tracing::info!(
            "Loaded text tokenizer ({} tokens) from '{}'",
            tokenizer.get_vocab_size(true),
            path.display()
        );
        Ok(tokenizer)
    }

    pub fn load_vocab(&self) -> Result<FormulaVocab> {
        let path = self.dir.join("vocab.json");
        load_json(&path).with_context(|| "Have you run 'vocab' first?")
    }

    /// Load the formula vocabulary, or build it from `articles` and
    /// save it when none exists yet.
    pub fn load_or_build_vocab(
        &self,
        articles: &[NamedArticle],
        max_depth: usize,
        min_count: usize,
    ) -> Result<FormulaVocab> {
        if self.dir.join("vocab.json").exists() {
            tracing::info!("Loading existing formula vocabulary from disk");
            return self.load_vocab();
        }

        let mut counter = SymbolCounter::new(max_depth);
        for named in articles {
            for formula in named.article.formulas.values() {
                counter.add_formula(&formula.opt);
            }
        }
        let vocab = counter.build(min_count);
        tracing::info!(
            "Built formula vocabulary: {} distinct symbols, {} kept (min count {})",
            counter.distinct_symbols(),
            vocab.known_symbols(),
            min_count
        );
        self.save_vocab(&vocab)?;
        Ok(vocab)
    }

    pub fn save_vocab(&self, vocab: &FormulaVocab) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.dir.join("vocab.json");
        fs::write(&path, serde_json::to_string_pretty(vocab)?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", path.display()))?;
        tracing::debug!("Saved formula vocabulary to '{}'", path.display());
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::write_word_tokenizer;
    use crate::domain::formula::{Formula, OptNode};
    use crate::domain::sample::TaggedText;
    use crate::domain::token::TokenType;

    fn article(formulas: Vec<OptNode>) -> NamedArticle {
        let formulas = formulas
            .into_iter()
            .enumerate()
            .map(|(i, opt)| (i.to_string(), Formula { tex: String::new(), opt }))
            .collect();
        NamedArticle { name: "a".into(), article: TaggedText { text: String::new(), formulas } }
    }

    #[test]
    fn test_hf_tokenizer_round_trips_words() {
        let dir = tempfile::tempdir().unwrap();
        write_word_tokenizer(dir.path(), &["area", "of", "a", "circle"]);
        let tokenizer = TokenizerStore::new(dir.path()).load_text_tokenizer().unwrap();

        let ids = TextTokenizer::encode(&tokenizer, "area of a circle").unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(TextTokenizer::decode(&tokenizer, &ids).unwrap(), "area of a circle");
    }

    #[test]
    fn test_missing_tokenizer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TokenizerStore::new(dir.path()).load_text_tokenizer().is_err());
    }

    #[test]
    fn test_vocab_is_built_once_then_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let circle = OptNode::op("^", vec![OptNode::var("r"), OptNode::num("2")]);
        let rare = OptNode::op("times", vec![OptNode::var("r"), OptNode::var("y")]);

        let built = store.load_or_build_vocab(&[article(vec![circle.clone(), circle, rare])], 8, 2).unwrap();
        assert_eq!(built.token_id(TokenType::Var, "r"), 1);
        assert_eq!(built.token_id(TokenType::Var, "y"), 0);
        assert!(dir.path().join("vocab.json").exists());

        // A second call ignores the corpus and returns the saved vocabulary
        let reloaded = store.load_or_build_vocab(&[], 8, 1).unwrap();
        assert_eq!(reloaded, built);
    }
}
