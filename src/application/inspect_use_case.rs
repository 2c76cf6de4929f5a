// ============================================================
// Layer 2 — InspectUseCase
// ============================================================
// Tokenizes one article and reports what the model would see:
// every token with its type, id, readable symbol and tree
// position, plus the text decoded back from the ids.
//
//   idx  type   id  symbol  level  pos_vec
//   0    TEXT   12  area    0      [0, 0, 0, 0]
//   4    START  0           0      [0, 0, 0, 0]
//   5    OP     3   ^       0      [1, 0, 0, 0]
//   6    VAR    1   r       1      [1, 1, 0, 0]
//   ...
//
// Useful for checking a vocabulary or a formula marker before
// building a full dataset.

use std::path::PathBuf;

use anyhow::Result;

use crate::data::{
    decode::decode_sequence,
    loader::load_json,
    sequence_tokenizer::SequenceTokenizer,
    vocab::{FormulaVocab, UNK_SYMBOL},
};
use crate::domain::options::TrainOptions;
use crate::domain::sample::Article;
use crate::domain::token::TokenType;
use crate::domain::traits::TextTokenizer;
use crate::infra::tokenizer_store::TokenizerStore;

#[derive(Debug, Clone)]
pub struct InspectConfig {
    pub article: PathBuf,
    pub tokenizer_dir: PathBuf,
    /// Rows to report; the decoded text always covers the whole article
    pub limit: usize,
    pub options: TrainOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenRow {
    pub index: usize,
    pub kind: TokenType,
    pub id: u32,
    pub symbol: String,
    pub level: u32,
    pub pos_vec: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectReport {
    pub name: String,
    pub tokens: usize,
    pub formulas: usize,
    pub missing_formulas: usize,
    pub rows: Vec<TokenRow>,
    pub decoded: String,
}

pub struct InspectUseCase {
    config: InspectConfig,
}

impl InspectUseCase {
    pub fn new(config: InspectConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<InspectReport> {
        let cfg = &self.config;
        cfg.options.validate()?;

        let tokenizers = TokenizerStore::new(&cfg.tokenizer_dir);
        let text_tokenizer = tokenizers.load_text_tokenizer()?;
        let vocab = tokenizers.load_vocab()?;
        let tokenizer = SequenceTokenizer::new(&text_tokenizer, &vocab, &cfg.options);

        let article: Article = load_json(&cfg.article)?;
        let name = cfg
            .article
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or("article")
            .to_string();
        let (sequence, missing_formulas) = tokenizer.tokenize_sequence(&name, &article.text, &article.formulas)?;

        let rows = sequence
            .token_ids()
            .iter()
            .zip(sequence.token_types())
            .zip(sequence.pos_levels().iter().zip(sequence.pos_vecs()))
            .take(cfg.limit)
            .enumerate()
            .map(|(index, ((&id, &kind), (&level, pos_vec)))| {
                Ok(TokenRow {
                    index,
                    kind,
                    id,
                    symbol: readable_symbol(kind, id, &text_tokenizer, &vocab)?,
                    level,
                    pos_vec: pos_vec.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let decoded = decode_sequence(sequence.token_ids(), sequence.token_types(), &text_tokenizer, &vocab)?;
        tracing::debug!("{}: {} tokens, {} missing formulas", name, sequence.len(), missing_formulas);

        Ok(InspectReport {
            name,
            tokens: sequence.len(),
            formulas: sequence.count_formulas(0, sequence.len()),
            missing_formulas,
            rows,
            decoded,
        })
    }
}

fn readable_symbol(
    kind: TokenType,
    id: u32,
    text_tokenizer: &dyn TextTokenizer,
    vocab: &FormulaVocab,
) -> Result<String> {
    Ok(match kind {
        TokenType::Text => text_tokenizer.decode(&[id])?,
        TokenType::Op | TokenType::Var | TokenType::Num => vocab.symbol(kind, id).unwrap_or(UNK_SYMBOL).to_string(),
        TokenType::StartFormula | TokenType::EndFormula | TokenType::End => String::new(),
    })
}
