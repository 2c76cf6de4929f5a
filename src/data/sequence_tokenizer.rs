// ============================================================
// Layer 4 — Sequence Tokenizer
// ============================================================
// Turns text with formula placeholders into one Sequence.
//
//   "Area is [F] for a circle."   formulas: {"0": r^2}
//
//   split on the marker → ["Area is ", " for a circle."]
//
//   TEXT TEXT  START OP VAR NUM END END_F  TEXT TEXT TEXT
//   Area is    ─────── formula 0 ───────   for  a    circle.
//
// The i-th placeholder refers to formulas["i"]. A placeholder
// whose formula is missing is skipped and counted. The sequence
// always ends with the last text chunk, even if it is empty.
//
// Baseline mode has no formula tokens at all: the formula is
// written back out as " <m> tex </m> " and tokenized as text.
// With post_proc the TeX is replaced by the decoded OPT so the
// baseline sees the same normalised formula the tree model does.

use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::data::decode::decode_formula;
use crate::data::formula_tokenizer::FormulaTokenizer;
use crate::data::vocab::FormulaVocab;
use crate::domain::formula::Formula;
use crate::domain::options::TrainOptions;
use crate::domain::sample::TaggedText;
use crate::domain::sequence::{Sequence, Token};
use crate::domain::token::{TokenType, END_FORMULA_TEXT, START_FORMULA_TEXT};
use crate::domain::traits::TextTokenizer;

pub struct SequenceTokenizer<'a> {
    text_tokenizer: &'a dyn TextTokenizer,
    vocab: &'a FormulaVocab,
    options: &'a TrainOptions,
}

impl<'a> SequenceTokenizer<'a> {
    pub fn new(
        text_tokenizer: &'a dyn TextTokenizer,
        vocab: &'a FormulaVocab,
        options: &'a TrainOptions,
    ) -> Self {
        Self { text_tokenizer, vocab, options }
    }

    pub fn options(&self) -> &TrainOptions {
        self.options
    }

    /// Returns the sequence and the number of placeholders whose
    /// formula was missing from `formulas`.
    pub fn tokenize_sequence(
        &self,
        name: &str,
        text: &str,
        formulas: &HashMap<String, Formula>,
    ) -> Result<(Sequence, usize)> {
        let formula_tokenizer = FormulaTokenizer::new(self.vocab, self.text_tokenizer, self.options);
        let mut sequence = Sequence::new(name, self.options.shared_emb);
        let mut missing = 0;

        let chunks: Vec<&str> = text.split(self.options.formula_marker.as_str()).collect();
        for (index, chunk) in chunks.iter().enumerate() {
            self.push_text(&mut sequence, chunk)
                .with_context(|| format!("Cannot tokenize text of '{name}'"))?;

            if index + 1 == chunks.len() {
                break;
            }
            let Some(formula) = formulas.get(&index.to_string()) else {
                missing += 1;
                continue;
            };

            if self.options.baseline {
                let tex = if self.options.post_proc {
                    let run = formula_tokenizer.tokenize(&formula.opt)?;
                    decode_formula(run.token_ids(), run.token_types(), self.vocab)
                } else {
                    formula.tex.clone()
                };
                let delimited = format!("{START_FORMULA_TEXT}{tex}{END_FORMULA_TEXT}");
                self.push_text(&mut sequence, &delimited)?;
            } else {
                sequence.push_token(self.marker(TokenType::StartFormula));
                sequence.extend(&formula_tokenizer.tokenize(&formula.opt)?);
                sequence.push_token(self.marker(TokenType::EndFormula));
            }
        }

        Ok((sequence, missing))
    }

    /// Tokenize a tagged field, optionally wrapped in fixed text.
    pub fn tokenize_tagged(&self, prefix: &str, field: &TaggedText, suffix: &str) -> Result<(Sequence, usize)> {
        let text = format!("{prefix}{}{suffix}", field.text);
        self.tokenize_sequence("", &text, &field.formulas)
    }

    /// Tokenize fixed text that has no formulas.
    pub fn tokenize_text(&self, text: &str) -> Result<Sequence> {
        let mut sequence = Sequence::new("", self.options.shared_emb);
        self.push_text(&mut sequence, text)?;
        Ok(sequence)
    }

    fn push_text(&self, sequence: &mut Sequence, text: &str) -> Result<()> {
        for id in self.text_tokenizer.encode(text)? {
            sequence.push_token(Token::flat(
                id,
                TokenType::Text,
                self.options.max_formula_depth,
                self.options.shared_emb,
            ));
        }
        Ok(())
    }

    fn marker(&self, kind: TokenType) -> Token {
        Token::flat(0, kind, self.options.max_formula_depth, self.options.shared_emb)
    }
}
