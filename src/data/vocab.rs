// ============================================================
// Layer 4 — Formula Vocabulary
// ============================================================
// Formula symbols are embedded per token type, so each of OP,
// VAR and NUM has its own id space:
//
//   OP:  0=[UNK]  1=plus  2=times  3=^ ...
//   VAR: 0=[UNK]  1=x     2=r      ...
//   NUM: 0=[UNK]  1=2     2=1      ...
//
// Id 0 of every table is the unknown symbol. Structural tokens
// (START_FORMULA, END_FORMULA, END) always use id 0 as well.
//
// The vocabulary is built by counting symbols over a corpus of
// formulas, classifying each node exactly the way the formula
// tokenizer will, and keeping every symbol seen at least
// `min_symbol_count` times. Ties are broken alphabetically so a
// rebuild over the same corpus yields the same ids.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::formula_tokenizer::node_token_type;
use crate::domain::formula::OptNode;
use crate::domain::token::TokenType;

pub const UNK_SYMBOL: &str = "[UNK]";

#[derive(Debug, Clone, Default, PartialEq)]
struct SymbolTable {
    symbols: Vec<String>,
    index: HashMap<String, u32>,
}

impl SymbolTable {
    fn from_symbols(symbols: impl IntoIterator<Item = String>) -> Self {
        let mut table = Self::default();
        table.insert(UNK_SYMBOL.to_string());
        for symbol in symbols {
            table.insert(symbol);
        }
        table
    }

    fn insert(&mut self, symbol: String) {
        if !self.index.contains_key(&symbol) {
            self.index.insert(symbol.clone(), self.symbols.len() as u32);
            self.symbols.push(symbol);
        }
    }

    fn id(&self, symbol: &str) -> u32 {
        self.index.get(symbol).copied().unwrap_or(0)
    }

    fn symbol(&self, id: u32) -> Option<&str> {
        self.symbols.get(id as usize).map(String::as_str)
    }

    /// Symbols without the leading [UNK]
    fn known(&self) -> Vec<String> {
        self.symbols.iter().skip(1).cloned().collect()
    }
}

/// On-disk shape: one symbol list per type, [UNK] implied at id 0.
#[derive(Serialize, Deserialize)]
struct VocabFile {
    op: Vec<String>,
    var: Vec<String>,
    num: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "VocabFile", into = "VocabFile")]
pub struct FormulaVocab {
    ops: SymbolTable,
    vars: SymbolTable,
    nums: SymbolTable,
}

impl From<VocabFile> for FormulaVocab {
    fn from(file: VocabFile) -> Self {
        Self {
            ops: SymbolTable::from_symbols(file.op),
            vars: SymbolTable::from_symbols(file.var),
            nums: SymbolTable::from_symbols(file.num),
        }
    }
}

impl From<FormulaVocab> for VocabFile {
    fn from(vocab: FormulaVocab) -> Self {
        Self {
            op: vocab.ops.known(),
            var: vocab.vars.known(),
            num: vocab.nums.known(),
        }
    }
}

impl Default for FormulaVocab {
    fn default() -> Self {
        Self::from_symbols(Vec::new(), Vec::new(), Vec::new())
    }
}

impl FormulaVocab {
    /// Build from explicit symbol lists (ids follow list order, from 1).
    pub fn from_symbols(op: Vec<String>, var: Vec<String>, num: Vec<String>) -> Self {
        VocabFile { op, var, num }.into()
    }

    fn table(&self, kind: TokenType) -> Option<&SymbolTable> {
        match kind {
            TokenType::Op => Some(&self.ops),
            TokenType::Var => Some(&self.vars),
            TokenType::Num => Some(&self.nums),
            _ => None,
        }
    }

    /// Id of `symbol` in the table for `kind`; 0 for unknown symbols
    /// and for token types without a table.
    pub fn token_id(&self, kind: TokenType, symbol: &str) -> u32 {
        self.table(kind).map_or(0, |t| t.id(symbol))
    }

    /// Inverse of [`FormulaVocab::token_id`].
    pub fn symbol(&self, kind: TokenType, id: u32) -> Option<&str> {
        self.table(kind).and_then(|t| t.symbol(id))
    }

    /// Table size including [UNK]; 0 for types without a table.
    pub fn size(&self, kind: TokenType) -> usize {
        self.table(kind).map_or(0, |t| t.symbols.len())
    }

    /// Symbols across all tables, excluding [UNK].
    pub fn known_symbols(&self) -> usize {
        [&self.ops, &self.vars, &self.nums].iter().map(|t| t.symbols.len() - 1).sum()
    }
}

// ─── Building ─────────────────────────────────────────────────────────────────
/// Accumulates symbol frequencies per token type.
#[derive(Debug, Default)]
pub struct SymbolCounter {
    counts: HashMap<(TokenType, String), usize>,
    max_depth: usize,
}

impl SymbolCounter {
    pub fn new(max_depth: usize) -> Self {
        Self { counts: HashMap::new(), max_depth }
    }

    /// Count every node of one formula tree.
    pub fn add_formula(&mut self, opt: &OptNode) {
        // Explicit stack; mirrors the tokenizer's depth-first walk.
        let mut stack = vec![(opt, 0usize)];
        while let Some((node, level)) = stack.pop() {
            let kind = node_token_type(node, level, self.max_depth);
            *self.counts.entry((kind, node.symbol.clone())).or_insert(0) += 1;
            if kind == TokenType::Op {
                stack.extend(node.children.iter().map(|child| (child, level + 1)));
            }
        }
    }

    pub fn distinct_symbols(&self) -> usize {
        self.counts.len()
    }

    /// Freeze into a vocabulary, keeping symbols seen `min_count` times or more.
    pub fn build(&self, min_count: usize) -> FormulaVocab {
        let pick = |kind: TokenType| -> Vec<String> {
            let mut kept: Vec<(&String, usize)> = self
                .counts
                .iter()
                .filter(|((k, _), count)| *k == kind && **count >= min_count)
                .map(|((_, symbol), count)| (symbol, *count))
                .collect();
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            kept.into_iter().map(|(symbol, _)| symbol.clone()).collect()
        };
        FormulaVocab::from_symbols(pick(TokenType::Op), pick(TokenType::Var), pick(TokenType::Num))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn circle_area() -> OptNode {
        OptNode::op("^", vec![OptNode::var("r"), OptNode::num("2")])
    }

    #[test]
    fn test_counter_classifies_like_the_tokenizer() {
        let mut counter = SymbolCounter::new(8);
        counter.add_formula(&circle_area());
        counter.add_formula(&OptNode::op("times", vec![OptNode::var("r"), OptNode::var("r")]));
        let vocab = counter.build(1);

        // r is the most frequent variable
        assert_eq!(vocab.token_id(TokenType::Var, "r"), 1);
        assert_eq!(vocab.token_id(TokenType::Num, "2"), 1);
        assert_ne!(vocab.token_id(TokenType::Op, "^"), 0);
        assert_eq!(vocab.size(TokenType::Op), 3);
    }

    #[test]
    fn test_rare_symbols_map_to_unk() {
        let mut counter = SymbolCounter::new(8);
        counter.add_formula(&circle_area());
        counter.add_formula(&OptNode::var("r"));
        let vocab = counter.build(2);

        assert_eq!(vocab.token_id(TokenType::Var, "r"), 1);
        assert_eq!(vocab.token_id(TokenType::Num, "2"), 0);
        assert_eq!(vocab.symbol(TokenType::Num, 0), Some(UNK_SYMBOL));
    }

    #[test]
    fn test_json_round_trip_keeps_ids() {
        let vocab = FormulaVocab::from_symbols(
            vec!["plus".into(), "^".into()],
            vec!["x".into()],
            vec!["2".into()],
        );
        let json = serde_json::to_string(&vocab).unwrap();
        let back: FormulaVocab = serde_json::from_str(&json).unwrap();

        assert_eq!(back.token_id(TokenType::Op, "^"), 2);
        assert_eq!(back.symbol(TokenType::Var, 1), Some("x"));
        assert_eq!(back, vocab);
    }

    #[test]
    fn test_structural_tokens_have_no_table() {
        let vocab = FormulaVocab::default();
        assert_eq!(vocab.token_id(TokenType::End, "anything"), 0);
        assert_eq!(vocab.size(TokenType::Text), 0);
    }
}
