// ============================================================
// Layer 4 — Formula Tokenizer
// ============================================================
// Flattens one OPT into a depth-first token run that keeps
// enough structure to rebuild the tree:
//
//   ^(r, 2)   →   OP(^)  VAR(r)  NUM(2)  END
//   level:        0      1       1       1
//   pos_vec:      [1,0]  [1,1]   [1,2]   [1,3]
//
//   - a node with children emits OP, its children, then END
//   - a leaf emits NUM for numbers and VAR for everything else
//   - pos_vec[l] is the 1-based sibling index of the ancestor at
//     level l (the node itself at its own level); deeper entries
//     are zero
//   - END sits one level below its node, after the last child
//
// pos_vec has a fixed length (max_formula_depth). A node on the
// deepest representable level has nowhere to put its children or
// its END, so it is emitted as a leaf and its subtree is pruned.
//
// The same position rules run in reverse in `next_position`,
// which predicts where the token after a given one sits when a
// model generates formulas token by token.

use anyhow::Result;

use crate::data::vocab::FormulaVocab;
use crate::domain::formula::{OptNode, SymbolKind};
use crate::domain::options::TrainOptions;
use crate::domain::sequence::{Sequence, Token};
use crate::domain::token::TokenType;
use crate::domain::traits::TextTokenizer;

/// Token type a node is emitted as when it sits on `level`.
pub fn node_token_type(node: &OptNode, level: usize, max_depth: usize) -> TokenType {
    if !node.is_leaf() && level + 1 < max_depth {
        TokenType::Op
    } else if node.kind == SymbolKind::Number {
        TokenType::Num
    } else {
        TokenType::Var
    }
}

pub struct FormulaTokenizer<'a> {
    vocab: &'a FormulaVocab,
    text_tokenizer: &'a dyn TextTokenizer,
    max_depth: usize,
    shared_emb: bool,
}

impl<'a> FormulaTokenizer<'a> {
    pub fn new(
        vocab: &'a FormulaVocab,
        text_tokenizer: &'a dyn TextTokenizer,
        options: &TrainOptions,
    ) -> Self {
        Self {
            vocab,
            text_tokenizer,
            max_depth: options.max_formula_depth,
            shared_emb: options.shared_emb,
        }
    }

    /// Tokenize one formula tree into an unnamed sequence.
    pub fn tokenize(&self, opt: &OptNode) -> Result<Sequence> {
        let mut sequence = Sequence::new("", self.shared_emb);
        let mut root_pos = vec![0; self.max_depth];
        root_pos[0] = 1;
        self.visit(opt, 0, root_pos, &mut sequence)?;
        Ok(sequence)
    }

    fn visit(&self, node: &OptNode, level: usize, pos_vec: Vec<u32>, out: &mut Sequence) -> Result<()> {
        let kind = node_token_type(node, level, self.max_depth);
        let gpt_tokens = if self.shared_emb {
            Some(self.text_tokenizer.encode(&node.symbol)?)
        } else {
            None
        };
        out.push_token(Token {
            id: self.vocab.token_id(kind, &node.symbol),
            kind,
            pos_vec: pos_vec.clone(),
            pos_level: level as u32,
            gpt_tokens,
        });

        if kind != TokenType::Op {
            return Ok(());
        }

        let child_level = level + 1;
        for (index, child) in node.children.iter().enumerate() {
            let mut child_pos = pos_vec.clone();
            child_pos[child_level] = index as u32 + 1;
            self.visit(child, child_level, child_pos, out)?;
        }

        let mut end_pos = pos_vec;
        end_pos[child_level] = node.children.len() as u32 + 1;
        out.push_token(Token {
            id: 0,
            kind: TokenType::End,
            pos_vec: end_pos,
            pos_level: child_level as u32,
            gpt_tokens: self.shared_emb.then(Vec::new),
        });
        Ok(())
    }
}

/// Position of the token that follows a formula token of type `kind`
/// at `(pos_vec, level)`.
///
///   OP       → its first child
///   VAR/NUM  → next sibling; at level 0 the formula is over
///   END      → the parent's next sibling; at level ≤ 1 the formula is over
///
/// Anything else (or running off the end of pos_vec) yields the
/// empty position used by non-formula tokens.
pub fn next_position(pos_vec: &[u32], level: u32, kind: TokenType) -> (Vec<u32>, u32) {
    let depth = pos_vec.len();
    let level = level as usize;
    let mut next = pos_vec.to_vec();

    match kind {
        TokenType::Op if level + 1 < depth => {
            next[level + 1] = 1;
            (next, level as u32 + 1)
        }
        TokenType::Var | TokenType::Num if level > 0 && level < depth => {
            next[level] += 1;
            (next, level as u32)
        }
        TokenType::End if level > 1 && level < depth => {
            next[level] = 0;
            next[level - 1] += 1;
            (next, level as u32 - 1)
        }
        _ => (vec![0; depth], 0),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::{options_with_depth, WordTokenizer};

    fn circle_area() -> OptNode {
        OptNode::op("^", vec![OptNode::var("r"), OptNode::num("2")])
    }

    fn vocab() -> FormulaVocab {
        FormulaVocab::from_symbols(vec!["^".into()], vec!["r".into()], vec!["2".into()])
    }

    #[test]
    fn test_depth_first_run_with_end_marker() {
        let vocab = vocab();
        let words = WordTokenizer::default();
        let opts = options_with_depth(4);
        let run = FormulaTokenizer::new(&vocab, &words, &opts).tokenize(&circle_area()).unwrap();

        assert_eq!(
            run.token_types(),
            &[TokenType::Op, TokenType::Var, TokenType::Num, TokenType::End]
        );
        assert_eq!(run.token_ids(), &[1, 1, 1, 0]);
        assert_eq!(run.pos_levels(), &[0, 1, 1, 1]);
        assert_eq!(
            run.pos_vecs(),
            &[vec![1, 0, 0, 0], vec![1, 1, 0, 0], vec![1, 2, 0, 0], vec![1, 3, 0, 0]]
        );
        assert!(run.gpt_tokens().is_none());
    }

    #[test]
    fn test_nested_positions_track_ancestors() {
        // a = (b + 1)
        let tree = OptNode::op(
            "eq",
            vec![OptNode::var("a"), OptNode::op("plus", vec![OptNode::var("b"), OptNode::num("1")])],
        );
        let vocab = FormulaVocab::default();
        let words = WordTokenizer::default();
        let opts = options_with_depth(3);
        let run = FormulaTokenizer::new(&vocab, &words, &opts).tokenize(&tree).unwrap();

        // eq a plus b 1 END(plus) END(eq)
        assert_eq!(run.len(), 7);
        assert_eq!(run.pos_vecs()[2], vec![1, 2, 0]);
        assert_eq!(run.pos_vecs()[3], vec![1, 2, 1]);
        assert_eq!(run.pos_vecs()[4], vec![1, 2, 2]);
        assert_eq!(run.pos_vecs()[5], vec![1, 2, 3]);
        assert_eq!(run.pos_levels()[5], 2);
        assert_eq!(run.pos_vecs()[6], vec![1, 3, 0]);
        assert_eq!(run.pos_levels()[6], 1);
    }

    #[test]
    fn test_subtrees_below_max_depth_are_pruned() {
        let tree = OptNode::op("f", vec![OptNode::op("g", vec![OptNode::var("x")])]);
        let vocab = FormulaVocab::default();
        let words = WordTokenizer::default();
        let opts = options_with_depth(2);
        let run = FormulaTokenizer::new(&vocab, &words, &opts).tokenize(&tree).unwrap();

        // g sits on the last level, so it becomes a leaf and x disappears
        assert_eq!(run.token_types(), &[TokenType::Op, TokenType::Var, TokenType::End]);
        assert!(run.pos_vecs().iter().all(|p| p.len() == 2));
    }

    #[test]
    fn test_shared_embedding_sub_tokens() {
        let vocab = vocab();
        let words = WordTokenizer::default();
        let opts = TrainOptions { shared_emb: true, ..options_with_depth(4) };
        let run = FormulaTokenizer::new(&vocab, &words, &opts).tokenize(&circle_area()).unwrap();

        let subs = run.gpt_tokens().unwrap();
        assert_eq!(subs.len(), 4);
        assert_eq!(subs[1], words.encode("r").unwrap());
        assert!(subs[3].is_empty());
    }

    #[test]
    fn test_next_position_follows_tree_walk() {
        // OP leads to its first child
        assert_eq!(next_position(&[1, 0, 0], 0, TokenType::Op), (vec![1, 1, 0], 1));
        // VAR and NUM lead to the next sibling
        assert_eq!(next_position(&[1, 1, 0], 1, TokenType::Var), (vec![1, 2, 0], 1));
        assert_eq!(next_position(&[1, 3, 1], 2, TokenType::Num), (vec![1, 3, 2], 2));
        // END leads to the parent's next sibling
        assert_eq!(next_position(&[1, 5, 3], 2, TokenType::End), (vec![1, 6, 0], 1));
        // a lone VAR is a whole formula
        assert_eq!(next_position(&[1, 0, 0], 0, TokenType::Var), (vec![0, 0, 0], 0));
        // END directly below the root closes the formula
        assert_eq!(next_position(&[1, 2, 0], 1, TokenType::End), (vec![0, 0, 0], 0));
    }

    #[test]
    fn test_next_position_replays_tokenizer_output() {
        let vocab = vocab();
        let words = WordTokenizer::default();
        let opts = options_with_depth(4);
        let run = FormulaTokenizer::new(&vocab, &words, &opts).tokenize(&circle_area()).unwrap();

        for i in 0..run.len() - 1 {
            let (pos, level) = next_position(&run.pos_vecs()[i], run.pos_levels()[i], run.token_types()[i]);
            assert_eq!(pos, run.pos_vecs()[i + 1]);
            assert_eq!(level, run.pos_levels()[i + 1]);
        }
    }
}
