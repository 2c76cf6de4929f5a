// ============================================================
// Layer 3 — Sequence Domain Type
// ============================================================
// A Sequence is an ordered run of tokens stored channel-wise:
//
//   index:        0     1      2    3    4    5     6
//   token_ids:   812   0      14   3    7    0     0
//   token_types: TEXT  START  OP   VAR  NUM  END   END_F
//   pos_levels:  0     0      0    1    1    1     0
//   pos_vecs:    [0,0] [0,0]  [1,0][1,1][1,2][1,3] [0,0]
//
// Every channel always has exactly len() entries. That invariant
// is why the channel vectors are private: tokens only enter
// through push_token / extend / concatenation, and leave through
// split_at, all of which keep the channels in lock-step.
//
// gpt_tokens is the optional sub-token channel used when formula
// symbols share the text embedding table. It is either present
// for every token or absent for every token.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::domain::token::TokenType;

/// Task-specific metadata attached to a sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceMeta {
    /// Number of leading tokens that form the prompt (generative tasks)
    pub prompt_length: Option<usize>,
    /// Class label (classification tasks)
    pub label: Option<usize>,
    pub problem_id: Option<i64>,
    pub problem_log_id: Option<i64>,
}

impl SequenceMeta {
    pub fn with_prompt_length(prompt_length: usize) -> Self {
        Self { prompt_length: Some(prompt_length), ..Self::default() }
    }

    pub fn with_label(label: usize) -> Self {
        Self { label: Some(label), ..Self::default() }
    }

    /// Overlay `other` on top of `self`: fields set in `other` win.
    pub fn merge(&mut self, other: &SequenceMeta) {
        if other.prompt_length.is_some() {
            self.prompt_length = other.prompt_length;
        }
        if other.label.is_some() {
            self.label = other.label;
        }
        if other.problem_id.is_some() {
            self.problem_id = other.problem_id;
        }
        if other.problem_log_id.is_some() {
            self.problem_log_id = other.problem_log_id;
        }
    }
}

/// A single token with all of its channels, used to build sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: u32,
    pub kind: TokenType,
    pub pos_vec: Vec<u32>,
    pub pos_level: u32,
    pub gpt_tokens: Option<Vec<u32>>,
}

impl Token {
    /// A token outside any formula tree: zero position, level 0.
    pub fn flat(id: u32, kind: TokenType, depth: usize, shared_emb: bool) -> Self {
        Self {
            id,
            kind,
            pos_vec: vec![0; depth],
            pos_level: 0,
            gpt_tokens: shared_emb.then(Vec::new),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Provenance (article file name, or empty for task samples)
    pub name: String,
    pub meta: SequenceMeta,
    token_ids: Vec<u32>,
    token_types: Vec<TokenType>,
    pos_vecs: Vec<Vec<u32>>,
    pos_levels: Vec<u32>,
    gpt_tokens: Option<Vec<Vec<u32>>>,
}

impl Sequence {
    /// Empty sequence. `shared_emb` decides whether the sub-token
    /// channel exists.
    pub fn new(name: impl Into<String>, shared_emb: bool) -> Self {
        Self {
            name: name.into(),
            gpt_tokens: shared_emb.then(Vec::new),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    pub fn token_ids(&self) -> &[u32] {
        &self.token_ids
    }

    pub fn token_types(&self) -> &[TokenType] {
        &self.token_types
    }

    pub fn pos_vecs(&self) -> &[Vec<u32>] {
        &self.pos_vecs
    }

    pub fn pos_levels(&self) -> &[u32] {
        &self.pos_levels
    }

    pub fn gpt_tokens(&self) -> Option<&[Vec<u32>]> {
        self.gpt_tokens.as_deref()
    }

    pub fn has_shared_emb(&self) -> bool {
        self.gpt_tokens.is_some()
    }

    /// Append one token.
    ///
    /// # Panics
    /// Panics if the token's sub-token channel does not match the
    /// sequence's (present vs. absent).
    pub fn push_token(&mut self, token: Token) {
        match (&mut self.gpt_tokens, token.gpt_tokens) {
            (Some(channel), Some(sub_tokens)) => channel.push(sub_tokens),
            (None, None) => {}
            _ => panic!("token sub-token channel does not match sequence '{}'", self.name),
        }
        self.token_ids.push(token.id);
        self.token_types.push(token.kind);
        self.pos_vecs.push(token.pos_vec);
        self.pos_levels.push(token.pos_level);
    }

    /// Append every token of `other`, leaving name and meta untouched.
    ///
    /// # Panics
    /// Panics if exactly one of the two sequences has sub-tokens.
    pub fn extend(&mut self, other: &Sequence) {
        match (&mut self.gpt_tokens, &other.gpt_tokens) {
            (Some(mine), Some(theirs)) => mine.extend(theirs.iter().cloned()),
            (None, None) => {}
            _ => panic!(
                "cannot join '{}' and '{}': sub-token channels differ",
                self.name, other.name
            ),
        }
        self.token_ids.extend_from_slice(&other.token_ids);
        self.token_types.extend_from_slice(&other.token_types);
        self.pos_vecs.extend(other.pos_vecs.iter().cloned());
        self.pos_levels.extend_from_slice(&other.pos_levels);
    }

    /// Cut into `[0, index)` and `[index, len)`. Both halves keep the
    /// name and meta of the original.
    ///
    /// # Panics
    /// Panics if `index > len()`.
    pub fn split_at(&self, index: usize) -> (Sequence, Sequence) {
        (self.slice(0, index), self.slice(index, self.len()))
    }

    /// Copy of the tokens in `[start, end)` with this sequence's name and meta.
    pub fn slice(&self, start: usize, end: usize) -> Sequence {
        Sequence {
            name: self.name.clone(),
            meta: self.meta.clone(),
            token_ids: self.token_ids[start..end].to_vec(),
            token_types: self.token_types[start..end].to_vec(),
            pos_vecs: self.pos_vecs[start..end].to_vec(),
            pos_levels: self.pos_levels[start..end].to_vec(),
            gpt_tokens: self.gpt_tokens.as_ref().map(|g| g[start..end].to_vec()),
        }
    }

    /// Number of formulas (START_FORMULA markers) in `[start, end)`.
    pub fn count_formulas(&self, start: usize, end: usize) -> usize {
        self.token_types[start..end]
            .iter()
            .filter(|t| **t == TokenType::StartFormula)
            .count()
    }
}

// ─── Concatenation ────────────────────────────────────────────────────────────
// `a + &b` keeps a's name; b's meta fields overwrite a's where set.
impl Add<&Sequence> for Sequence {
    type Output = Sequence;

    fn add(mut self, rhs: &Sequence) -> Sequence {
        self += rhs;
        self
    }
}

impl AddAssign<&Sequence> for Sequence {
    fn add_assign(&mut self, rhs: &Sequence) {
        self.extend(rhs);
        self.meta.merge(&rhs.meta);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn text_seq(ids: &[u32]) -> Sequence {
        let mut seq = Sequence::new("doc", false);
        for &id in ids {
            seq.push_token(Token::flat(id, TokenType::Text, 2, false));
        }
        seq
    }

    #[test]
    fn test_split_at_keeps_channels_aligned() {
        let seq = text_seq(&[1, 2, 3, 4]);
        let (left, right) = seq.split_at(1);

        assert_eq!(left.token_ids(), &[1]);
        assert_eq!(right.token_ids(), &[2, 3, 4]);
        assert_eq!(right.pos_vecs().len(), 3);
        assert_eq!(right.pos_levels().len(), 3);
        assert_eq!(right.name, "doc");
    }

    #[test]
    fn test_concatenation_merges_meta_from_right() {
        let mut left = text_seq(&[1, 2]);
        left.meta.problem_id = Some(7);
        let mut right = text_seq(&[3]);
        right.meta.label = Some(4);

        let joined = left + &right;
        assert_eq!(joined.token_ids(), &[1, 2, 3]);
        assert_eq!(joined.meta.problem_id, Some(7));
        assert_eq!(joined.meta.label, Some(4));
    }

    #[test]
    fn test_empty_split_points() {
        let seq = text_seq(&[1, 2]);
        let (left, right) = seq.split_at(0);
        assert!(left.is_empty());
        assert_eq!(right.len(), 2);
    }

    #[test]
    #[should_panic]
    fn test_mixing_sub_token_modes_panics() {
        let mut plain = text_seq(&[1]);
        let shared = Sequence::new("shared", true);
        plain += &shared;
    }
}
