// ============================================================
// Layer 3 — Token Types
// ============================================================
// Every position in a Sequence carries a TokenType. Text tokens
// come from the subword tokenizer; everything else describes a
// formula laid out depth-first:
//
//   START_FORMULA  OP  VAR  NUM  END  END_FORMULA
//        │          │    └────┴────┘       │
//        │          └─ opens a subtree     │
//        └────────── delimits the formula ─┘
//
// The numeric values are what the collator writes into the
// token_types tensor, so they must stay stable.

use serde::{Deserialize, Serialize};

/// Padding value for token ids, generation labels and sub-token ids.
/// Real ids are unsigned, so a negative sentinel can never collide.
pub const PADDING_TOKEN_ID: i32 = -100;

/// Appended to every generation target and pretraining article.
pub const EOS_TOKEN: &str = "<|endoftext|>";

/// Separator between the fields of a task prompt.
pub const SEP_TOKEN: &str = "[SEP]";

/// Marks the position whose hidden state a classifier reads.
pub const CLS_TOKEN: &str = "[CLS]";

/// Default placeholder substituted for formulas in article text.
pub const FORMULA_IDENTIFIER: &str = "[_mathGPT_formula_]";

/// Text that opens a formula rendered in baseline (text-only) mode.
pub const START_FORMULA_TEXT: &str = " <m> ";

/// Text that closes a formula rendered in baseline (text-only) mode.
pub const END_FORMULA_TEXT: &str = " </m> ";

/// The kind of a single token position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenType {
    Text = 0,
    StartFormula = 1,
    EndFormula = 2,
    Var = 3,
    Num = 4,
    Op = 5,
    End = 6,
}

impl TokenType {
    /// All token types, in id order.
    pub const ALL: [TokenType; 7] = [
        TokenType::Text,
        TokenType::StartFormula,
        TokenType::EndFormula,
        TokenType::Var,
        TokenType::Num,
        TokenType::Op,
        TokenType::End,
    ];

    /// Integer id written into collated tensors
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Inverse of [`TokenType::id`]; `None` for ids outside the enum.
    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.id() as i64 == id)
    }

    /// True for tokens that live inside a formula tree and therefore
    /// carry a meaningful tree position.
    pub fn is_formula_node(self) -> bool {
        matches!(self, TokenType::Var | TokenType::Num | TokenType::Op | TokenType::End)
    }
}
