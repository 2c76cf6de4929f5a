// ============================================================
// Layer 3 — Formula Domain Types
// ============================================================
// A formula arrives from the extraction pass as
//
//   { "tex": "\\pi r^2", "opt": ["O!", "^", [["V!", "r", null], ["N!", "2", null]]] }
//
// The OPT (operator tree) is a nested [type, symbol, children]
// triple. The type code says what the symbol is; the children
// list is null for leaves. Unknown type codes mean the upstream
// extraction produced something we do not understand, so
// deserialisation fails instead of guessing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when an OPT node carries a type code we do not know.
#[derive(Debug, Error)]
#[error("unknown OPT symbol type '{0}'")]
pub struct UnknownSymbolKind(pub String);

/// Classification of an OPT symbol, from its type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Number,
    Variable,
    Text,
    Function,
    Operator,
    Matrix,
    Unicode,
}

impl SymbolKind {
    pub fn from_code(code: &str) -> Result<Self, UnknownSymbolKind> {
        match code {
            "N!" => Ok(SymbolKind::Number),
            "V!" => Ok(SymbolKind::Variable),
            "T!" => Ok(SymbolKind::Text),
            "F!" => Ok(SymbolKind::Function),
            "O!" => Ok(SymbolKind::Operator),
            "M!" => Ok(SymbolKind::Matrix),
            "U!" => Ok(SymbolKind::Unicode),
            other => Err(UnknownSymbolKind(other.to_string())),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            SymbolKind::Number => "N!",
            SymbolKind::Variable => "V!",
            SymbolKind::Text => "T!",
            SymbolKind::Function => "F!",
            SymbolKind::Operator => "O!",
            SymbolKind::Matrix => "M!",
            SymbolKind::Unicode => "U!",
        }
    }
}

/// One node of an operator tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOpt", into = "RawOpt")]
pub struct OptNode {
    pub kind: SymbolKind,
    pub symbol: String,
    /// Ordered children; empty for leaves
    pub children: Vec<OptNode>,
}

/// Wire shape of an OPT node: `[type, symbol, children | null]`
#[derive(Serialize, Deserialize)]
struct RawOpt(String, String, Option<Vec<OptNode>>);

impl TryFrom<RawOpt> for OptNode {
    type Error = UnknownSymbolKind;

    fn try_from(raw: RawOpt) -> Result<Self, Self::Error> {
        let RawOpt(code, symbol, children) = raw;
        Ok(Self {
            kind: SymbolKind::from_code(&code)?,
            symbol,
            children: children.unwrap_or_default(),
        })
    }
}

impl From<OptNode> for RawOpt {
    fn from(node: OptNode) -> Self {
        let children = if node.children.is_empty() {
            None
        } else {
            Some(node.children)
        };
        RawOpt(node.kind.code().to_string(), node.symbol, children)
    }
}

impl OptNode {
    pub fn new(kind: SymbolKind, symbol: impl Into<String>, children: Vec<OptNode>) -> Self {
        Self { kind, symbol: symbol.into(), children }
    }

    /// Operator node with the given children
    pub fn op(symbol: impl Into<String>, children: Vec<OptNode>) -> Self {
        Self::new(SymbolKind::Operator, symbol, children)
    }

    /// Variable leaf
    pub fn var(symbol: impl Into<String>) -> Self {
        Self::new(SymbolKind::Variable, symbol, Vec::new())
    }

    /// Number leaf
    pub fn num(symbol: impl Into<String>) -> Self {
        Self::new(SymbolKind::Number, symbol, Vec::new())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of levels in the tree; a single leaf has depth 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(OptNode::depth).max().unwrap_or(0)
    }
}

/// A formula as stored next to the article text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub tex: String,
    pub opt: OptNode,
}
