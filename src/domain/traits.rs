// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline talks to two external collaborators through
// traits so neither leaks into the data layer:
//
//   - TextTokenizer → the subword tokenizer (GPT-2 BPE in
//                     production, a word splitter in tests)
//   - ArticleSource → wherever pre-processed articles live

use anyhow::Result;

use crate::domain::sample::NamedArticle;

// ─── TextTokenizer ────────────────────────────────────────────────────────────
/// Any component that can turn text into subword ids and back.
///
/// Implementations:
///   - tokenizers::Tokenizer (see infra::tokenizer_store)
///   - a whitespace tokenizer used by unit tests
pub trait TextTokenizer: Send + Sync {
    /// Encode text without adding special tokens.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode ids back into text.
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

// ─── ArticleSource ────────────────────────────────────────────────────────────
/// Any component that can load pre-processed articles.
///
/// Implementations:
///   - ArticleLoader → a directory of article JSON files
pub trait ArticleSource {
    /// Load every available article, in a stable order.
    fn load_all(&self) -> Result<Vec<NamedArticle>>;
}
