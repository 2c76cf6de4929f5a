// Shared fixtures for unit tests across layers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::domain::formula::{Formula, OptNode};
use crate::domain::options::TrainOptions;
use crate::domain::sample::TaggedText;
use crate::domain::traits::TextTokenizer;

/// Whitespace tokenizer: every distinct word gets the next id, from 1.
#[derive(Default)]
pub struct WordTokenizer {
    words: Mutex<(HashMap<String, u32>, Vec<String>)>,
}

impl TextTokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let mut guard = self.words.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        let (index, words) = &mut *guard;
        Ok(text
            .split_whitespace()
            .map(|word| {
                *index.entry(word.to_string()).or_insert_with(|| {
                    words.push(word.to_string());
                    words.len() as u32
                })
            })
            .collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        let guard = self.words.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            match id.checked_sub(1).and_then(|i| guard.1.get(i as usize)) {
                Some(word) => out.push(word.clone()),
                None => bail!("unknown word id {id}"),
            }
        }
        Ok(out.join(" "))
    }
}

pub fn options_with_depth(max_formula_depth: usize) -> TrainOptions {
    TrainOptions {
        max_formula_depth,
        formula_marker: "§".to_string(),
        ..TrainOptions::default()
    }
}

/// r squared, as extracted from "\pi r^2"
pub fn circle_formula() -> Formula {
    Formula {
        tex: "r^2".to_string(),
        opt: OptNode::op("^", vec![OptNode::var("r"), OptNode::num("2")]),
    }
}

/// Text with formulas keyed by placeholder index.
pub fn tagged(text: &str, formulas: Vec<Formula>) -> TaggedText {
    TaggedText {
        text: text.to_string(),
        formulas: formulas
            .into_iter()
            .enumerate()
            .map(|(i, f)| (i.to_string(), f))
            .collect(),
    }
}

/// Word-level tokenizer.json over `words`: ids from 1, [UNK] = 0.
pub fn write_word_tokenizer(dir: &Path, words: &[&str]) {
    let mut vocab = serde_json::Map::new();
    vocab.insert("[UNK]".to_string(), 0.into());
    for (i, word) in words.iter().enumerate() {
        vocab.insert(word.to_string(), (i + 1).into());
    }
    let tokenizer_json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    });
    std::fs::write(dir.join("tokenizer.json"), tokenizer_json.to_string()).unwrap();
}
