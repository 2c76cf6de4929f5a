// ============================================================
// Layer 4 — Article and Sample Loader
// ============================================================
// Reads the JSON produced by the formula extraction pass.
//
//   articles/                 problems.json
//     0001.json  {text,         { "<id>": {text, formulas}, ... }
//     0002.json   formulas}
//     ...                     <task>.json
//                               [ sample, sample, ... ]
//
// Articles are one file each and are returned sorted by file
// name, so every run (and every rank) sees the same order.
// A missing directory yields an empty corpus; a malformed file
// is an error.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::domain::sample::{Article, NamedArticle};
use crate::domain::traits::ArticleSource;

/// Loads every `.json` article from a directory.
pub struct ArticleLoader {
    dir: PathBuf,
    limit: Option<usize>,
}

impl ArticleLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), limit: None }
    }

    /// Only load the first `limit` files
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    fn article_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        if let Some(limit) = self.limit {
            paths.truncate(limit);
        }
        Ok(paths)
    }
}

impl ArticleSource for ArticleLoader {
    fn load_all(&self) -> Result<Vec<NamedArticle>> {
        if !self.dir.exists() {
            tracing::warn!("Article directory '{}' does not exist, returning empty corpus", self.dir.display());
            return Ok(Vec::new());
        }

        let mut articles = Vec::new();
        for path in self.article_paths()? {
            let article: Article = load_json(&path)?;
            let name = path
                .file_stem()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string();
            tracing::debug!("Loaded: {} ({} chars, {} formulas)", name, article.text.len(), article.formulas.len());
            articles.push(NamedArticle { name, article });
        }

        tracing::info!("Loaded {} articles from '{}'", articles.len(), self.dir.display());
        Ok(articles)
    }
}

/// Parse one JSON file into `T`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Malformed JSON in '{}'", path.display()))
}

/// Problem statements keyed by problem id.
pub fn load_problems(path: &Path) -> Result<HashMap<String, Article>> {
    let problems: HashMap<String, Article> = load_json(path)?;
    tracing::info!("Loaded {} problems from '{}'", problems.len(), path.display());
    Ok(problems)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::GenTaskSample;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_articles_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.json", r#"{"text": "second", "formulas": {}}"#);
        write(dir.path(), "a.json", r#"{"text": "first [_mathGPT_formula_]", "formulas": {"0": {"tex": "x", "opt": ["V!", "x", null]}}}"#);
        write(dir.path(), "notes.txt", "ignored");

        let articles = ArticleLoader::new(dir.path()).load_all().unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].name, "a");
        assert_eq!(articles[0].article.formulas.len(), 1);
        assert_eq!(articles[1].article.text, "second");
    }

    #[test]
    fn test_limit_keeps_the_first_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.json", "a.json", "b.json"] {
            write(dir.path(), name, r#"{"text": "t"}"#);
        }
        let articles = ArticleLoader::new(dir.path()).with_limit(Some(2)).load_all().unwrap();
        let names: Vec<_> = articles.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_malformed_article_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", "{not json");
        assert!(ArticleLoader::new(dir.path()).load_all().is_err());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let articles = ArticleLoader::new(dir.path().join("nope")).load_all().unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn test_task_samples_and_problems_load() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "headlines.json", r#"[{"prompt": {"text": "p"}, "label": {"text": "l"}}]"#);
        write(dir.path(), "problems.json", r#"{"7": {"text": "solve it"}}"#);

        let samples: Vec<GenTaskSample> = load_json(&dir.path().join("headlines.json")).unwrap();
        assert_eq!(samples[0].label.text, "l");
        let problems = load_problems(&dir.path().join("problems.json")).unwrap();
        assert_eq!(problems["7"].text, "solve it");
    }
}
