// ============================================================
// Layer 6 — Evaluation Metrics and Outputs
// ============================================================
// Scores computed on host vectors once the tensors are pulled
// back, plus the text files written by generation evaluation:
//
//   <out_dir>/preds.txt   one decoded prediction per line
//   <out_dir>/labels.txt  the matching reference, same line
//
// Newlines inside a decoded sample are replaced with spaces so
// line N of both files always refers to sample N.
//
// Reference: Rust Book §12 (I/O and File Handling)

use std::{collections::BTreeSet, fmt, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Result of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    /// Average loss over the batches (0 when the pass computes none)
    pub loss: f64,
    pub metrics: Vec<(String, f64)>,
}

impl EvalReport {
    pub fn new(loss: f64) -> Self {
        Self { loss, metrics: Vec::new() }
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.metrics.push((name.to_string(), value));
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loss={:.4}", self.loss)?;
        for (name, value) in &self.metrics {
            write!(f, " | {name}: {value:.3}")?;
        }
        Ok(())
    }
}

/// Fraction of positions where prediction and label agree.
pub fn accuracy(predictions: &[i64], labels: &[i64]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = predictions.iter().zip(labels).filter(|(p, l)| p == l).count();
    correct as f64 / labels.len() as f64
}

/// Unweighted mean of per-class F1 over every class that occurs
/// in either the predictions or the labels.
pub fn macro_f1(predictions: &[i64], labels: &[i64]) -> f64 {
    let classes: BTreeSet<i64> = predictions.iter().chain(labels).copied().collect();
    if classes.is_empty() {
        return 0.0;
    }

    let per_class = classes.iter().map(|&class| {
        let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
        for (&p, &l) in predictions.iter().zip(labels) {
            match (p == class, l == class) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => {}
            }
        }
        let precision = if tp + fp == 0 { 0.0 } else { tp as f64 / (tp + fp) as f64 };
        let recall = if tp + fn_ == 0 { 0.0 } else { tp as f64 / (tp + fn_) as f64 };
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    });
    per_class.sum::<f64>() / classes.len() as f64
}

/// Write predictions and labels side by side, one sample per line.
pub fn write_generations(out_dir: &Path, predictions: &[String], labels: &[String]) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("Cannot create '{}'", out_dir.display()))?;
    for (file, lines) in [("preds.txt", predictions), ("labels.txt", labels)] {
        let path = out_dir.join(file);
        let body: Vec<String> = lines.iter().map(|l| l.replace('\n', " ")).collect();
        fs::write(&path, body.join("\n")).with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Wrote {} lines to '{}'", lines.len(), path.display());
    }
    Ok(())
}
