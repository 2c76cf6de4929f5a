// ============================================================
// Layer 3 — Pipeline Options
// ============================================================
// Every knob the sequence pipeline reads, in one serialisable
// struct. The CLI converts its arguments into TrainOptions, the
// experiment store writes it to JSON, and the data layer only
// ever sees this type.

use std::{fmt, str::FromStr};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::domain::token::FORMULA_IDENTIFIER;

/// Tree-position encoding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tpe {
    /// No encoding channel is produced
    #[default]
    None,
    /// One-hot sibling index per level, concatenated
    Forte,
    /// Embedding split per level, sinusoid of the sibling index in each part
    SinPart,
    /// Sum of per-level sinusoids
    SinAdd,
}

impl FromStr for Tpe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Tpe::None),
            "forte" => Ok(Tpe::Forte),
            "sin_part" => Ok(Tpe::SinPart),
            "sin_add" => Ok(Tpe::SinAdd),
            other => Err(format!("unknown tree position encoding '{other}'")),
        }
    }
}

/// Downstream task a dataset was built for. Pretraining has no task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownstreamTask {
    Headlines,
    AnswerScoring,
    Feedback,
    Solving,
}

impl DownstreamTask {
    /// Classification tasks carry a label; the rest carry a prompt length.
    pub fn is_classification(self) -> bool {
        matches!(self, DownstreamTask::AnswerScoring)
    }
}

impl FromStr for DownstreamTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "headlines" => Ok(DownstreamTask::Headlines),
            "answer_scoring" => Ok(DownstreamTask::AnswerScoring),
            "feedback" => Ok(DownstreamTask::Feedback),
            "solving" => Ok(DownstreamTask::Solving),
            other => Err(format!("unknown downstream task '{other}'")),
        }
    }
}

impl fmt::Display for DownstreamTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownstreamTask::Headlines => "headlines",
            DownstreamTask::AnswerScoring => "answer_scoring",
            DownstreamTask::Feedback => "feedback",
            DownstreamTask::Solving => "solving",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    /// Context window, in tokens
    pub max_seq_len: usize,
    /// Sliding-window stride for perplexity; None means max_seq_len
    pub stride: Option<usize>,
    pub batch_size: usize,
    /// Render formulas as LaTeX text instead of tree tokens
    pub baseline: bool,
    /// In baseline mode, render the decoded OPT instead of the raw TeX
    pub post_proc: bool,
    /// Attach the subword ids of each formula symbol
    pub shared_emb: bool,
    pub tpe: Tpe,
    /// Evaluate formula regions of generation labels one at a time
    pub eval_formulas: bool,
    /// Evaluate text regions of generation labels one at a time
    pub eval_text: bool,
    pub num_classes: usize,
    /// Shard each data loader by rank
    pub ddp: bool,
    pub rank: usize,
    pub world_size: usize,
    /// Length of every pos_vec
    pub max_formula_depth: usize,
    /// Sibling positions representable by the forte encoding
    pub max_formula_width: usize,
    /// Width of sinusoidal tree-position encodings
    pub emb_size: usize,
    pub formula_marker: String,
    pub min_symbol_count: usize,
    pub num_workers: usize,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_seq_len:       1024,
            stride:            None,
            batch_size:        8,
            baseline:          false,
            post_proc:         false,
            shared_emb:        false,
            tpe:               Tpe::None,
            eval_formulas:     false,
            eval_text:         false,
            num_classes:       5,
            ddp:               false,
            rank:              0,
            world_size:        1,
            max_formula_depth: 32,
            max_formula_width: 64,
            emb_size:          768,
            formula_marker:    FORMULA_IDENTIFIER.to_string(),
            min_symbol_count:  1,
            num_workers:       1,
            seed:              221,
        }
    }
}

impl TrainOptions {
    /// Stride used by sliding-window evaluation
    pub fn effective_stride(&self) -> usize {
        self.stride.unwrap_or(self.max_seq_len)
    }

    /// Width of one tree-position encoding vector; 0 when disabled.
    pub fn pos_encoding_width(&self) -> usize {
        match self.tpe {
            Tpe::None => 0,
            Tpe::Forte => self.max_formula_depth * self.max_formula_width,
            Tpe::SinPart | Tpe::SinAdd => self.emb_size,
        }
    }

    /// Reject option combinations the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_seq_len == 0 {
            bail!("max_seq_len must be greater than zero");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be greater than zero");
        }
        if self.max_formula_depth == 0 || self.max_formula_width == 0 {
            bail!("max_formula_depth and max_formula_width must be greater than zero");
        }
        if self.formula_marker.is_empty() {
            bail!("formula_marker must not be empty");
        }
        if self.num_classes == 0 {
            bail!("num_classes must be greater than zero");
        }
        if let Some(stride) = self.stride {
            if stride == 0 || stride > self.max_seq_len {
                bail!("stride ({stride}) must be in 1..={}", self.max_seq_len);
            }
        }
        if self.world_size == 0 || self.rank >= self.world_size {
            bail!("rank ({}) must be below world_size ({})", self.rank, self.world_size);
        }
        if self.eval_formulas && self.eval_text {
            bail!("eval_formulas and eval_text are mutually exclusive");
        }
        if self.tpe == Tpe::SinPart {
            let part = self.emb_size / self.max_formula_depth;
            if self.emb_size % self.max_formula_depth != 0 || part % 2 != 0 {
                bail!(
                    "sin_part needs emb_size ({}) split into even parts per level ({} levels)",
                    self.emb_size,
                    self.max_formula_depth
                );
            }
        }
        if matches!(self.tpe, Tpe::SinAdd) && self.emb_size % 2 != 0 {
            bail!("sin_add needs an even emb_size");
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TrainOptions::default().validate().is_ok());
    }

    #[test]
    fn test_stride_longer_than_window_is_rejected() {
        let opts = TrainOptions { stride: Some(2048), ..TrainOptions::default() };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_sin_part_needs_divisible_embedding() {
        let opts = TrainOptions {
            tpe: Tpe::SinPart,
            emb_size: 100,
            max_formula_depth: 8,
            ..TrainOptions::default()
        };
        assert!(opts.validate().is_err());

        let opts = TrainOptions { emb_size: 128, ..opts };
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let opts: TrainOptions = serde_json::from_str(r#"{"max_seq_len": 64, "tpe": "sin_add"}"#).unwrap();
        assert_eq!(opts.max_seq_len, 64);
        assert_eq!(opts.tpe, Tpe::SinAdd);
        assert_eq!(opts.num_classes, 5);
    }

    #[test]
    fn test_task_names_parse() {
        assert_eq!("answer_scoring".parse::<DownstreamTask>(), Ok(DownstreamTask::AnswerScoring));
        assert!("summaries".parse::<DownstreamTask>().is_err());
        assert!(DownstreamTask::AnswerScoring.is_classification());
        assert!(!DownstreamTask::Feedback.is_classification());
    }
}
