// ============================================================
// Layer 3 — Raw Sample Types
// ============================================================
// JSON shapes produced by the extraction pass and by the
// downstream-task exports. Every textual field is a TaggedText:
// text with formula placeholders plus the formulas keyed by the
// stringified placeholder index.
//
//   article:         { text, formulas }
//   headline sample: { prompt: TaggedText, label: TaggedText }
//   answer scoring:  { answer, problem_id, problem_log_id, grade }
//   feedback:        { problem_id, answer, feedback }
//   solving:         { problem, steps, answer }

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::formula::Formula;

/// Text containing formula placeholders, plus the formulas they refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaggedText {
    pub text: String,
    #[serde(default)]
    pub formulas: HashMap<String, Formula>,
}

impl TaggedText {
    /// Plain text without formulas
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), formulas: HashMap::new() }
    }
}

/// A Wikipedia article (and, for the task datasets, a problem statement).
pub type Article = TaggedText;

/// An article together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArticle {
    pub name: String,
    pub article: Article,
}

/// Prompt/label pair for the generative (headline) task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenTaskSample {
    pub prompt: TaggedText,
    pub label: TaggedText,
}

/// A student answer with its instructor-assigned grade (0..num_classes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerScoringSample {
    pub answer: TaggedText,
    pub problem_id: i64,
    pub problem_log_id: i64,
    pub grade: usize,
}

/// A student answer and the feedback it received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackTaskSample {
    pub problem_id: String,
    pub answer: TaggedText,
    pub feedback: TaggedText,
}

/// A problem with its worked steps and final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolvingTaskSample {
    pub problem: TaggedText,
    pub steps: TaggedText,
    pub answer: TaggedText,
}
