// ============================================================
// Layer 4 — Sequence Splitter
// ============================================================
// Cuts an over-long sequence into chunks of at most `max_len`
// tokens without ever cutting inside a formula. A cut is only
// ever placed in front of a TEXT token:
//
//   max_len = 4
//   T T S O V E F T T        (S..F is one formula)
//           ^ boundary lands inside the formula
//   T T | S O V E F | T T    cut moved back to the last TEXT
//
// Walking left to right, greedily:
//   1. the rest fits            → emit it, done
//   2. boundary token is TEXT   → cut at the boundary
//   3. a TEXT token lies before → cut right after it, so the
//                                 formula starts the next chunk
//   4. no TEXT before           → the chunk opens with a formula
//                                 longer than max_len; skip to the
//                                 next TEXT token (dropping it) or,
//                                 if there is none, stop
//
// Step 4 drops every formula up to the next TEXT token. Formulas
// that fit are lost too when they sit directly in front of an
// oversized one with no TEXT between them:
//
//   max_len = 4
//   T [ v ] [ o v n n n e ] T   →   T | T      (both dropped)
//
// Also holds the seeded train/validation split used when
// preparing raw samples.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::sequence::Sequence;
use crate::domain::token::TokenType;

/// Chunks plus the number of formulas that had to be dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome {
    pub chunks: Vec<Sequence>,
    pub dropped_formulas: usize,
}

/// Split `sequence` into chunks no longer than `max_len`.
pub fn split_sequence(sequence: &Sequence, max_len: usize) -> Vec<Sequence> {
    split_sequence_with_stats(sequence, max_len).chunks
}

pub fn split_sequence_with_stats(sequence: &Sequence, max_len: usize) -> SplitOutcome {
    let len = sequence.len();
    if len <= max_len {
        return SplitOutcome { chunks: vec![sequence.clone()], dropped_formulas: 0 };
    }
    if max_len == 0 {
        return SplitOutcome {
            chunks: Vec::new(),
            dropped_formulas: sequence.count_formulas(0, len),
        };
    }

    let types = sequence.token_types();
    let mut chunks = Vec::new();
    let mut dropped_formulas = 0;
    let mut start = 0;

    while len - start > max_len {
        let boundary = start + max_len;

        if types[boundary] == TokenType::Text {
            chunks.push(sequence.slice(start, boundary));
            start = boundary;
            continue;
        }

        if let Some(last_text) = (start..boundary).rev().find(|&i| types[i] == TokenType::Text) {
            chunks.push(sequence.slice(start, last_text + 1));
            start = last_text + 1;
            continue;
        }

        match (boundary..len).find(|&i| types[i] == TokenType::Text) {
            Some(next_text) => {
                dropped_formulas += sequence.count_formulas(start, next_text);
                start = next_text;
            }
            None => {
                dropped_formulas += sequence.count_formulas(start, len);
                return SplitOutcome { chunks, dropped_formulas };
            }
        }
    }

    chunks.push(sequence.slice(start, len));
    SplitOutcome { chunks, dropped_formulas }
}

/// Shuffle `samples` with a seeded RNG and split into (train, validation).
///
/// `train_fraction` is clamped into [0, 1].
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let val = samples.split_off(split_at.min(total));

    tracing::debug!("Dataset split: {} training, {} validation", samples.len(), val.len());
    (samples, val)
}
