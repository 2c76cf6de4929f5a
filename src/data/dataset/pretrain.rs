// ============================================================
// Layer 4 — Pretraining Dataset
// ============================================================
// article text + <|endoftext|> → one sequence per article, split
// into chunks of at most max_seq_len when a length limit is given. The
// whole sequence is both input and target, so no metadata.

use anyhow::Result;

use crate::data::dataset::{progress_bar, BuildStats, SequenceDataset};
use crate::data::sequence_tokenizer::SequenceTokenizer;
use crate::data::splitter::split_sequence_with_stats;
use crate::domain::sample::NamedArticle;
use crate::domain::token::EOS_TOKEN;

pub fn build_pretrain_dataset(
    articles: &[NamedArticle],
    tokenizer: &SequenceTokenizer,
    max_seq_len: Option<usize>,
) -> Result<SequenceDataset> {
    let mut stats = BuildStats::default();
    let mut sequences = Vec::with_capacity(articles.len());
    let pb = progress_bar(articles.len(), "pretrain");

    for named in articles {
        let text = format!("{}{EOS_TOKEN}", named.article.text);
        let (sequence, missing) = tokenizer.tokenize_sequence(&named.name, &text, &named.article.formulas)?;
        stats.missing_formulas += missing;

        match max_seq_len {
            Some(max_len) => {
                let outcome = split_sequence_with_stats(&sequence, max_len);
                if outcome.chunks.len() > 1 || outcome.dropped_formulas > 0 {
                    stats.trimmed_sequences += 1;
                }
                stats.dropped_formulas += outcome.dropped_formulas;
                tracing::debug!("{}: {} tokens → {} chunks", named.name, sequence.len(), outcome.chunks.len());
                sequences.extend(outcome.chunks);
            }
            None => sequences.push(sequence),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    stats.log("pretrain", sequences.len());
    Ok(SequenceDataset::new(sequences, stats))
}
