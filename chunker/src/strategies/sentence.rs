use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use textflow_models::{Chunk, ChunkOptions, ChunkStrategy, PreprocessError};

use super::{check_cancelled, resolve_profile, ChunkAssembler, Chunker};
use crate::language::LanguageProfile;

/// Default strategy: accumulate sentences until the next one would push the
/// buffer past `max_size`, then flush. A local merge pass afterwards fuses
/// undersized neighbors whenever the merged size still fits.
pub struct SentenceChunker;

#[async_trait]
impl Chunker for SentenceChunker {
    fn strategy_name(&self) -> &'static str {
        "sentence"
    }

    async fn chunk(
        &self,
        text: &str,
        options: &ChunkOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, PreprocessError> {
        options.validate()?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let profile = resolve_profile(text, options);
        let assembler =
            ChunkAssembler::new(text, Arc::clone(&profile), options, ChunkStrategy::Sentence);

        let segments =
            accumulate_sentences(text, 0, assembler.boundaries(), &profile, options, cancel)?;
        let segments = merge_small_segments(text, segments, &profile, options);
        debug!(segments = segments.len(), "sentence chunking complete");

        Ok(assembler.assemble(&segments))
    }
}

/// Group sentence spans into segments not exceeding `max_size` tokens.
///
/// `start` is where accumulation begins; `boundaries` are absolute offsets
/// and the last one marks the end of the region.
pub(crate) fn accumulate_sentences(
    text: &str,
    start: usize,
    boundaries: &[usize],
    profile: &Arc<dyn LanguageProfile>,
    options: &ChunkOptions,
    cancel: &CancellationToken,
) -> Result<Vec<(usize, usize)>, PreprocessError> {
    let region_end = boundaries.last().copied().unwrap_or(text.len());
    let mut segments = Vec::new();
    let mut segment_start = start;
    let mut segment_tokens = 0usize;
    let mut sentence_start = start;

    for &boundary in boundaries {
        check_cancelled(cancel)?;
        let sentence = &text[sentence_start..boundary];
        let tokens = profile.estimate_token_count(sentence);

        if segment_tokens > 0 && segment_tokens + tokens > options.max_size {
            segments.push((segment_start, sentence_start));
            segment_start = sentence_start;
            segment_tokens = 0;
        }
        segment_tokens += tokens;
        sentence_start = boundary;
    }

    if segment_tokens > 0 || segment_start < region_end {
        segments.push((segment_start, region_end));
    }
    Ok(segments)
}

/// Fuse undersized neighbors while the merged segment stays within
/// `max_size`.
pub(crate) fn merge_small_segments(
    text: &str,
    segments: Vec<(usize, usize)>,
    profile: &Arc<dyn LanguageProfile>,
    options: &ChunkOptions,
) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(segments.len());
    for segment in segments {
        if let Some(last) = merged.last_mut() {
            let last_tokens = profile.estimate_token_count(&text[last.0..last.1]);
            let seg_tokens = profile.estimate_token_count(&text[segment.0..segment.1]);
            let either_undersized = last_tokens < options.min_size || seg_tokens < options.min_size;
            if either_undersized && last_tokens + seg_tokens <= options.max_size {
                last.1 = segment.1;
                continue;
            }
        }
        merged.push(segment);
    }
    merged
}
