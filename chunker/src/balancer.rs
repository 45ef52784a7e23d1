use std::sync::Arc;

use itertools::Itertools;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use textflow_models::{Chunk, ChunkOptions, ChunkStats, PreprocessError};

use crate::language::{self, LanguageProfile};
use crate::strategies::finalize_indices;

/// Reshapes a chunk list toward the configured size window.
///
/// Phase 1 merges runs of adjacent undersized chunks, phase 2 splits
/// oversized chunks along paragraph and sentence boundaries, phase 3
/// reindexes. Balancing an already balanced list is a no-op apart from
/// reindexing, so the operation is idempotent.
pub struct ChunkBalancer {
    profile: Arc<dyn LanguageProfile>,
}

impl ChunkBalancer {
    pub fn new(profile: Arc<dyn LanguageProfile>) -> Self {
        Self { profile }
    }

    /// Balancer whose token arithmetic matches the options' language.
    pub fn for_options(options: &ChunkOptions) -> Self {
        let profile = match &options.language {
            Some(code) => language::registry().get(code),
            None => language::registry().get("en"),
        };
        Self::new(profile)
    }

    pub async fn balance(
        &self,
        chunks: Vec<Chunk>,
        options: &ChunkOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, PreprocessError> {
        if chunks.is_empty() {
            return Ok(chunks);
        }

        let merged = self.merge_undersized(chunks, options, cancel)?;
        if cancel.is_cancelled() {
            return Err(PreprocessError::Cancelled);
        }
        let mut split = self.split_oversized(merged, options, cancel)?;

        finalize_indices(&mut split);
        Ok(split)
    }

    /// Phase 1: accumulate adjacent undersized chunks into a buffer and fold
    /// the buffer into a neighbor when one fits.
    fn merge_undersized(
        &self,
        chunks: Vec<Chunk>,
        options: &ChunkOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, PreprocessError> {
        let mut result: Vec<Chunk> = Vec::with_capacity(chunks.len());
        let mut buffer: Vec<Chunk> = Vec::new();

        for chunk in chunks {
            if cancel.is_cancelled() {
                return Err(PreprocessError::Cancelled);
            }
            let tokens = self.tokens(&chunk);
            if tokens < options.min_size {
                buffer.push(chunk);
                continue;
            }
            if buffer.is_empty() {
                result.push(chunk);
                continue;
            }

            let buffer_tokens: usize = buffer.iter().map(|c| self.tokens(c)).sum();
            if buffer_tokens + tokens <= options.max_size {
                buffer.push(chunk);
                let merged = self.merge_chunks(std::mem::take(&mut buffer));
                result.push(merged);
            } else if buffer_tokens >= options.min_size {
                let merged = self.merge_chunks(std::mem::take(&mut buffer));
                result.push(merged);
                result.push(chunk);
            } else if self.fold_into_previous(&mut result, &mut buffer, options) {
                result.push(chunk);
            } else {
                // Last resort: the buffer stays undersized.
                let merged = self.merge_chunks(std::mem::take(&mut buffer));
                result.push(merged);
                result.push(chunk);
            }
        }

        if !buffer.is_empty() {
            let buffer_tokens: usize = buffer.iter().map(|c| self.tokens(c)).sum();
            let folded = buffer_tokens < options.min_size
                && self.fold_into_previous(&mut result, &mut buffer, options);
            if !folded && !buffer.is_empty() {
                let merged = self.merge_chunks(std::mem::take(&mut buffer));
                result.push(merged);
            }
        }

        Ok(result)
    }

    /// Try to fold the whole buffer into the previous emitted chunk.
    fn fold_into_previous(
        &self,
        result: &mut Vec<Chunk>,
        buffer: &mut Vec<Chunk>,
        options: &ChunkOptions,
    ) -> bool {
        let Some(prev) = result.last() else {
            return false;
        };
        let prev_tokens = self.tokens(prev);
        let buffer_tokens: usize = buffer.iter().map(|c| self.tokens(c)).sum();
        if prev_tokens + buffer_tokens > options.max_size {
            return false;
        }
        let mut parts = vec![result.pop().expect("checked above")];
        parts.append(buffer);
        result.push(self.merge_chunks(parts));
        true
    }

    /// Phase 2: break every chunk above `max_size` along linguistic
    /// boundaries, with a token-proportional fallback.
    fn split_oversized(
        &self,
        chunks: Vec<Chunk>,
        options: &ChunkOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, PreprocessError> {
        let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if self.tokens(&chunk) <= options.max_size {
                out.push(chunk);
                continue;
            }
            if cancel.is_cancelled() {
                return Err(PreprocessError::Cancelled);
            }
            let pieces = self.split_chunk(&chunk, options);
            debug!(pieces = pieces.len(), "split oversized chunk");
            out.extend(pieces);
        }
        Ok(out)
    }

    fn split_chunk(&self, chunk: &Chunk, options: &ChunkOptions) -> Vec<Chunk> {
        let content = chunk.content.as_str();

        let mut candidates: Vec<usize> = Vec::new();
        if options.preserve_paragraphs {
            candidates.extend(self.profile.find_paragraph_boundaries(content));
        }
        if candidates.len() < 2 && options.preserve_sentences {
            candidates.extend(self.profile.find_sentence_boundaries(content));
        }
        let candidates: Vec<usize> = candidates
            .into_iter()
            .filter(|&c| c > 0 && c <= content.len())
            .sorted()
            .dedup()
            .collect();

        let spans = if candidates.len() < 2 {
            self.proportional_spans(content, options)
        } else {
            self.greedy_spans(content, &candidates, options)
        };

        let mut pieces: Vec<Chunk> = Vec::with_capacity(spans.len());
        for (start, end) in spans {
            let piece_text = content[start..end].trim();
            if piece_text.is_empty() {
                continue;
            }
            // Anything still oversized falls back to proportional windows.
            if self.profile.estimate_token_count(piece_text) > options.max_size {
                for (sub_start, sub_end) in self.proportional_spans(piece_text, options) {
                    let sub = piece_text[sub_start..sub_end].trim();
                    if !sub.is_empty() {
                        pieces.push(self.derive_piece(chunk, sub, start + sub_start, start + sub_end));
                    }
                }
            } else {
                pieces.push(self.derive_piece(chunk, piece_text, start, end));
            }
        }

        if let Some(last) = pieces.last_mut() {
            last.metadata.ends_at_sentence_boundary = chunk.metadata.ends_at_sentence_boundary;
        }
        if let Some(first) = pieces.first_mut() {
            first.metadata.starts_at_sentence_boundary = chunk.metadata.starts_at_sentence_boundary;
            first.metadata.overlap_from_previous = chunk.metadata.overlap_from_previous.clone();
        }
        pieces
    }

    /// Select split points by greedy token accumulation up to `target_size`.
    fn greedy_spans(
        &self,
        content: &str,
        candidates: &[usize],
        options: &ChunkOptions,
    ) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut seg_start = 0usize;
        let mut prev_candidate = 0usize;

        for &candidate in candidates {
            if candidate <= seg_start {
                continue;
            }
            let tokens = self.profile.estimate_token_count(&content[seg_start..candidate]);
            if tokens > options.target_size && prev_candidate > seg_start {
                spans.push((seg_start, prev_candidate));
                seg_start = prev_candidate;
            }
            prev_candidate = candidate;
        }
        if seg_start < content.len() {
            spans.push((seg_start, content.len()));
        }
        spans
    }

    /// Equal character windows sized from this chunk's own chars-per-token.
    fn proportional_spans(&self, content: &str, options: &ChunkOptions) -> Vec<(usize, usize)> {
        let total_tokens = self.profile.estimate_token_count(content).max(1);
        let chars_per_token = (content.len() as f32 / total_tokens as f32).max(1.0);
        let window = ((options.target_size as f32 * chars_per_token).ceil() as usize).max(1);

        let mut spans = Vec::new();
        let mut start = 0usize;
        while start < content.len() {
            let mut end = (start + window).min(content.len());
            while end < content.len() && !content.is_char_boundary(end) {
                end += 1;
            }
            spans.push((start, end));
            start = end;
        }
        spans
    }

    fn derive_piece(&self, source: &Chunk, text: &str, start: usize, end: usize) -> Chunk {
        let mut piece = Chunk::new(
            text.to_string(),
            source.location.start + start,
            source.location.start + end,
        );
        piece.location.section_path = source.location.section_path.clone();
        piece.metadata.language = source.metadata.language.clone();
        piece.metadata.strategy = source.metadata.strategy;
        piece.metadata.quality_score = source.metadata.quality_score;
        piece.metadata.custom = source.metadata.custom.clone();
        piece.metadata.estimated_tokens = self.profile.estimate_token_count(text);
        piece.metadata.ends_at_sentence_boundary = text
            .chars()
            .last()
            .map(|ch| self.profile.sentence_terminators().contains(&ch))
            .unwrap_or(false);
        piece
    }

    /// Merge buffered chunks into one; metadata inherits from the
    /// constituents (section path from the first, end boundary from the
    /// last). A single-element buffer passes through untouched.
    fn merge_chunks(&self, mut parts: Vec<Chunk>) -> Chunk {
        if parts.len() == 1 {
            return parts.pop().expect("non-empty");
        }
        let first = parts.first().expect("non-empty");
        let last = parts.last().expect("non-empty");

        let content = parts
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut merged = Chunk::new(content, first.location.start, last.location.end);
        merged.location.start_line = first.location.start_line;
        merged.location.end_line = last.location.end_line;
        merged.location.section_path = first.location.section_path.clone();
        merged.metadata.language = first.metadata.language.clone();
        merged.metadata.strategy = first.metadata.strategy;
        merged.metadata.overlap_from_previous = first.metadata.overlap_from_previous.clone();
        merged.metadata.starts_at_sentence_boundary = first.metadata.starts_at_sentence_boundary;
        merged.metadata.ends_at_sentence_boundary = last.metadata.ends_at_sentence_boundary;
        merged.metadata.contains_section_header =
            parts.iter().any(|c| c.metadata.contains_section_header);
        merged.metadata.quality_score = first.metadata.quality_score;
        merged.metadata.custom = first.metadata.custom.clone();
        merged.metadata.estimated_tokens = self.profile.estimate_token_count(&merged.content);
        merged
    }

    fn tokens(&self, chunk: &Chunk) -> usize {
        if chunk.metadata.estimated_tokens > 0 {
            chunk.metadata.estimated_tokens
        } else {
            self.profile.estimate_token_count(&chunk.content)
        }
    }

    /// Size statistics over a chunk list; all zero for empty input.
    pub fn calc_stats(chunks: &[Chunk], options: Option<&ChunkOptions>) -> ChunkStats {
        if chunks.is_empty() {
            return ChunkStats::default();
        }
        let defaults = ChunkOptions::default();
        let options = options.unwrap_or(&defaults);

        let tokens: Vec<usize> = chunks.iter().map(|c| c.metadata.estimated_tokens).collect();
        let min_tokens = *tokens.iter().min().expect("non-empty");
        let max_tokens = *tokens.iter().max().expect("non-empty");
        let avg = tokens.iter().sum::<usize>() as f64 / tokens.len() as f64;
        let variance = tokens
            .iter()
            .map(|&t| (t as f64 - avg).powi(2))
            .sum::<f64>()
            / tokens.len() as f64;
        let stddev = variance.sqrt();
        let variance_ratio = if min_tokens > 0 {
            max_tokens as f64 / min_tokens as f64
        } else {
            0.0
        };
        let undersized_count = tokens.iter().filter(|&&t| t < options.min_size).count();
        let oversized_count = tokens.iter().filter(|&&t| t > options.max_size).count();

        ChunkStats {
            count: chunks.len(),
            min_tokens,
            max_tokens,
            avg_tokens: avg,
            stddev,
            variance_ratio,
            undersized_count,
            oversized_count,
            is_balanced: variance_ratio <= 5.0 && undersized_count == 0 && oversized_count == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textflow_models::ChunkStrategy;

    fn balancer() -> ChunkBalancer {
        ChunkBalancer::new(language::registry().get("en"))
    }

    /// A chunk whose en-profile estimate is close to `tokens`.
    fn chunk_with_tokens(tokens: usize, offset: usize) -> Chunk {
        let word = "word ".repeat(tokens * 4 / 5);
        let content = word.trim_end().to_string();
        let mut chunk = Chunk::new(content, offset, offset + tokens * 4);
        chunk.metadata.estimated_tokens = tokens;
        chunk.metadata.strategy = ChunkStrategy::Sentence;
        chunk
    }

    fn options(min: usize, max: usize, target: usize) -> ChunkOptions {
        ChunkOptions {
            min_size: min,
            max_size: max,
            target_size: target,
            overlap_size: 0,
            language: Some("en".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn undersized_chunks_merge() {
        let chunks: Vec<Chunk> = (0..4).map(|i| chunk_with_tokens(10, i * 40)).collect();
        let opts = options(100, 500, 300);
        let balanced = balancer()
            .balance(chunks, &opts, &CancellationToken::new())
            .await
            .unwrap();
        assert!(balanced.len() <= 2);
        for (i, chunk) in balanced.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total_count, balanced.len());
            assert!(chunk.metadata.estimated_tokens <= 500);
        }
    }

    #[tokio::test]
    async fn balanced_lists_pass_through() {
        let chunks: Vec<Chunk> = (0..3).map(|i| chunk_with_tokens(200, i * 800)).collect();
        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let opts = options(100, 500, 300);
        let balanced = balancer()
            .balance(chunks, &opts, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(balanced.len(), 3);
        let out_ids: Vec<String> = balanced.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, out_ids);
    }

    #[tokio::test]
    async fn oversized_chunks_split_on_sentences() {
        let sentences = "This sentence fills the oversized chunk with text. ".repeat(30);
        let mut chunk = Chunk::new(sentences.trim_end().to_string(), 0, sentences.len());
        chunk.metadata.estimated_tokens = 0; // force recompute
        let opts = options(10, 100, 80);
        let balanced = balancer()
            .balance(vec![chunk], &opts, &CancellationToken::new())
            .await
            .unwrap();
        assert!(balanced.len() > 1);
        for chunk in &balanced {
            assert!(chunk.metadata.estimated_tokens <= 100);
        }
    }

    #[tokio::test]
    async fn balance_is_idempotent() {
        let mut chunks: Vec<Chunk> = (0..4).map(|i| chunk_with_tokens(10, i * 40)).collect();
        chunks.push(chunk_with_tokens(200, 2000));
        let opts = options(50, 400, 250);
        let b = balancer();
        let once = b
            .balance(chunks, &opts, &CancellationToken::new())
            .await
            .unwrap();
        let twice = b
            .balance(once.clone(), &opts, &CancellationToken::new())
            .await
            .unwrap();
        let snapshot =
            |cs: &[Chunk]| cs.iter().map(|c| (c.content.clone(), c.index)).collect::<Vec<_>>();
        assert_eq!(snapshot(&once), snapshot(&twice));
    }

    #[tokio::test]
    async fn no_split_point_fallback_still_splits() {
        // One giant "sentence" with no terminators and no paragraph breaks.
        let content = "x".repeat(4000);
        let mut chunk = Chunk::new(content, 0, 4000);
        chunk.metadata.estimated_tokens = 0;
        let opts = options(10, 200, 150);
        let balanced = balancer()
            .balance(vec![chunk], &opts, &CancellationToken::new())
            .await
            .unwrap();
        assert!(balanced.len() > 1);
        for chunk in &balanced {
            assert!(chunk.metadata.estimated_tokens <= 200);
        }
    }

    #[tokio::test]
    async fn cancellation_stops_balancing() {
        let chunks: Vec<Chunk> = (0..4).map(|i| chunk_with_tokens(10, i * 40)).collect();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = balancer()
            .balance(chunks, &options(100, 500, 300), &cancel)
            .await;
        assert!(matches!(result, Err(PreprocessError::Cancelled)));
    }

    #[test]
    fn stats_on_empty_input_are_zero() {
        let stats = ChunkBalancer::calc_stats(&[], None);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.max_tokens, 0);
        assert!(!stats.is_balanced);
    }

    #[test]
    fn stats_report_balance() {
        let chunks: Vec<Chunk> = (0..3).map(|i| chunk_with_tokens(200, i * 800)).collect();
        let opts = options(100, 500, 300);
        let stats = ChunkBalancer::calc_stats(&chunks, Some(&opts));
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_tokens, 200);
        assert_eq!(stats.max_tokens, 200);
        assert!((stats.variance_ratio - 1.0).abs() < 1e-9);
        assert_eq!(stats.undersized_count, 0);
        assert_eq!(stats.oversized_count, 0);
        assert!(stats.is_balanced);
    }

    #[test]
    fn stats_flag_outliers() {
        let chunks = vec![
            chunk_with_tokens(10, 0),
            chunk_with_tokens(200, 100),
            chunk_with_tokens(600, 1000),
        ];
        let opts = options(100, 500, 300);
        let stats = ChunkBalancer::calc_stats(&chunks, Some(&opts));
        assert_eq!(stats.undersized_count, 1);
        assert_eq!(stats.oversized_count, 1);
        assert!(!stats.is_balanced);
    }
}
