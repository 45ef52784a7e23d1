use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use textflow_models::{Chunk, ChunkOptions, ChunkStrategy, PreprocessError};

use super::sentence::accumulate_sentences;
use super::{check_cancelled, resolve_profile, ChunkAssembler, Chunker};

/// Accumulates whole paragraphs; a paragraph that alone exceeds `max_size`
/// is split again along its sentence boundaries.
pub struct ParagraphChunker;

#[async_trait]
impl Chunker for ParagraphChunker {
    fn strategy_name(&self) -> &'static str {
        "paragraph"
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
            ChunkAssembler::new(text, Arc::clone(&profile), options, ChunkStrategy::Paragraph);

        let paragraph_boundaries = profile.find_paragraph_boundaries(text);
        let mut segments: Vec<(usize, usize)> = Vec::new();
        let mut segment_start = 0usize;
        let mut segment_tokens = 0usize;
        let mut paragraph_start = 0usize;

        for &boundary in &paragraph_boundaries {
            check_cancelled(cancel)?;
            let paragraph = &text[paragraph_start..boundary];
            let tokens = profile.estimate_token_count(paragraph);

            if tokens > options.max_size {
                // Flush whatever is buffered, then break the paragraph up by
                // its sentences.
                if segment_tokens > 0 {
                    segments.push((segment_start, paragraph_start));
                }
                let local = profile.find_sentence_boundaries(paragraph);
                let shifted: Vec<usize> = local.iter().map(|b| paragraph_start + b).collect();
                let sub = accumulate_sentences(
                    text,
                    paragraph_start,
                    &shifted,
                    &profile,
                    options,
                    cancel,
                )?;
                segments.extend(sub);
                segment_start = boundary;
                segment_tokens = 0;
                paragraph_start = boundary;
                continue;
            }

            if segment_tokens > 0 && segment_tokens + tokens > options.max_size {
                segments.push((segment_start, paragraph_start));
                segment_start = paragraph_start;
                segment_tokens = 0;
            }
            segment_tokens += tokens;
            paragraph_start = boundary;
        }

        if segment_tokens > 0 {
            segments.push((segment_start, text.len()));
        }
        debug!(segments = segments.len(), "paragraph chunking complete");

        Ok(assembler.assemble(&segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(text: &str, options: &ChunkOptions) -> Vec<Chunk> {
        let chunker = ParagraphChunker;
        let cancel = CancellationToken::new();
        chunker.chunk(text, options, &cancel).await.unwrap()
    }

    fn options(max: usize) -> ChunkOptions {
        ChunkOptions {
            strategy: ChunkStrategy::Paragraph,
            max_size: max,
            min_size: 2,
            target_size: max * 3 / 4,
            overlap_size: 0,
            language: Some("en".to_string()),
            enable_chunk_balancing: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn paragraphs_stay_whole_when_they_fit() {
        let text = "First paragraph sentence one. Sentence two.\n\nSecond paragraph here.\n\nThird paragraph here.";
        let chunks = run(text, &options(100)).await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("Second paragraph"));
    }

    #[tokio::test]
    async fn paragraph_breaks_separate_chunks_under_pressure() {
        let text = "First paragraph with a decent amount of text in it for testing.\n\nSecond paragraph with a decent amount of text in it as well.";
        let chunks = run(text, &options(18)).await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.starts_with("First paragraph"));
        assert!(chunks[1].content.starts_with("Second paragraph"));
    }

    #[tokio::test]
    async fn oversized_paragraph_splits_on_sentences() {
        let text = "One long paragraph follows here. It has several sentences inside it. \
                    Each sentence adds more estimated tokens. Eventually it cannot fit one chunk. \
                    So it must split along sentence boundaries.";
        let chunks = run(text, &options(15)).await;
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.content.ends_with('.'));
        }
    }

    #[tokio::test]
    async fn empty_input_yields_no_chunks() {
        assert!(run("", &options(50)).await.is_empty());
    }
}
