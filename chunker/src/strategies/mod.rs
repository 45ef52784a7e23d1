mod factory;
mod hierarchical;
mod paragraph;
mod semantic;
mod sentence;
mod token;

pub use factory::ChunkerFactory;
pub use hierarchical::HierarchicalChunker;
pub use paragraph::ParagraphChunker;
pub use semantic::SemanticChunker;
pub use sentence::SentenceChunker;
pub use token::TokenChunker;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use unicode_segmentation::UnicodeSegmentation;

use textflow_models::{Chunk, ChunkOptions, ChunkStrategy, PreprocessError};

use crate::language::{self, LanguageProfile};

/// A named chunking algorithm.
///
/// The async surface exists for cancellation and for the semantic strategy's
/// embedder call; the other strategies do only CPU work.
#[async_trait]
pub trait Chunker: Send + Sync {
    fn strategy_name(&self) -> &'static str;

    fn requires_embedder(&self) -> bool {
        false
    }

    /// Split `text` into chunks. Empty or whitespace-only input returns an
    /// empty list; a cancelled token yields `PreprocessError::Cancelled` with
    /// no partial output.
    async fn chunk(
        &self,
        text: &str,
        options: &ChunkOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, PreprocessError>;

    /// Cheap upper-bound estimate of how many chunks `chunk` would produce.
    fn estimate_chunk_count(&self, text: &str, options: &ChunkOptions) -> usize {
        let profile = resolve_profile(text, options);
        let tokens = profile.estimate_token_count(text);
        if tokens == 0 {
            0
        } else {
            tokens.div_ceil(options.target_size).max(1)
        }
    }
}

/// Profile selection: explicit option code wins, otherwise script detection.
pub(crate) fn resolve_profile(text: &str, options: &ChunkOptions) -> Arc<dyn LanguageProfile> {
    match &options.language {
        Some(code) => language::registry().get(code),
        None => language::registry().detect_profile(text),
    }
}

pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<(), PreprocessError> {
    if cancel.is_cancelled() {
        Err(PreprocessError::Cancelled)
    } else {
        Ok(())
    }
}

/// Shared chunk construction: trimming, token counts, boundary flags, line
/// numbers, and overlap extraction.
///
/// Strategies emit raw `(start, end)` byte segments over the original text;
/// the assembler turns them into finished chunks.
pub(crate) struct ChunkAssembler<'a> {
    text: &'a str,
    profile: Arc<dyn LanguageProfile>,
    options: &'a ChunkOptions,
    strategy: ChunkStrategy,
    boundaries: Vec<usize>,
    sentence_starts: Vec<usize>,
    line_starts: Vec<usize>,
}

impl<'a> ChunkAssembler<'a> {
    pub fn new(
        text: &'a str,
        profile: Arc<dyn LanguageProfile>,
        options: &'a ChunkOptions,
        strategy: ChunkStrategy,
    ) -> Self {
        let boundaries = profile.find_sentence_boundaries(text);
        let sentence_starts = sentence_starts(text, &boundaries);
        let line_starts = line_starts(text);
        Self {
            text,
            profile,
            options,
            strategy,
            boundaries,
            sentence_starts,
            line_starts,
        }
    }

    pub fn boundaries(&self) -> &[usize] {
        &self.boundaries
    }

    /// Build the final chunk list from ordered, non-overlapping segments.
    pub fn assemble(&self, segments: &[(usize, usize)]) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::with_capacity(segments.len());
        let mut prev_span: Option<(usize, usize)> = None;

        for &(seg_start, seg_end) in segments {
            let Some(chunk) = self.build_chunk(seg_start, seg_end, prev_span) else {
                continue;
            };
            prev_span = Some((chunk.location.start, chunk.location.end));
            chunks.push(chunk);
        }

        finalize_indices(&mut chunks);
        chunks
    }

    /// Build one chunk; `prev_span` is the (start, end) of the previous
    /// chunk's content, used for overlap extraction.
    pub fn build_chunk(
        &self,
        seg_start: usize,
        seg_end: usize,
        prev_span: Option<(usize, usize)>,
    ) -> Option<Chunk> {
        let (mut start, end) = self.trimmed_span(seg_start, seg_end)?;

        let mut overlap = None;
        if self.options.overlap_size > 0 {
            if let Some((prev_start, prev_end)) = prev_span {
                if let Some(overlap_start) = self.overlap_start(prev_start, prev_end, start) {
                    overlap = Some(self.text[overlap_start..prev_end].to_string());
                    start = overlap_start;
                }
            }
        }

        let mut content = self.text[start..end].to_string();
        if self.options.normalize_whitespace {
            content = content.split_whitespace().collect::<Vec<_>>().join(" ");
        }

        let mut chunk = Chunk::new(content, start, end);
        chunk.location.start_line = Some(self.line_of(start) + 1);
        chunk.location.end_line = Some(self.line_of(end.saturating_sub(1)) + 1);

        chunk.metadata.language = self.profile.code().to_string();
        chunk.metadata.estimated_tokens = self.profile.estimate_token_count(&chunk.content);
        chunk.metadata.strategy = self.strategy;
        chunk.metadata.overlap_from_previous = overlap;

        if self.options.include_metadata {
            chunk.metadata.starts_at_sentence_boundary =
                start == 0 || self.sentence_starts.binary_search(&start).is_ok();
            chunk.metadata.ends_at_sentence_boundary =
                self.boundaries.binary_search(&end).is_ok() || end == self.text.len();
            chunk.metadata.density_score = density(&chunk.content);
            if self.options.preserve_section_headers {
                chunk.metadata.contains_section_header =
                    !self.profile.find_section_headers(&chunk.content).is_empty();
            }
        }

        Some(chunk)
    }

    /// Where the overlap region of the next chunk begins inside the previous
    /// chunk: walk back far enough to cover the overlap token target, then
    /// align to the preceding sentence start.
    fn overlap_start(&self, prev_start: usize, prev_end: usize, next_start: usize) -> Option<usize> {
        if next_start <= prev_start || prev_end <= prev_start {
            return None;
        }
        let target_chars =
            (self.options.overlap_size as f32 * self.profile.chars_per_token()).ceil() as usize;
        let walk_from = next_start.min(prev_end);
        let raw = walk_back(self.text, walk_from, prev_start, target_chars);

        // Align to the nearest sentence start at or before the walk position.
        let aligned = match self.sentence_starts.binary_search(&raw) {
            Ok(_) => raw,
            Err(insert) => {
                let preceding = insert
                    .checked_sub(1)
                    .map(|i| self.sentence_starts[i])
                    .filter(|&s| s >= prev_start);
                match preceding {
                    Some(s) => s,
                    None => raw,
                }
            }
        };

        (aligned < prev_end).then_some(aligned)
    }

    fn trimmed_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let end = end.min(self.text.len());
        if start >= end {
            return None;
        }
        let slice = &self.text[start..end];
        if !self.options.trim_whitespace {
            return (!slice.trim().is_empty()).then_some((start, end));
        }
        let trimmed = slice.trim_start();
        let lead = slice.len() - trimmed.len();
        let trimmed = trimmed.trim_end();
        if trimmed.is_empty() {
            return None;
        }
        Some((start + lead, start + lead + trimmed.len()))
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insert) => insert.saturating_sub(1),
        }
    }
}

/// Walk backward from `from` (never past `min`) by `count` grapheme clusters.
fn walk_back(text: &str, from: usize, min: usize, count: usize) -> usize {
    if count == 0 || from <= min {
        return from;
    }
    let mut pos = from;
    for (seen, (idx, _)) in text[min..from].grapheme_indices(true).rev().enumerate() {
        pos = min + idx;
        if seen + 1 >= count {
            break;
        }
    }
    pos
}

/// Positions where sentences begin: offset 0 plus each boundary advanced past
/// whitespace.
fn sentence_starts(text: &str, boundaries: &[usize]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(boundaries.len() + 1);
    if !text.is_empty() {
        starts.push(0);
    }
    for &boundary in boundaries {
        if boundary >= text.len() {
            continue;
        }
        let after_ws = text[boundary..]
            .char_indices()
            .find(|(_, ch)| !ch.is_whitespace())
            .map(|(idx, _)| boundary + idx);
        if let Some(start) = after_ws {
            if starts.last() != Some(&start) {
                starts.push(start);
            }
        }
    }
    starts
}

fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(idx + 1);
        }
    }
    starts
}

fn density(content: &str) -> f32 {
    let total = content.chars().count();
    if total == 0 {
        return 0.0;
    }
    let non_ws = content.chars().filter(|ch| !ch.is_whitespace()).count();
    non_ws as f32 / total as f32
}

/// Set `index` and `total_count` so the list invariant holds.
pub(crate) fn finalize_indices(chunks: &mut [Chunk]) {
    let total = chunks.len();
    for (index, chunk) in chunks.iter_mut().enumerate() {
        chunk.index = index;
        chunk.total_count = total;
    }
}
