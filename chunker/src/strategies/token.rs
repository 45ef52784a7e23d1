use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use textflow_models::{Chunk, ChunkOptions, ChunkStrategy, PreprocessError};

use super::{check_cancelled, resolve_profile, ChunkAssembler, Chunker};

/// Fixed-size windows approximated from the profile's chars-per-token ratio.
///
/// The window end snaps to the nearest sentence boundary (or whitespace when
/// `preserve_sentences` is off) within a quarter-window search range; if
/// nothing is found the raw offset is used so progress is always made.
pub struct TokenChunker;

#[async_trait]
impl Chunker for TokenChunker {
    fn strategy_name(&self) -> &'static str {
        "token"
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
            ChunkAssembler::new(text, Arc::clone(&profile), options, ChunkStrategy::Token);

        let target_chars =
            ((options.target_size as f32 * profile.chars_per_token()).ceil() as usize).max(1);
        let search_window = (target_chars / 4).max(1);

        let mut segments: Vec<(usize, usize)> = Vec::new();
        let mut start = 0usize;

        while start < text.len() {
            check_cancelled(cancel)?;

            let raw_end = start.saturating_add(target_chars);
            if raw_end >= text.len() {
                segments.push((start, text.len()));
                break;
            }

            let snapped = if options.preserve_sentences {
                nearest_in(assembler.boundaries(), raw_end, search_window, start)
            } else {
                nearest_whitespace(text, raw_end, search_window, start)
            };

            let end = match snapped {
                Some(end) if end > start => end,
                // No boundary nearby: take the raw offset so progress is made.
                _ => {
                    let raw = prev_char_boundary(text, raw_end);
                    if raw > start {
                        raw
                    } else {
                        next_char_boundary(text, start + 1)
                    }
                }
            };

            segments.push((start, end));
            start = end;
        }

        Ok(assembler.assemble(&segments))
    }
}

/// The boundary closest to `target` within `window`, strictly after `min`.
fn nearest_in(boundaries: &[usize], target: usize, window: usize, min: usize) -> Option<usize> {
    let lo = target.saturating_sub(window);
    let hi = target + window;
    boundaries
        .iter()
        .copied()
        .filter(|&b| b > min && b >= lo && b <= hi)
        .min_by_key(|&b| b.abs_diff(target))
}

/// The whitespace offset closest to `target` within `window`, strictly after
/// `min`.
fn nearest_whitespace(text: &str, target: usize, window: usize, min: usize) -> Option<usize> {
    let lo = floor_char_boundary(text, target.saturating_sub(window));
    let hi = floor_char_boundary(text, (target + window).min(text.len()));
    text[lo..hi]
        .char_indices()
        .filter(|(_, ch)| ch.is_whitespace())
        .map(|(idx, _)| lo + idx)
        .filter(|&pos| pos > min)
        .min_by_key(|&pos| pos.abs_diff(target))
}

fn prev_char_boundary(text: &str, mut offset: usize) -> usize {
    offset = offset.min(text.len());
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn next_char_boundary(text: &str, mut offset: usize) -> usize {
    while offset < text.len() && !text.is_char_boundary(offset) {
        offset += 1;
    }
    offset.min(text.len())
}

fn floor_char_boundary(text: &str, offset: usize) -> usize {
    prev_char_boundary(text, offset)
}
