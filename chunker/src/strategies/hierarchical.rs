use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use textflow_models::chunk::{
    KEY_CHILD_IDS, KEY_HIERARCHY_LEVEL, KEY_PARENT_ID, KEY_SECTION_TITLE,
};
use textflow_models::{Chunk, ChunkOptions, ChunkStrategy, PreprocessError};

use super::sentence::accumulate_sentences;
use super::{check_cancelled, finalize_indices, resolve_profile, ChunkAssembler, Chunker};

lazy_static! {
    static ref HEADER_LINE: Regex = Regex::new(r"^(#{1,6})[ \t]+(.+)$").unwrap();
}

/// Markdown-header sections with parent/child links.
///
/// Each section becomes one chunk (or several when it exceeds `max_size`);
/// the first chunk of a section is the attachment point for its children.
/// The parent relation forms a forest carried in the chunk custom metadata
/// under `HierarchyLevel`, `ParentId`, `ChildIds`, and `SectionTitle`.
pub struct HierarchicalChunker;

struct Section {
    level: usize,
    title: String,
    header_start: usize,
    body_start: usize,
    end: usize,
}

#[async_trait]
impl Chunker for HierarchicalChunker {
    fn strategy_name(&self) -> &'static str {
        "hierarchical"
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
        let assembler = ChunkAssembler::new(
            text,
            Arc::clone(&profile),
            options,
            ChunkStrategy::Hierarchical,
        );

        let sections = parse_sections(text);
        debug!(sections = sections.len(), "parsed hierarchical sections");

        let mut chunks: Vec<Chunk> = Vec::new();
        // Open parents: (level, first chunk id, section path).
        let mut stack: Vec<(usize, String, String)> = Vec::new();

        for section in &sections {
            check_cancelled(cancel)?;

            while let Some((level, _, _)) = stack.last() {
                if *level >= section.level {
                    stack.pop();
                } else {
                    break;
                }
            }
            let parent = stack.last().cloned();

            let path = match (&parent, section.title.is_empty()) {
                (_, true) => None,
                (Some((_, _, parent_path)), false) if !parent_path.is_empty() => {
                    Some(format!("{} > {}", parent_path, section.title))
                }
                _ => Some(section.title.clone()),
            };

            let section_chunks =
                build_section_chunks(&assembler, text, section, options, &profile, cancel)?;
            if section_chunks.is_empty() {
                continue;
            }

            let quality = (1.0 - section.level as f32 * 0.1).max(0.5);
            let first_id = section_chunks[0].id.clone();

            for mut chunk in section_chunks {
                chunk.metadata.quality_score = quality;
                chunk.location.section_path = path.clone();
                chunk
                    .metadata
                    .custom
                    .insert(KEY_HIERARCHY_LEVEL.to_string(), section.level.to_string());
                if !section.title.is_empty() {
                    chunk
                        .metadata
                        .custom
                        .insert(KEY_SECTION_TITLE.to_string(), section.title.clone());
                }
                if let Some((_, parent_id, _)) = &parent {
                    chunk
                        .metadata
                        .custom
                        .insert(KEY_PARENT_ID.to_string(), parent_id.clone());
                }
                chunks.push(chunk);
            }

            // The titleless preamble never parents real sections.
            if section.level > 0 {
                stack.push((section.level, first_id, path.clone().unwrap_or_default()));
            }
        }

        populate_child_ids(&mut chunks);
        finalize_indices(&mut chunks);
        Ok(chunks)
    }
}

/// Split the text into header-delimited sections; text before the first
/// header becomes a level-0 section with no title.
fn parse_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut offset = 0usize;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed_line = line.trim_end_matches(['\n', '\r']);

        if let Some(caps) = HEADER_LINE.captures(trimmed_line) {
            if let Some(open) = sections.last_mut() {
                open.end = line_start;
            }
            sections.push(Section {
                level: caps.get(1).unwrap().as_str().len(),
                title: caps.get(2).unwrap().as_str().trim().to_string(),
                header_start: line_start,
                body_start: offset,
                end: text.len(),
            });
        } else if sections.is_empty() && !trimmed_line.trim().is_empty() {
            sections.push(Section {
                level: 0,
                title: String::new(),
                header_start: line_start,
                body_start: line_start,
                end: text.len(),
            });
        }
    }
    sections
}

/// One chunk per section, or a sentence-accumulated split with the header
/// line kept on the first piece.
fn build_section_chunks(
    assembler: &ChunkAssembler<'_>,
    text: &str,
    section: &Section,
    options: &ChunkOptions,
    profile: &Arc<dyn crate::language::LanguageProfile>,
    cancel: &CancellationToken,
) -> Result<Vec<Chunk>, PreprocessError> {
    let span = &text[section.header_start..section.end];
    let tokens = profile.estimate_token_count(span);

    let segments: Vec<(usize, usize)> = if tokens <= options.max_size {
        vec![(section.header_start, section.end)]
    } else {
        let body = &text[section.body_start..section.end];
        let local = profile.find_sentence_boundaries(body);
        let shifted: Vec<usize> = local.iter().map(|b| section.body_start + b).collect();
        let mut segments =
            accumulate_sentences(text, section.body_start, &shifted, profile, options, cancel)?;
        // The header line rides on the first piece.
        if let Some(first) = segments.first_mut() {
            first.0 = section.header_start;
        }
        segments
    };

    let mut chunks = Vec::with_capacity(segments.len());
    let mut prev_span: Option<(usize, usize)> = None;
    for &(start, end) in &segments {
        if let Some(chunk) = assembler.build_chunk(start, end, prev_span) {
            prev_span = Some((chunk.location.start, chunk.location.end));
            chunks.push(chunk);
        }
    }
    Ok(chunks)
}

/// Second pass: every chunk's id is appended to its parent's `ChildIds`.
fn populate_child_ids(chunks: &mut [Chunk]) {
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    for chunk in chunks.iter() {
        if let Some(parent_id) = chunk.metadata.custom.get(KEY_PARENT_ID) {
            children
                .entry(parent_id.clone())
                .or_default()
                .push(chunk.id.clone());
        }
    }
    for chunk in chunks.iter_mut() {
        if let Some(ids) = children.get(&chunk.id) {
            chunk
                .metadata
                .custom
                .insert(KEY_CHILD_IDS.to_string(), ids.join(","));
        }
    }
}
