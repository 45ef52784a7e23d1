use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PreprocessError;

/// Custom metadata key carrying the 1-based depth of a hierarchical chunk.
pub const KEY_HIERARCHY_LEVEL: &str = "HierarchyLevel";
/// Custom metadata key referencing the id of the parent chunk.
pub const KEY_PARENT_ID: &str = "ParentId";
/// Custom metadata key holding the comma-joined ids of child chunks.
pub const KEY_CHILD_IDS: &str = "ChildIds";
/// Custom metadata key holding the section heading text.
pub const KEY_SECTION_TITLE: &str = "SectionTitle";

/// Available chunking strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Resolves to Sentence unless a richer policy is configured
    Auto,
    /// Sentence-boundary accumulation
    Sentence,
    /// Paragraph-boundary accumulation with sentence fallback
    Paragraph,
    /// Fixed token windows with boundary snapping
    Token,
    /// Markdown-header sections with parent/child links
    Hierarchical,
    /// Embedding-similarity breakpoints (requires an embedder)
    Semantic,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Auto => "auto",
            ChunkStrategy::Sentence => "sentence",
            ChunkStrategy::Paragraph => "paragraph",
            ChunkStrategy::Token => "token",
            ChunkStrategy::Hierarchical => "hierarchical",
            ChunkStrategy::Semantic => "semantic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(ChunkStrategy::Auto),
            "sentence" => Some(ChunkStrategy::Sentence),
            "paragraph" => Some(ChunkStrategy::Paragraph),
            "token" => Some(ChunkStrategy::Token),
            "hierarchical" => Some(ChunkStrategy::Hierarchical),
            "semantic" => Some(ChunkStrategy::Semantic),
            _ => None,
        }
    }
}

/// Position of a chunk inside the original text
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkLocation {
    /// Start character offset into the original text
    pub start: usize,
    /// End character offset (exclusive)
    pub end: usize,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_page: Option<usize>,
    /// Breadcrumb of section titles, e.g. "Intro > Setup > Linux"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_path: Option<String>,
}

impl ChunkLocation {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            ..Default::default()
        }
    }
}

/// Per-chunk metadata populated by the strategies and the balancer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// ISO 639-1 language code of the profile used
    pub language: String,
    #[serde(rename = "est_tokens")]
    pub estimated_tokens: usize,
    pub strategy: ChunkStrategy,
    #[serde(rename = "starts_at_boundary")]
    pub starts_at_sentence_boundary: bool,
    #[serde(rename = "ends_at_boundary")]
    pub ends_at_sentence_boundary: bool,
    #[serde(rename = "contains_header")]
    pub contains_section_header: bool,
    /// Trailing text of the previous chunk duplicated into this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_from_previous: Option<String>,
    #[serde(rename = "quality")]
    pub quality_score: f32,
    #[serde(rename = "density")]
    pub density_score: f32,
    /// Extensible key-value map (hierarchy links live here)
    #[serde(default)]
    pub custom: HashMap<String, String>,
}

impl Default for ChunkMetadata {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            estimated_tokens: 0,
            strategy: ChunkStrategy::Sentence,
            starts_at_sentence_boundary: false,
            ends_at_sentence_boundary: false,
            contains_section_header: false,
            overlap_from_previous: None,
            quality_score: 1.0,
            density_score: 1.0,
            custom: HashMap::new(),
        }
    }
}

/// An ordered piece of the source text, the unit of downstream embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable opaque identifier
    pub id: String,
    pub content: String,
    /// Zero-based position within the produced list
    pub index: usize,
    #[serde(rename = "total")]
    pub total_count: usize,
    pub location: ChunkLocation,
    pub metadata: ChunkMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn new(content: String, start: usize, end: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            index: 0,
            total_count: 0,
            location: ChunkLocation::new(start, end),
            metadata: ChunkMetadata::default(),
            embedding: None,
        }
    }

    /// 1-based hierarchy depth, if this chunk was produced hierarchically
    pub fn hierarchy_level(&self) -> Option<usize> {
        self.metadata
            .custom
            .get(KEY_HIERARCHY_LEVEL)
            .and_then(|v| v.parse().ok())
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.metadata.custom.get(KEY_PARENT_ID).map(|s| s.as_str())
    }

    pub fn child_ids(&self) -> Vec<String> {
        self.metadata
            .custom
            .get(KEY_CHILD_IDS)
            .map(|v| {
                v.split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn section_title(&self) -> Option<&str> {
        self.metadata
            .custom
            .get(KEY_SECTION_TITLE)
            .map(|s| s.as_str())
    }
}

/// Configuration bundle for a chunking run.
///
/// All sizes are in estimated tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkOptions {
    pub strategy: ChunkStrategy,
    pub target_size: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub overlap_size: usize,
    /// ISO 639-1 code; auto-detected from the text when absent
    pub language: Option<String>,
    pub preserve_paragraphs: bool,
    pub preserve_sentences: bool,
    pub preserve_section_headers: bool,
    /// Breakpoint threshold for the semantic strategy, in [0, 1]
    pub similarity_threshold: f32,
    pub trim_whitespace: bool,
    pub normalize_whitespace: bool,
    pub include_metadata: bool,
    pub enable_chunk_balancing: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Auto,
            target_size: 512,
            min_size: 100,
            max_size: 1024,
            overlap_size: 50,
            language: None,
            preserve_paragraphs: true,
            preserve_sentences: true,
            preserve_section_headers: true,
            similarity_threshold: 0.75,
            trim_whitespace: true,
            normalize_whitespace: false,
            include_metadata: true,
            enable_chunk_balancing: true,
        }
    }
}

impl ChunkOptions {
    /// Balanced settings for retrieval-augmented generation
    pub fn for_rag() -> Self {
        Self {
            strategy: ChunkStrategy::Sentence,
            target_size: 512,
            min_size: 128,
            max_size: 1024,
            overlap_size: 64,
            ..Default::default()
        }
    }

    /// Korean text: denser script, smaller windows
    pub fn for_korean() -> Self {
        Self {
            strategy: ChunkStrategy::Sentence,
            language: Some("ko".to_string()),
            target_size: 384,
            min_size: 80,
            max_size: 768,
            overlap_size: 48,
            ..Default::default()
        }
    }

    /// Large documents: hierarchical sections, bigger windows
    pub fn for_large_document() -> Self {
        Self {
            strategy: ChunkStrategy::Hierarchical,
            target_size: 768,
            min_size: 150,
            max_size: 1536,
            overlap_size: 75,
            ..Default::default()
        }
    }

    /// Fixed token windows with an explicit overlap
    pub fn fixed_size(size: usize, overlap: usize) -> Self {
        Self {
            strategy: ChunkStrategy::Token,
            target_size: size,
            min_size: size / 4,
            max_size: size * 2,
            overlap_size: overlap,
            enable_chunk_balancing: false,
            ..Default::default()
        }
    }

    /// Check option consistency before a chunking run
    pub fn validate(&self) -> Result<(), PreprocessError> {
        if self.target_size == 0 || self.max_size == 0 {
            return Err(PreprocessError::InvalidOption(
                "target_size and max_size must be greater than zero".to_string(),
            ));
        }
        if self.target_size > self.max_size {
            return Err(PreprocessError::InvalidOption(format!(
                "target_size ({}) exceeds max_size ({})",
                self.target_size, self.max_size
            )));
        }
        if self.overlap_size >= self.target_size {
            return Err(PreprocessError::InvalidOption(format!(
                "overlap_size ({}) must be smaller than target_size ({})",
                self.overlap_size, self.target_size
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(PreprocessError::InvalidOption(format!(
                "similarity_threshold ({}) must be within [0, 1]",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// Size distribution of a chunk list, as reported by the balancer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkStats {
    pub count: usize,
    pub min_tokens: usize,
    pub max_tokens: usize,
    pub avg_tokens: f64,
    pub stddev: f64,
    /// max_tokens / min_tokens
    pub variance_ratio: f64,
    pub undersized_count: usize,
    pub oversized_count: usize,
    pub is_balanced: bool,
}
