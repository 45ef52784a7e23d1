use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkOptions};
use crate::filter::{ContentFilterMatch, ContentFilterOptions};
use crate::pii::{PiiMatch, PiiMaskingOptions};
use crate::refine::RefineOptions;

/// One options bundle for a full preprocess run.
///
/// Optional sub-configs switch stages on; `None` skips the stage. This is the
/// options-struct equivalent of a fluent builder: fill in what you need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refine: Option<RefineOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<ContentFilterOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masking: Option<PiiMaskingOptions>,
    pub chunking: ChunkOptions,
}

/// Outcome of a full preprocess run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessResult {
    pub original_text: String,
    /// Text after refine / filter / mask, i.e. what was chunked
    pub processed_text: String,
    pub chunks: Vec<Chunk>,
    pub pii_matches: Vec<PiiMatch>,
    pub filter_matches: Vec<ContentFilterMatch>,
    pub is_blocked: bool,
    pub options: PreprocessOptions,
    pub processed_at: DateTime<Utc>,
}

impl PreprocessResult {
    pub fn summary(&self) -> String {
        if self.is_blocked {
            return "Input blocked by content filter.".to_string();
        }
        format!(
            "Produced {} chunk(s) from {} chars ({} PII match(es), {} filter match(es))",
            self.chunks.len(),
            self.original_text.chars().count(),
            self.pii_matches.len(),
            self.filter_matches.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_skip_every_optional_stage() {
        let opts = PreprocessOptions::default();
        assert!(opts.refine.is_none());
        assert!(opts.filter.is_none());
        assert!(opts.masking.is_none());
    }

    #[test]
    fn summary_reports_counts() {
        let result = PreprocessResult {
            original_text: "abcdef".to_string(),
            processed_text: "abcdef".to_string(),
            chunks: vec![Chunk::new("abcdef".to_string(), 0, 6)],
            pii_matches: Vec::new(),
            filter_matches: Vec::new(),
            is_blocked: false,
            options: PreprocessOptions::default(),
            processed_at: Utc::now(),
        };
        assert!(result.summary().starts_with("Produced 1 chunk(s)"));
    }
}
