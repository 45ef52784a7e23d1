use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for the text refiner.
///
/// Every step is optional; the pipeline order itself is fixed (base64 strip,
/// ASCII art, separators, repeated chars, empty list items, line pass, user
/// patterns, whitespace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineOptions {
    pub strip_base64: bool,
    pub base64_placeholder: String,
    pub remove_ascii_art: bool,
    pub normalize_separators: bool,
    pub separator_replacement: String,
    pub reduce_repeated_chars: bool,
    /// Runs of the same symbol longer than this are cut down to this length
    pub max_repeats: usize,
    pub remove_empty_list_items: bool,
    pub process_lines: bool,
    pub remove_blank_lines: bool,
    pub collapse_blank_lines: bool,
    pub remove_duplicate_lines: bool,
    /// Lines shorter than this are dropped by the line pass (0 keeps all)
    pub min_line_length: usize,
    /// User regexes removed in order; invalid entries are skipped
    pub remove_patterns: Vec<String>,
    /// User (pattern, replacement) pairs applied after removals
    pub replace_patterns: Vec<(String, String)>,
    pub normalize_whitespace: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            strip_base64: true,
            base64_placeholder: "[embedded-data]".to_string(),
            remove_ascii_art: false,
            normalize_separators: false,
            separator_replacement: "---".to_string(),
            reduce_repeated_chars: false,
            max_repeats: 4,
            remove_empty_list_items: false,
            process_lines: true,
            remove_blank_lines: false,
            collapse_blank_lines: true,
            remove_duplicate_lines: true,
            min_line_length: 0,
            remove_patterns: Vec::new(),
            replace_patterns: Vec::new(),
            normalize_whitespace: false,
        }
    }
}

impl RefineOptions {
    /// Reduce token waste from extraction artifacts without touching layout
    pub fn for_token_optimization() -> Self {
        Self {
            strip_base64: true,
            normalize_separators: true,
            reduce_repeated_chars: true,
            remove_empty_list_items: true,
            ..Default::default()
        }
    }

    /// Everything on: box art, separators, short lines, whitespace collapse
    pub fn for_aggressive_token_optimization() -> Self {
        Self {
            strip_base64: true,
            remove_ascii_art: true,
            normalize_separators: true,
            separator_replacement: String::new(),
            reduce_repeated_chars: true,
            max_repeats: 3,
            remove_empty_list_items: true,
            remove_blank_lines: true,
            min_line_length: 2,
            ..Default::default()
        }
    }
}

/// Outcome of a refine run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineResult {
    pub original_text: String,
    pub refined_text: String,
    /// Names of the steps that actually changed the text
    pub steps_applied: Vec<String>,
    pub options: RefineOptions,
    pub processed_at: DateTime<Utc>,
}

impl RefineResult {
    pub fn chars_removed(&self) -> usize {
        self.original_text
            .chars()
            .count()
            .saturating_sub(self.refined_text.chars().count())
    }

    pub fn summary(&self) -> String {
        format!(
            "Refined text: {} -> {} chars ({} step(s) applied)",
            self.original_text.chars().count(),
            self.refined_text.chars().count(),
            self.steps_applied.len()
        )
    }
}
