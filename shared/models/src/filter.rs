use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happens to text matched by a filter rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    /// Substitute the rule's replacement string
    Replace,
    /// Delete the span
    Remove,
    /// Same-length run of the redact character
    Redact,
    /// Record the match without modifying the text
    Flag,
    /// Reject the whole input
    Block,
}

/// A single filtering rule: a regex pattern or a literal word
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub category: String,
    /// Regex source; literal words are escaped before compilation
    pub pattern: String,
    /// When true, `pattern` is a literal word rather than a regex
    pub is_literal: bool,
    pub action: FilterAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    pub confidence: f32,
}

impl FilterRule {
    pub fn regex(category: &str, pattern: &str, action: FilterAction) -> Self {
        Self {
            category: category.to_string(),
            pattern: pattern.to_string(),
            is_literal: false,
            action,
            replacement: None,
            confidence: 1.0,
        }
    }

    pub fn word(category: &str, word: &str, action: FilterAction) -> Self {
        Self {
            category: category.to_string(),
            pattern: word.to_string(),
            is_literal: true,
            action,
            replacement: None,
            confidence: 1.0,
        }
    }

    pub fn with_replacement(mut self, replacement: &str) -> Self {
        self.replacement = Some(replacement.to_string());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Configuration for a content-filter run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFilterOptions {
    pub rules: Vec<FilterRule>,
    /// Words that suppress any match they fully cover
    pub allow_words: Vec<String>,
    /// When non-empty, only rules from these categories fire
    pub categories: Vec<String>,
    pub min_confidence: f32,
    pub redact_character: char,
    /// Default replacement when a Replace rule has none of its own
    pub replacement_text: String,
}

impl Default for ContentFilterOptions {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            allow_words: Vec::new(),
            categories: Vec::new(),
            min_confidence: 0.5,
            redact_character: '*',
            replacement_text: "[FILTERED]".to_string(),
        }
    }
}

/// One rule hit inside the scanned text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFilterMatch {
    pub category: String,
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
    pub action: FilterAction,
}

/// Outcome of a content-filter run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFilterResult {
    pub original_text: String,
    pub filtered_text: String,
    pub matches: Vec<ContentFilterMatch>,
    pub is_blocked: bool,
    pub options: ContentFilterOptions,
    pub processed_at: DateTime<Utc>,
}

impl ContentFilterResult {
    pub fn summary(&self) -> String {
        if self.is_blocked {
            return format!("Content blocked ({} match(es)).", self.matches.len());
        }
        if self.matches.is_empty() {
            return "No filtered content.".to_string();
        }
        format!("Filtered {} match(es).", self.matches.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_builders_set_fields() {
        let rule = FilterRule::word("profanity", "badword", FilterAction::Redact)
            .with_confidence(0.8);
        assert!(rule.is_literal);
        assert_eq!(rule.category, "profanity");
        assert_eq!(rule.confidence, 0.8);

        let rule = FilterRule::regex("spam", r"buy\s+now", FilterAction::Replace)
            .with_replacement("[ad]");
        assert!(!rule.is_literal);
        assert_eq!(rule.replacement.as_deref(), Some("[ad]"));
    }

    #[test]
    fn blocked_summary() {
        let result = ContentFilterResult {
            original_text: "x".to_string(),
            filtered_text: String::new(),
            matches: Vec::new(),
            is_blocked: true,
            options: ContentFilterOptions::default(),
            processed_at: Utc::now(),
        };
        assert!(result.summary().starts_with("Content blocked"));
    }
}
