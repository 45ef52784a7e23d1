use std::cmp::Reverse;

use chrono::Utc;
use regex::Regex;
use tracing::warn;

use textflow_models::{
    ContentFilterMatch, ContentFilterOptions, ContentFilterResult, FilterAction, FilterRule,
};

/// Rule-based content filter.
///
/// Rules are compiled once at construction; literal word rules are escaped
/// and wrapped in word boundaries, invalid regex rules are skipped. Matches
/// from allow-listed words are suppressed, and a single Block rule hit
/// empties the output.
pub struct ContentFilter {
    options: ContentFilterOptions,
    compiled: Vec<(FilterRule, Regex)>,
}

impl ContentFilter {
    pub fn new(options: ContentFilterOptions) -> Self {
        let mut compiled = Vec::with_capacity(options.rules.len());
        for rule in &options.rules {
            let source = if rule.is_literal {
                format!(r"(?i)\b{}\b", regex::escape(&rule.pattern))
            } else {
                rule.pattern.clone()
            };
            match Regex::new(&source) {
                Ok(regex) => compiled.push((rule.clone(), regex)),
                Err(err) => warn!(pattern = %rule.pattern, %err, "skipping invalid filter rule"),
            }
        }
        Self { options, compiled }
    }

    pub fn options(&self) -> &ContentFilterOptions {
        &self.options
    }

    pub fn filter(&self, text: &str) -> ContentFilterResult {
        let mut found: Vec<(ContentFilterMatch, Option<String>)> = Vec::new();

        for (rule, regex) in &self.compiled {
            if !self.options.categories.is_empty()
                && !self.options.categories.contains(&rule.category)
            {
                continue;
            }
            if rule.confidence < self.options.min_confidence {
                continue;
            }
            for m in regex.find_iter(text) {
                if self.is_allowed(m.as_str()) {
                    continue;
                }
                found.push((
                    ContentFilterMatch {
                        category: rule.category.clone(),
                        value: m.as_str().to_string(),
                        start: m.start(),
                        end: m.end(),
                        confidence: rule.confidence,
                        action: rule.action,
                    },
                    rule.replacement.clone(),
                ));
            }
        }

        // Longest match wins where rules overlap.
        found.sort_by_key(|(m, _)| (m.start, Reverse(m.end - m.start)));
        let mut running_end = 0usize;
        let mut survivors: Vec<(ContentFilterMatch, Option<String>)> = Vec::new();
        for entry in found {
            if entry.0.start < running_end && !survivors.is_empty() {
                continue;
            }
            running_end = entry.0.end;
            survivors.push(entry);
        }

        let blocked = survivors
            .iter()
            .any(|(m, _)| m.action == FilterAction::Block);

        let filtered_text = if blocked {
            String::new()
        } else {
            let mut output = text.to_string();
            for (m, replacement) in survivors.iter().rev() {
                match m.action {
                    FilterAction::Replace => {
                        let replacement = replacement
                            .clone()
                            .unwrap_or_else(|| self.options.replacement_text.clone());
                        output.replace_range(m.start..m.end, &replacement);
                    }
                    FilterAction::Remove => output.replace_range(m.start..m.end, ""),
                    FilterAction::Redact => {
                        let cover = self
                            .options
                            .redact_character
                            .to_string()
                            .repeat(m.value.chars().count());
                        output.replace_range(m.start..m.end, &cover);
                    }
                    FilterAction::Flag | FilterAction::Block => {}
                }
            }
            output
        };

        ContentFilterResult {
            original_text: text.to_string(),
            filtered_text,
            matches: survivors.into_iter().map(|(m, _)| m).collect(),
            is_blocked: blocked,
            options: self.options.clone(),
            processed_at: Utc::now(),
        }
    }

    fn is_allowed(&self, value: &str) -> bool {
        let lowered = value.to_lowercase();
        self.options
            .allow_words
            .iter()
            .any(|word| word.to_lowercase() == lowered)
    }
}
