use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // A paragraph break is a newline, optional whitespace, then another newline.
    static ref PARAGRAPH_BREAK: Regex = Regex::new(r"\n\s*\n").unwrap();
    static ref MARKDOWN_HEADER: Regex = Regex::new(r"(?m)^(#{1,6})[ \t]+(.+)$").unwrap();
    static ref NUMBERED_HEADER: Regex =
        Regex::new(r"(?m)^[ \t]*\d+(?:\.\d+)*[.)][ \t]+\S.*$").unwrap();
}

/// Closing quotes and brackets a sentence terminator may be wrapped in.
const TRAILING_CLOSERS: &[char] = &['"', '\'', '\u{201D}', '\u{2019}', ')', ']', '」', '』'];

/// Per-language boundary detection and token estimation.
///
/// One profile per language; immutable after registration. The default
/// methods implement the shared boundary algorithms; profiles override them
/// only where the language needs different behavior (see
/// [`super::KoreanProfile`]).
pub trait LanguageProfile: Send + Sync {
    /// ISO 639-1 code, e.g. "en"
    fn code(&self) -> &str;

    /// Average characters per estimated token
    fn chars_per_token(&self) -> f32;

    /// Characters that terminate a sentence
    fn sentence_terminators(&self) -> &[char];

    /// Lowercased abbreviations including their trailing period ("mr.", "z.b.")
    fn abbreviations(&self) -> &HashSet<String>;

    /// Language-specific section-marker patterns beyond markdown and numbering
    fn extra_section_patterns(&self) -> &[Regex] {
        &[]
    }

    /// Byte offsets just past each sentence terminator.
    ///
    /// The final boundary is always `text.len()` for non-empty input, even
    /// when the text does not end with a terminator.
    fn find_sentence_boundaries(&self, text: &str) -> Vec<usize> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let terminators = self.sentence_terminators();
        let mut boundaries = Vec::new();

        let mut i = 0;
        while i < chars.len() {
            let (idx, ch) = chars[i];
            if !terminators.contains(&ch) {
                i += 1;
                continue;
            }

            // Coalesce terminator runs ("...", "?!") into one boundary.
            let mut j = i + 1;
            while j < chars.len() && terminators.contains(&chars[j].1) {
                j += 1;
            }
            // A terminator may sit inside closing quotes: `He said "stop."`
            let mut k = j;
            while k < chars.len() && TRAILING_CLOSERS.contains(&chars[k].1) {
                k += 1;
            }

            let followed_by_whitespace = k >= chars.len() || chars[k].1.is_whitespace();
            let single_period = ch == '.' && j == i + 1;

            if followed_by_whitespace && !(single_period && self.is_abbreviation(text, idx)) {
                let (last_idx, last_ch) = chars[k - 1];
                boundaries.push(last_idx + last_ch.len_utf8());
            }
            i = j;
        }

        if boundaries.last() != Some(&text.len()) {
            boundaries.push(text.len());
        }
        boundaries
    }

    /// Byte offsets just past each paragraph break, terminated by `text.len()`.
    fn find_paragraph_boundaries(&self, text: &str) -> Vec<usize> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut boundaries: Vec<usize> =
            PARAGRAPH_BREAK.find_iter(text).map(|m| m.end()).collect();
        if boundaries.last() != Some(&text.len()) {
            boundaries.push(text.len());
        }
        boundaries
    }

    /// Section headers as `(start, end, title)` tuples, sorted by start.
    fn find_section_headers(&self, text: &str) -> Vec<(usize, usize, String)> {
        let mut headers: Vec<(usize, usize, String)> = Vec::new();

        for caps in MARKDOWN_HEADER.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            let title = caps.get(2).unwrap().as_str().trim().to_string();
            headers.push((whole.start(), whole.end(), title));
        }
        for m in NUMBERED_HEADER.find_iter(text) {
            headers.push((m.start(), m.end(), m.as_str().trim().to_string()));
        }
        for pattern in self.extra_section_patterns() {
            for m in pattern.find_iter(text) {
                headers.push((m.start(), m.end(), m.as_str().trim().to_string()));
            }
        }

        headers.sort_by_key(|(start, _, _)| *start);
        headers.dedup_by_key(|(start, _, _)| *start);
        headers
    }

    /// Estimated token count: `ceil(chars / chars_per_token)`, at least 1 for
    /// non-empty text. Not a real tokenizer.
    fn estimate_token_count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count();
        ((chars as f32 / self.chars_per_token()).ceil() as usize).max(1)
    }

    /// Whether the period at `period_idx` ends a known abbreviation.
    ///
    /// Looks at the trailing word in a window of at most 10 characters before
    /// the period, case-insensitively.
    fn is_abbreviation(&self, text: &str, period_idx: usize) -> bool {
        let before = &text[..period_idx];
        let mut word_start = period_idx;
        for (count, (idx, ch)) in before.char_indices().rev().enumerate() {
            if count >= 10 || ch.is_whitespace() {
                break;
            }
            word_start = idx;
        }
        if word_start == period_idx {
            return false;
        }
        let word = format!("{}.", &text[word_start..period_idx]).to_lowercase();
        self.abbreviations().contains(&word)
    }
}

/// Data-driven profile used by most built-in languages.
pub struct BasicProfile {
    code: &'static str,
    chars_per_token: f32,
    terminators: Vec<char>,
    abbreviations: HashSet<String>,
    section_patterns: Vec<Regex>,
}

impl BasicProfile {
    pub fn new(code: &'static str, chars_per_token: f32) -> Self {
        Self {
            code,
            chars_per_token,
            terminators: vec!['.', '!', '?'],
            abbreviations: HashSet::new(),
            section_patterns: Vec::new(),
        }
    }

    pub fn with_terminators(mut self, terminators: &[char]) -> Self {
        self.terminators = terminators.to_vec();
        self
    }

    pub fn with_abbreviations(mut self, abbreviations: &[&str]) -> Self {
        self.abbreviations = abbreviations.iter().map(|a| a.to_lowercase()).collect();
        self
    }

    pub fn with_section_pattern(mut self, pattern: &str) -> Self {
        // Patterns are compiled once at profile construction.
        self.section_patterns
            .push(Regex::new(pattern).expect("invalid built-in section pattern"));
        self
    }
}

impl LanguageProfile for BasicProfile {
    fn code(&self) -> &str {
        self.code
    }

    fn chars_per_token(&self) -> f32 {
        self.chars_per_token
    }

    fn sentence_terminators(&self) -> &[char] {
        &self.terminators
    }

    fn abbreviations(&self) -> &HashSet<String> {
        &self.abbreviations
    }

    fn extra_section_patterns(&self) -> &[Regex] {
        &self.section_patterns
    }
}
