use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use super::profile::LanguageProfile;

lazy_static! {
    // 제1조, 제 2 항 and friends end with a period without ending a sentence.
    static ref LEGAL_CLAUSE: Regex = Regex::new(r"^제\s?\d+\s?[조항장절호]$").unwrap();
    static ref KO_SECTION: Regex = Regex::new(r"(?m)^[ \t]*제\s?\d+\s?[장절편][ \t]*\S*.*$").unwrap();
}

const TERMINATORS: &[char] = &['.', '!', '?', '。'];

/// Korean profile: two-phase token estimation and quote-aware sentence
/// splitting.
///
/// Sentence boundaries are suppressed while any of `"…"`, `'…'`, `「…」`,
/// `『…』` or `(…)` is still open, so quoted speech stays in one sentence.
pub struct KoreanProfile {
    abbreviations: HashSet<String>,
}

impl KoreanProfile {
    pub fn new() -> Self {
        let abbreviations = ["주식회사.", "유한회사.", "외.", "등.", "약."]
            .iter()
            .map(|a| a.to_string())
            .collect();
        Self { abbreviations }
    }

    fn is_hangul(ch: char) -> bool {
        let code = ch as u32;
        (0xAC00..=0xD7A3).contains(&code)
            || (0x1100..=0x11FF).contains(&code)
            || (0x3130..=0x318F).contains(&code)
    }
}

impl Default for KoreanProfile {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks open quote and bracket pairs while scanning.
#[derive(Default)]
struct QuoteBalance {
    double: bool,
    single: bool,
    corner: i32,
    white_corner: i32,
    paren: i32,
}

impl QuoteBalance {
    fn observe(&mut self, ch: char) {
        match ch {
            '\u{201C}' => self.double = true,
            '\u{201D}' => self.double = false,
            '\u{2018}' => self.single = true,
            '\u{2019}' => self.single = false,
            // Straight quotes toggle: the second occurrence closes the first.
            '"' => self.double = !self.double,
            '\'' => self.single = !self.single,
            '「' => self.corner += 1,
            '」' => self.corner = (self.corner - 1).max(0),
            '『' => self.white_corner += 1,
            '』' => self.white_corner = (self.white_corner - 1).max(0),
            '(' => self.paren += 1,
            ')' => self.paren = (self.paren - 1).max(0),
            _ => {}
        }
    }

    fn balanced(&self) -> bool {
        !self.double && !self.single && self.corner == 0 && self.white_corner == 0 && self.paren == 0
    }
}

impl LanguageProfile for KoreanProfile {
    fn code(&self) -> &str {
        "ko"
    }

    fn chars_per_token(&self) -> f32 {
        2.0
    }

    fn sentence_terminators(&self) -> &[char] {
        TERMINATORS
    }

    fn abbreviations(&self) -> &HashSet<String> {
        &self.abbreviations
    }

    fn extra_section_patterns(&self) -> &[Regex] {
        std::slice::from_ref(&*KO_SECTION)
    }

    fn find_sentence_boundaries(&self, text: &str) -> Vec<usize> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut balance = QuoteBalance::default();
        let mut boundaries = Vec::new();

        let mut i = 0;
        while i < chars.len() {
            let (idx, ch) = chars[i];
            if !TERMINATORS.contains(&ch) {
                balance.observe(ch);
                i += 1;
                continue;
            }

            let mut j = i + 1;
            while j < chars.len() && TERMINATORS.contains(&chars[j].1) {
                j += 1;
            }

            let followed_by_whitespace = j >= chars.len() || chars[j].1.is_whitespace();
            let single_period = ch == '.' && j == i + 1;

            if followed_by_whitespace
                && balance.balanced()
                && !(single_period && self.is_abbreviation(text, idx))
            {
                let (last_idx, last_ch) = chars[j - 1];
                boundaries.push(last_idx + last_ch.len_utf8());
            }
            i = j;
        }

        if boundaries.last() != Some(&text.len()) {
            boundaries.push(text.len());
        }
        boundaries
    }

    /// Hangul runs denser than Latin text: `ceil(hangul / 1.5) +
    /// ceil(other non-space / 4)`.
    fn estimate_token_count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let mut hangul = 0usize;
        let mut other = 0usize;
        for ch in text.chars() {
            if ch.is_whitespace() {
                continue;
            }
            if Self::is_hangul(ch) {
                hangul += 1;
            } else {
                other += 1;
            }
        }
        let estimate =
            (hangul as f32 / 1.5).ceil() as usize + (other as f32 / 4.0).ceil() as usize;
        estimate.max(1)
    }

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
        let word = &text[word_start..period_idx];
        if LEGAL_CLAUSE.is_match(word) {
            return true;
        }
        self.abbreviations
            .contains(&format!("{}.", word).to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_korean_sentences() {
        let profile = KoreanProfile::new();
        let text = "안녕하세요. 테스트입니다.";
        let boundaries = profile.find_sentence_boundaries(text);
        assert_eq!(boundaries.len(), 2);
        assert_eq!(*boundaries.last().unwrap(), text.len());
    }

    #[test]
    fn quoted_terminators_do_not_split() {
        let profile = KoreanProfile::new();
        let text = "그는 「멈춰. 기다려.」 라고 말했다.";
        let boundaries = profile.find_sentence_boundaries(text);
        // Terminators inside the corner brackets stay inside one sentence.
        assert_eq!(boundaries, vec![text.len()]);
    }

    #[test]
    fn legal_clause_periods_are_suppressed() {
        let profile = KoreanProfile::new();
        let text = "제1조. 이 법은 개인정보 보호를 목적으로 한다.";
        let boundaries = profile.find_sentence_boundaries(text);
        assert_eq!(boundaries, vec![text.len()]);
    }

    #[test]
    fn two_phase_token_estimate() {
        let profile = KoreanProfile::new();
        // 11 hangul chars and 2 periods: ceil(11/1.5) + ceil(2/4) = 8 + 1.
        assert_eq!(profile.estimate_token_count("안녕하세요. 테스트입니다."), 9);
        assert_eq!(profile.estimate_token_count(""), 0);
    }
}
