use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use textflow_models::{RefineOptions, RefineResult};

lazy_static! {
    // Inline base64 payloads of 50+ chars; shorter runs are left alone.
    static ref BASE64_PAYLOAD: Regex =
        Regex::new(r"data:[^;,\s]*;base64,[A-Za-z0-9+/=]{50,}").unwrap();
    // A separator is a full line of ASCII rules, box-drawing, or geometric shapes.
    static ref SEPARATOR_LINE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:[-=_*#~]{4,}|[╔╗╚╝║═╠╣╬╦╩╪┌┐└┘│─├┤┬┴┼┏┓┗┛┃━┣┫┳┻╋╭╮╯╰]{3,}|[◆◇■□▲△▼▽●○★☆]{3,})[ \t]*$",
    )
    .unwrap();
    static ref EMPTY_LIST_ITEM: Regex = Regex::new(
        r"(?m)^[ \t]*(?:[-*+•·◦▪]|\d{1,3}[.)]|[A-Za-z][.)]|[ivxlcdmIVXLCDM]{1,6}[.)]|[가-힣][.)]|제[ \t]?\d+[ \t]?조)[ \t]*$",
    )
    .unwrap();
}

const BOX_DRAWING: &str = "╔╗╚╝║═╠╣╬╦╩╪┌┐└┘│─├┤┬┴┼┏┓┗┛┃━┣┫┳┻╋╭╮╯╰";

/// Deterministic cleanup pipeline for noisy extracted text.
///
/// Step order is fixed and observable: base64 strip, ASCII-art removal,
/// separator normalization, repeated-character reduction, empty-list-item
/// removal, line processing, user patterns, whitespace normalization. Every
/// step is gated by its option flag. Running the pipeline twice yields the
/// same output as running it once.
pub struct TextRefiner {
    options: RefineOptions,
}

impl TextRefiner {
    pub fn new(options: RefineOptions) -> Self {
        Self { options }
    }

    pub fn with_defaults() -> Self {
        Self::new(RefineOptions::default())
    }

    pub fn options(&self) -> &RefineOptions {
        &self.options
    }

    pub fn refine(&self, text: &str) -> String {
        self.refine_with_result(text).refined_text
    }

    pub fn refine_with_result(&self, text: &str) -> RefineResult {
        let mut current = text.to_string();
        let mut steps_applied = Vec::new();

        let mut run = |name: &str, enabled: bool, step: &dyn Fn(&str) -> String, current: &mut String| {
            if !enabled {
                return;
            }
            let next = step(current);
            if next != *current {
                steps_applied.push(name.to_string());
                *current = next;
            }
        };

        run("strip_base64", self.options.strip_base64, &|t| {
            BASE64_PAYLOAD
                .replace_all(t, self.options.base64_placeholder.as_str())
                .into_owned()
        }, &mut current);

        run("remove_ascii_art", self.options.remove_ascii_art, &|t| {
            remove_ascii_art(t)
        }, &mut current);

        run("normalize_separators", self.options.normalize_separators, &|t| {
            SEPARATOR_LINE
                .replace_all(t, self.options.separator_replacement.as_str())
                .into_owned()
        }, &mut current);

        run("reduce_repeated_chars", self.options.reduce_repeated_chars, &|t| {
            reduce_repeats(t, self.options.max_repeats)
        }, &mut current);

        run("remove_empty_list_items", self.options.remove_empty_list_items, &|t| {
            drop_matching_lines(t, &EMPTY_LIST_ITEM)
        }, &mut current);

        run("process_lines", self.options.process_lines, &|t| {
            self.process_lines(t)
        }, &mut current);

        run(
            "user_patterns",
            !self.options.remove_patterns.is_empty() || !self.options.replace_patterns.is_empty(),
            &|t| self.apply_user_patterns(t),
            &mut current,
        );

        run("normalize_whitespace", self.options.normalize_whitespace, &|t| {
            t.split_whitespace().collect::<Vec<_>>().join(" ")
        }, &mut current);

        RefineResult {
            original_text: text.to_string(),
            refined_text: current,
            steps_applied,
            options: self.options.clone(),
            processed_at: Utc::now(),
        }
    }

    /// Single pass over lines: trim, blank handling, consecutive duplicates,
    /// minimum length.
    fn process_lines(&self, text: &str) -> String {
        let mut out: Vec<String> = Vec::new();
        let mut blank_run = 0usize;
        let mut previous: Option<String> = None;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                if self.options.remove_blank_lines {
                    continue;
                }
                blank_run += 1;
                previous = None;
                continue;
            }
            if self.options.remove_duplicate_lines && previous.as_deref() == Some(trimmed) {
                continue;
            }
            if self.options.min_line_length > 0
                && trimmed.chars().count() < self.options.min_line_length
            {
                continue;
            }
            if blank_run > 0 && !out.is_empty() {
                let keep = if self.options.collapse_blank_lines {
                    1
                } else {
                    blank_run
                };
                for _ in 0..keep {
                    out.push(String::new());
                }
            }
            blank_run = 0;
            out.push(trimmed.to_string());
            previous = Some(trimmed.to_string());
        }
        out.join("\n")
    }

    fn apply_user_patterns(&self, text: &str) -> String {
        let mut current = text.to_string();
        for pattern in &self.options.remove_patterns {
            match Regex::new(pattern) {
                Ok(re) => current = re.replace_all(&current, "").into_owned(),
                Err(err) => debug!(pattern, %err, "skipping invalid remove pattern"),
            }
        }
        for (pattern, replacement) in &self.options.replace_patterns {
            match Regex::new(pattern) {
                Ok(re) => current = re.replace_all(&current, replacement.as_str()).into_owned(),
                Err(err) => debug!(pattern, %err, "skipping invalid replace pattern"),
            }
        }
        current
    }
}

fn remove_ascii_art(text: &str) -> String {
    if !text.chars().any(|ch| BOX_DRAWING.contains(ch)) {
        return text.to_string();
    }
    let stripped: String = text
        .chars()
        .filter(|ch| !BOX_DRAWING.contains(*ch))
        .collect();

    // Stripping leaves ragged blank lines behind; keep at most one between
    // content blocks.
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in stripped.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push("");
        } else {
            blank_run = 0;
            out.push(trimmed);
        }
    }
    out.join("\n")
}

/// Cut runs of the same symbol down to `max` occurrences. Word characters,
/// whitespace, CJK, and Hangul are exempt.
fn reduce_repeats(text: &str, max: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run_char: Option<char> = None;
    let mut run_len = 0usize;

    for ch in text.chars() {
        if run_char == Some(ch) {
            run_len += 1;
        } else {
            run_char = Some(ch);
            run_len = 1;
        }
        let reducible =
            !ch.is_alphanumeric() && ch != '_' && !ch.is_whitespace() && !is_cjk_or_hangul(ch);
        if reducible && run_len > max {
            continue;
        }
        out.push(ch);
    }
    out
}

fn is_cjk_or_hangul(ch: char) -> bool {
    let code = ch as u32;
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x3040..=0x30FF).contains(&code)
        || (0xAC00..=0xD7A3).contains(&code)
        || (0x1100..=0x11FF).contains(&code)
        || (0x3130..=0x318F).contains(&code)
}

fn drop_matching_lines(text: &str, pattern: &Regex) -> String {
    text.lines()
        .filter(|line| !pattern.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}
