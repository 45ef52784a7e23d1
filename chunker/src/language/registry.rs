use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;

use super::builtin;
use super::profile::LanguageProfile;

static GLOBAL: Lazy<LanguageRegistry> = Lazy::new(LanguageRegistry::with_builtins);

/// The process-wide registry instance.
pub(super) fn global() -> &'static LanguageRegistry {
    &GLOBAL
}

/// Thread-safe mapping from language code to profile.
///
/// Read-mostly: profiles are registered once and immutable afterwards.
/// Unknown codes fall back to English.
pub struct LanguageRegistry {
    profiles: DashMap<String, Arc<dyn LanguageProfile>>,
}

impl LanguageRegistry {
    /// An empty registry; most callers want [`LanguageRegistry::with_builtins`].
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtin::install(&registry);
        registry
    }

    pub fn register(&self, profile: Arc<dyn LanguageProfile>) {
        self.profiles.insert(profile.code().to_string(), profile);
    }

    /// Profile for `code`, trying the exact code, then the code with its
    /// region subtag stripped (`ko-KR` -> `ko`), then English.
    pub fn get(&self, code: &str) -> Arc<dyn LanguageProfile> {
        if let Some(profile) = self.profiles.get(code) {
            return Arc::clone(&profile);
        }
        if let Some(base) = code.split('-').next() {
            if base != code {
                if let Some(profile) = self.profiles.get(base) {
                    return Arc::clone(&profile);
                }
            }
        }
        self.profiles
            .get("en")
            .map(|p| Arc::clone(&p))
            .unwrap_or_else(|| Arc::new(builtin::english()))
    }

    pub fn registered_codes(&self) -> Vec<String> {
        self.profiles.iter().map(|e| e.key().clone()).collect()
    }

    /// Detect the dominant language of `text` by script frequency.
    ///
    /// Single pass over non-whitespace, non-punctuation characters; the first
    /// bucket above 30% in the order ko > ja > zh > ru > ar > hi wins,
    /// otherwise English.
    pub fn detect_language(&self, text: &str) -> String {
        let counts = ScriptCounts::scan(text);
        let code = counts.dominant();
        debug!(language = code, total = counts.total, "detected language");
        code.to_string()
    }

    pub fn detect_profile(&self, text: &str) -> Arc<dyn LanguageProfile> {
        let code = self.detect_language(text);
        self.get(&code)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Script-bucket frequencies over one pass of the input.
#[derive(Debug, Default)]
struct ScriptCounts {
    hangul: usize,
    kana: usize,
    cjk: usize,
    cyrillic: usize,
    arabic: usize,
    devanagari: usize,
    latin: usize,
    total: usize,
}

impl ScriptCounts {
    fn scan(text: &str) -> Self {
        let mut counts = Self::default();
        for ch in text.chars() {
            if ch.is_whitespace() || is_punctuation(ch) {
                continue;
            }
            let code = ch as u32;
            counts.total += 1;
            match code {
                0xAC00..=0xD7A3 | 0x1100..=0x11FF | 0x3130..=0x318F => counts.hangul += 1,
                0x3040..=0x30FF => counts.kana += 1,
                0x4E00..=0x9FFF | 0x3400..=0x4DBF => counts.cjk += 1,
                0x0400..=0x04FF => counts.cyrillic += 1,
                0x0600..=0x06FF | 0x0750..=0x077F => counts.arabic += 1,
                0x0900..=0x097F => counts.devanagari += 1,
                0x0041..=0x005A | 0x0061..=0x007A | 0x00C0..=0x00FF => counts.latin += 1,
                _ => {}
            }
        }
        counts
    }

    fn dominant(&self) -> &'static str {
        if self.total == 0 {
            return "en";
        }
        let threshold = self.total as f32 * 0.30;
        let above = |count: usize| count as f32 > threshold;
        if above(self.hangul) {
            "ko"
        } else if above(self.kana) {
            "ja"
        } else if above(self.cjk) {
            "zh"
        } else if above(self.cyrillic) {
            "ru"
        } else if above(self.arabic) {
            "ar"
        } else if above(self.devanagari) {
            "hi"
        } else {
            "en"
        }
    }
}

fn is_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation()
        || matches!(
            ch,
            '。' | '、' | '，' | '；' | '：' | '？' | '！' | '「' | '」' | '『' | '』' | '（'
                | '）' | '《' | '》' | '।' | '॥' | '؟' | '۔' | '…' | '·'
        )
}
