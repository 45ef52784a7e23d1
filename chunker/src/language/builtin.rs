use std::sync::Arc;

use super::korean::KoreanProfile;
use super::profile::{BasicProfile, LanguageProfile};
use super::registry::LanguageRegistry;

/// Register the 14 built-in profiles.
pub(super) fn install(registry: &LanguageRegistry) {
    registry.register(Arc::new(english()));
    registry.register(Arc::new(KoreanProfile::new()));
    registry.register(Arc::new(japanese()));
    registry.register(Arc::new(chinese()));
    registry.register(Arc::new(spanish()));
    registry.register(Arc::new(french()));
    registry.register(Arc::new(german()));
    registry.register(Arc::new(portuguese()));
    registry.register(Arc::new(russian()));
    registry.register(Arc::new(arabic()));
    registry.register(Arc::new(hindi()));
    registry.register(Arc::new(vietnamese()));
    registry.register(Arc::new(thai()));
}

pub(super) fn english() -> BasicProfile {
    BasicProfile::new("en", 4.0).with_abbreviations(&[
        "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "vs.", "etc.", "e.g.", "i.e.",
        "inc.", "ltd.", "co.", "corp.", "dept.", "est.", "fig.", "no.", "al.", "approx.",
    ])
}

fn japanese() -> BasicProfile {
    BasicProfile::new("ja", 1.5)
        .with_terminators(&['。', '！', '？', '!', '?', '.'])
        .with_section_pattern(r"(?m)^[ \t]*第[0-9一二三四五六七八九十百]+[章節課][ \t]*\S*.*$")
}

fn chinese() -> BasicProfile {
    BasicProfile::new("zh", 1.5)
        .with_terminators(&['。', '！', '？', '；', '!', '?'])
        .with_section_pattern(r"(?m)^[ \t]*第[0-9一二三四五六七八九十百]+[章节课][ \t]*\S*.*$")
}

fn spanish() -> BasicProfile {
    // Opening marks (¡¿) start sentences but never terminate them.
    BasicProfile::new("es", 4.5).with_abbreviations(&[
        "sr.", "sra.", "srta.", "dr.", "dra.", "ud.", "uds.", "etc.", "pág.", "núm.",
    ])
}

fn french() -> BasicProfile {
    // French allows a space before ! and ?; terminator runs already tolerate it.
    BasicProfile::new("fr", 4.5)
        .with_abbreviations(&["m.", "mme.", "mlle.", "dr.", "etc.", "av.", "p.ex.", "env."])
        .with_section_pattern(r"(?mi)^[ \t]*chapitre\s+\d+.*$")
}

fn german() -> BasicProfile {
    BasicProfile::new("de", 5.0).with_abbreviations(&[
        "z.b.", "d.h.", "u.a.", "usw.", "bzw.", "ca.", "nr.", "dr.", "prof.", "evtl.", "ggf.",
        "inkl.", "str.",
    ])
}

fn portuguese() -> BasicProfile {
    BasicProfile::new("pt", 4.5)
        .with_abbreviations(&["sr.", "sra.", "dr.", "dra.", "etc.", "pág.", "núm.", "av."])
}

fn russian() -> BasicProfile {
    BasicProfile::new("ru", 4.0)
        .with_abbreviations(&["т.е.", "т.д.", "т.п.", "гл.", "стр.", "др.", "им.", "г."])
}

fn arabic() -> BasicProfile {
    BasicProfile::new("ar", 3.0).with_terminators(&['۔', '؟', '.', '!', '?'])
}

fn hindi() -> BasicProfile {
    BasicProfile::new("hi", 3.0).with_terminators(&['।', '॥', '.', '!', '?'])
}

fn vietnamese() -> BasicProfile {
    BasicProfile::new("vi", 4.0).with_abbreviations(&["tp.", "ts.", "ths.", "gs.", "pgs."])
}

fn thai() -> BasicProfile {
    // Thai script carries no terminal punctuation; the terminal boundary at
    // text.len() and paragraph breaks do most of the work.
    BasicProfile::new("th", 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_match_the_documented_table() {
        let cases: &[(&str, f32)] = &[
            ("en", 4.0),
            ("ja", 1.5),
            ("zh", 1.5),
            ("es", 4.5),
            ("fr", 4.5),
            ("de", 5.0),
            ("pt", 4.5),
            ("ru", 4.0),
            ("ar", 3.0),
            ("hi", 3.0),
            ("vi", 4.0),
            ("th", 2.0),
        ];
        let registry = LanguageRegistry::with_builtins();
        for (code, ratio) in cases {
            let profile = registry.get(code);
            assert_eq!(profile.code(), *code);
            assert!((profile.chars_per_token() - ratio).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn german_abbreviations_hold_sentences_together() {
        let profile = german();
        let text = "Wir brauchen z.B. mehr Zeit. Danach reden wir.";
        let boundaries = profile.find_sentence_boundaries(text);
        assert_eq!(boundaries.len(), 2);
    }

    #[test]
    fn hindi_danda_terminates() {
        let profile = hindi();
        let text = "यह एक वाक्य है। यह दूसरा है।";
        let boundaries = profile.find_sentence_boundaries(text);
        assert_eq!(boundaries.len(), 2);
        assert_eq!(*boundaries.last().unwrap(), text.len());
    }

    #[test]
    fn japanese_chapter_marker_is_a_section() {
        let profile = japanese();
        let text = "第1章 はじめに\n本文です。";
        let headers = profile.find_section_headers(text);
        assert_eq!(headers.len(), 1);
        assert!(headers[0].2.starts_with("第1章"));
    }
}
