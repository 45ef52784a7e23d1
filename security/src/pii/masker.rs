use std::cmp::Reverse;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use textflow_models::{
    MaskingResult, MaskingStrategy, PiiMaskingOptions, PiiMatch, PiiType, PreprocessError,
};

use super::detectors::{
    CreditCardDetector, EmailDetector, IpAddressDetector, PhoneDetector, UrlDetector,
};
use super::national::national_id_registry;
use super::PiiDetector;

/// Detect -> dedupe overlaps -> apply the masking strategy.
///
/// The detector set is fixed at construction: global detectors filtered by
/// `types_to_mask` plus national-ID detectors selected by `language_codes`
/// (`"auto"` selects all). Additional detectors can be registered afterwards.
pub struct PiiMasker {
    options: PiiMaskingOptions,
    detectors: Vec<Arc<dyn PiiDetector>>,
}

impl PiiMasker {
    pub fn new(options: PiiMaskingOptions) -> Self {
        let mut detectors: Vec<Arc<dyn PiiDetector>> = Vec::new();
        let wanted = |t: PiiType| options.types_to_mask.is_empty() || options.types_to_mask.contains(&t);

        if wanted(PiiType::Email) {
            detectors.push(Arc::new(EmailDetector));
        }
        if wanted(PiiType::Phone) {
            detectors.push(Arc::new(PhoneDetector));
        }
        if wanted(PiiType::CreditCard) {
            detectors.push(Arc::new(CreditCardDetector));
        }
        if wanted(PiiType::IpAddress) {
            detectors.push(Arc::new(IpAddressDetector));
        }
        if wanted(PiiType::Url) {
            detectors.push(Arc::new(UrlDetector));
        }
        for code in &options.language_codes {
            for national in national_id_registry().for_language(code) {
                let detector: Arc<dyn PiiDetector> = national;
                detectors.push(detector);
            }
        }

        Self { options, detectors }
    }

    /// Masker for the common contact-data types with default options.
    pub fn with_defaults() -> Self {
        Self::new(PiiMaskingOptions::common())
    }

    pub fn options(&self) -> &PiiMaskingOptions {
        &self.options
    }

    pub fn register_detector(&mut self, detector: Arc<dyn PiiDetector>) {
        self.detectors.push(detector);
    }

    /// All matches above `min_confidence`, overlap-resolved, sorted by start.
    pub async fn detect(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<PiiMatch>, PreprocessError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let parallel = self.options.enable_parallel_processing
            && text.len() > self.options.parallel_threshold;

        let mut matches: Vec<PiiMatch> = if parallel {
            let tasks = self.detectors.iter().map(|detector| {
                let detector = Arc::clone(detector);
                let text = text.to_string();
                tokio::spawn(async move { detector.detect(&text) })
            });
            let mut collected = Vec::new();
            for outcome in join_all(tasks).await {
                match outcome {
                    Ok(found) => collected.extend(found),
                    // A panicking detector loses its own matches only.
                    Err(err) => warn!(%err, "PII detector task failed"),
                }
            }
            collected
        } else {
            let mut collected = Vec::new();
            for detector in &self.detectors {
                if cancel.is_cancelled() {
                    return Err(PreprocessError::Cancelled);
                }
                collected.extend(detector.detect(text));
            }
            collected
        };

        if cancel.is_cancelled() {
            return Err(PreprocessError::Cancelled);
        }

        matches.retain(|m| m.confidence >= self.options.min_confidence);
        Ok(resolve_overlaps(matches))
    }

    pub async fn contains_pii(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, PreprocessError> {
        Ok(!self.detect(text, cancel).await?.is_empty())
    }

    /// Mask every surviving match, working back-to-front so offsets stay
    /// valid while the text is rewritten.
    pub async fn mask(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<MaskingResult, PreprocessError> {
        let mut matches = self.detect(text, cancel).await?;
        debug!(matches = matches.len(), "masking PII matches");

        let mut masked_text = text.to_string();
        for m in matches.iter_mut().rev() {
            let replacement = self.masked_value(m);
            masked_text.replace_range(m.start..m.end, &replacement);
            m.masked_value = Some(replacement);
        }

        Ok(MaskingResult {
            original_text: text.to_string(),
            masked_text,
            matches,
            options: self.options.clone(),
            processed_at: Utc::now(),
        })
    }

    fn masked_value(&self, m: &PiiMatch) -> String {
        match self.options.strategy {
            MaskingStrategy::Token => self
                .options
                .custom_tokens
                .get(&m.pii_type)
                .cloned()
                .unwrap_or_else(|| format!("[{}]", m.pii_type.token_tag())),
            MaskingStrategy::Asterisk => self
                .options
                .mask_char
                .to_string()
                .repeat(m.value.chars().count()),
            MaskingStrategy::Character => "X".repeat(m.value.chars().count()),
            MaskingStrategy::Redact => "[REDACTED]".to_string(),
            MaskingStrategy::Partial => self.partial_mask(m),
            MaskingStrategy::Hash => {
                let digest = Sha256::digest(m.value.as_bytes());
                format!("[HASH:{}]", &hex::encode(digest)[..8])
            }
            MaskingStrategy::Remove => String::new(),
        }
    }

    fn partial_mask(&self, m: &PiiMatch) -> String {
        let mask = self.options.mask_char;
        match m.pii_type {
            PiiType::Email => partial_email(&m.value, mask),
            PiiType::Phone => {
                // Everything but the last four digits is masked; separators stay.
                let digit_count = m.value.chars().filter(|c| c.is_ascii_digit()).count();
                let mut digits_seen = 0;
                m.value
                    .chars()
                    .map(|ch| {
                        if ch.is_ascii_digit() {
                            digits_seen += 1;
                            if digits_seen + 4 <= digit_count {
                                mask
                            } else {
                                ch
                            }
                        } else {
                            ch
                        }
                    })
                    .collect()
            }
            _ => {
                let keep = self.options.partial_preserve_count;
                m.value
                    .chars()
                    .enumerate()
                    .map(|(i, ch)| if i < keep { ch } else { mask })
                    .collect()
            }
        }
    }
}

/// First two characters of the local part and domain survive; the TLD stays.
fn partial_email(value: &str, mask: char) -> String {
    let Some((local, domain)) = value.split_once('@') else {
        return value.to_string();
    };
    let local_keep: String = local.chars().take(2).collect();
    let (domain_name, tld) = domain.rsplit_once('.').unwrap_or((domain, ""));
    let domain_keep: String = domain_name.chars().take(2).collect();
    let pad = mask.to_string().repeat(3);
    if tld.is_empty() {
        format!("{local_keep}{pad}@{domain_keep}{pad}")
    } else {
        format!("{local_keep}{pad}@{domain_keep}{pad}.{tld}")
    }
}

/// Sort by start then by longest, then drop every match that begins inside
/// an already accepted one.
fn resolve_overlaps(mut matches: Vec<PiiMatch>) -> Vec<PiiMatch> {
    matches.sort_by_key(|m| (m.start, Reverse(m.end - m.start)));
    let mut result: Vec<PiiMatch> = Vec::with_capacity(matches.len());
    let mut running_end = 0usize;
    for m in matches {
        if m.start < running_end && !result.is_empty() {
            continue;
        }
        running_end = m.end;
        result.push(m);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn token() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn token_strategy_replaces_common_pii() {
        let masker = PiiMasker::with_defaults();
        let result = masker
            .mask("Contact: test@example.com or call 010-1234-5678", &token())
            .await
            .unwrap();
        assert_eq!(result.masked_text, "Contact: [EMAIL] or call [PHONE]");

        let counts = result.count_by_type();
        assert_eq!(counts.get(&PiiType::Email), Some(&1));
        assert_eq!(counts.get(&PiiType::Phone), Some(&1));
        assert!(result.summary().contains("2 PII item(s)"));
    }

    #[tokio::test]
    async fn no_pii_summary() {
        let masker = PiiMasker::with_defaults();
        let result = masker.mask("Nothing sensitive here.", &token()).await.unwrap();
        assert_eq!(result.masked_text, "Nothing sensitive here.");
        assert_eq!(result.summary(), "No PII detected.");
    }

    #[tokio::test]
    async fn asterisk_strategy_preserves_length() {
        let options = PiiMaskingOptions {
            strategy: MaskingStrategy::Asterisk,
            ..PiiMaskingOptions::common()
        };
        let masker = PiiMasker::new(options);
        let result = masker.mask("mail me: a.user@site.com", &token()).await.unwrap();
        assert!(result.masked_text.contains(&"*".repeat("a.user@site.com".len())));
    }

    #[tokio::test]
    async fn partial_strategy_keeps_email_shape() {
        let options = PiiMaskingOptions {
            strategy: MaskingStrategy::Partial,
            ..PiiMaskingOptions::common()
        };
        let masker = PiiMasker::new(options);
        let result = masker.mask("write test@example.com", &token()).await.unwrap();
        assert_eq!(result.masked_text, "write te***@ex***.com");
    }

    #[tokio::test]
    async fn partial_strategy_keeps_last_four_phone_digits() {
        let options = PiiMaskingOptions {
            strategy: MaskingStrategy::Partial,
            ..PiiMaskingOptions::common()
        };
        let masker = PiiMasker::new(options);
        let result = masker.mask("call 010-1234-5678", &token()).await.unwrap();
        assert_eq!(result.masked_text, "call ***-****-5678");
    }

    #[tokio::test]
    async fn hash_strategy_is_deterministic() {
        let options = PiiMaskingOptions {
            strategy: MaskingStrategy::Hash,
            ..PiiMaskingOptions::common()
        };
        let masker = PiiMasker::new(options);
        let first = masker.mask("test@example.com", &token()).await.unwrap();
        let second = masker.mask("test@example.com", &token()).await.unwrap();
        assert_eq!(first.masked_text, second.masked_text);
        assert!(first.masked_text.starts_with("[HASH:"));
        assert_eq!(first.masked_text.len(), "[HASH:12345678]".len());
    }

    #[tokio::test]
    async fn remove_strategy_deletes_spans() {
        let options = PiiMaskingOptions {
            strategy: MaskingStrategy::Remove,
            ..PiiMaskingOptions::common()
        };
        let masker = PiiMasker::new(options);
        let result = masker.mask("id test@example.com end", &token()).await.unwrap();
        assert_eq!(result.masked_text, "id  end");
    }

    #[tokio::test]
    async fn national_ids_join_via_language_codes() {
        let options = PiiMaskingOptions::with_national_ids(["ko"]);
        let masker = PiiMasker::new(options);
        let matches = masker
            .detect("주민등록번호: 900101-1234567", &token())
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].pii_type, PiiType::NationalId);
        assert!(matches[0].confidence >= 0.7);
    }

    #[tokio::test]
    async fn auto_language_selects_all_national_detectors() {
        let options = PiiMaskingOptions::with_national_ids(["auto"]);
        let masker = PiiMasker::new(options);
        let matches = masker
            .detect("RRN 900101-1234568 and DNI 12345678Z", &token())
            .await
            .unwrap();
        assert!(matches.len() >= 2);
    }

    #[tokio::test]
    async fn overlapping_matches_keep_the_longest() {
        let kept = resolve_overlaps(vec![
            PiiMatch::new(PiiType::Phone, "123-456-7890".to_string(), 10, 0.9),
            PiiMatch::new(PiiType::Custom, "123-456".to_string(), 10, 0.9),
            PiiMatch::new(PiiType::Custom, "456-7890".to_string(), 14, 0.9),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].value, "123-456-7890");
    }

    #[tokio::test]
    async fn low_confidence_matches_are_discarded() {
        let options = PiiMaskingOptions {
            min_confidence: 0.92,
            ..PiiMaskingOptions::common()
        };
        let masker = PiiMasker::new(options);
        // A .xyz email scores well below 0.92.
        let matches = masker.detect("user@host.xyz", &token()).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn parallel_detection_matches_sequential() {
        let text = format!(
            "{} test@example.com and 010-1234-5678 plus 192.168.0.1",
            "padding ".repeat(10)
        );
        let sequential = PiiMasker::with_defaults()
            .detect(&text, &token())
            .await
            .unwrap();
        let options = PiiMaskingOptions {
            enable_parallel_processing: true,
            parallel_threshold: 1,
            ..PiiMaskingOptions::common()
        };
        let parallel = PiiMasker::new(options).detect(&text, &token()).await.unwrap();
        let key = |ms: &[PiiMatch]| {
            ms.iter()
                .map(|m| (m.pii_type, m.start, m.end))
                .collect::<Vec<_>>()
        };
        assert_eq!(key(&sequential), key(&parallel));
    }

    #[tokio::test]
    async fn custom_detectors_participate() {
        struct BadgeDetector {
            pattern: Regex,
        }
        impl PiiDetector for BadgeDetector {
            fn pii_type(&self) -> PiiType {
                PiiType::Custom
            }
            fn pattern(&self) -> &Regex {
                &self.pattern
            }
            fn validate(&self, _value: &str) -> (bool, f32) {
                (true, 0.9)
            }
        }

        let mut masker = PiiMasker::new(PiiMaskingOptions::default());
        masker.register_detector(Arc::new(BadgeDetector {
            pattern: Regex::new(r"EMP-\d{5}").unwrap(),
        }));
        let result = masker.mask("badge EMP-12345 active", &token()).await.unwrap();
        assert_eq!(result.masked_text, "badge [PII] active");
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        let masker = PiiMasker::with_defaults();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = masker.mask("test@example.com", &cancel).await;
        assert!(matches!(result, Err(PreprocessError::Cancelled)));
    }
}
