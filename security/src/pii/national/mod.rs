mod americas;
mod asia;
mod europe;
mod korea;
mod oceania;

pub use americas::{BrazilCpfDetector, CanadaSinDetector, UsSsnDetector};
pub use asia::{ChinaIdCardDetector, IndiaAadhaarDetector, JapanMyNumberDetector};
pub use europe::{
    FranceInseeDetector, GermanySteuerIdDetector, ItalyCodiceFiscaleDetector, SpainDniDetector,
    UkNinoDetector,
};
pub use korea::KoreaRrnDetector;
pub use oceania::AustraliaTfnDetector;

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::PiiDetector;

/// The sentinel language selecting every registered detector.
pub const AUTO_LANGUAGE: &str = "auto";

/// A country-specific national-ID detector.
///
/// Beyond the base pattern + validator, each carries the descriptive fields
/// used for registry lookup and reporting.
pub trait NationalIdDetector: PiiDetector {
    /// ISO 639-1 code or IETF tag, e.g. "ko" or "en-US"
    fn language_code(&self) -> &'static str;
    fn national_id_type(&self) -> &'static str;
    fn country_name(&self) -> &'static str;
    fn format_description(&self) -> &'static str;
}

static GLOBAL: Lazy<NationalIdRegistry> = Lazy::new(NationalIdRegistry::with_builtins);

/// The process-wide registry, pre-loaded with the 13 built-in detectors.
pub fn national_id_registry() -> &'static NationalIdRegistry {
    &GLOBAL
}

/// Maps language code to detector. Registration is idempotent; lookup tries
/// the exact code, then strips the region subtag (`ko-KR` -> `ko`).
pub struct NationalIdRegistry {
    detectors: DashMap<String, Arc<dyn NationalIdDetector>>,
}

impl NationalIdRegistry {
    pub fn new() -> Self {
        Self {
            detectors: DashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(KoreaRrnDetector::new()));
        registry.register(Arc::new(UsSsnDetector::new()));
        registry.register(Arc::new(UkNinoDetector::new()));
        registry.register(Arc::new(JapanMyNumberDetector::new()));
        registry.register(Arc::new(ChinaIdCardDetector::new()));
        registry.register(Arc::new(GermanySteuerIdDetector::new()));
        registry.register(Arc::new(FranceInseeDetector::new()));
        registry.register(Arc::new(SpainDniDetector::new()));
        registry.register(Arc::new(BrazilCpfDetector::new()));
        registry.register(Arc::new(ItalyCodiceFiscaleDetector::new()));
        registry.register(Arc::new(IndiaAadhaarDetector::new()));
        registry.register(Arc::new(CanadaSinDetector::new()));
        registry.register(Arc::new(AustraliaTfnDetector::new()));
        registry
    }

    pub fn register(&self, detector: Arc<dyn NationalIdDetector>) {
        self.detectors
            .entry(detector.language_code().to_string())
            .or_insert(detector);
    }

    pub fn get(&self, language_code: &str) -> Option<Arc<dyn NationalIdDetector>> {
        if let Some(detector) = self.detectors.get(language_code) {
            return Some(Arc::clone(&detector));
        }
        let base = language_code.split('-').next().unwrap_or(language_code);
        if base != language_code {
            if let Some(detector) = self.detectors.get(base) {
                return Some(Arc::clone(&detector));
            }
        }
        None
    }

    pub fn all(&self) -> Vec<Arc<dyn NationalIdDetector>> {
        self.detectors.iter().map(|e| Arc::clone(&e)).collect()
    }

    /// Detectors for a language selection; `"auto"` returns all of them.
    pub fn for_language(&self, language_code: &str) -> Vec<Arc<dyn NationalIdDetector>> {
        if language_code == AUTO_LANGUAGE {
            return self.all();
        }
        self.get(language_code).into_iter().collect()
    }

    pub fn registered_codes(&self) -> Vec<String> {
        self.detectors.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for NationalIdRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Gregorian month/day check shared by the date-bearing schemes.
pub(crate) fn valid_month_day(month: u32, day: u32) -> bool {
    const DAYS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    (1..=12).contains(&month) && day >= 1 && day <= DAYS[(month - 1) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_covers_thirteen_countries() {
        let registry = NationalIdRegistry::with_builtins();
        assert_eq!(registry.all().len(), 13);
        assert_eq!(registry.for_language(AUTO_LANGUAGE).len(), 13);
    }

    #[test]
    fn lookup_strips_region_subtags() {
        let registry = national_id_registry();
        let detector = registry.get("ko-KR").expect("korean detector");
        assert_eq!(detector.language_code(), "ko");
        // Exact regional tags still resolve directly.
        assert!(registry.get("en-US").is_some());
        assert!(registry.get("xx").is_none());
    }

    #[test]
    fn registration_is_idempotent() {
        let registry = NationalIdRegistry::with_builtins();
        let before = registry.all().len();
        registry.register(Arc::new(KoreaRrnDetector::new()));
        assert_eq!(registry.all().len(), before);
    }

    #[test]
    fn month_day_validation() {
        assert!(valid_month_day(2, 29));
        assert!(!valid_month_day(2, 30));
        assert!(!valid_month_day(13, 1));
        assert!(!valid_month_day(4, 31));
        assert!(!valid_month_day(1, 0));
    }
}
