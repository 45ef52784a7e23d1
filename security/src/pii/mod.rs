pub mod checksum;
pub mod detectors;
pub mod masker;
pub mod national;

use regex::Regex;
use textflow_models::{PiiMatch, PiiType};

/// A PII detector: a compiled pattern plus a validator that decides whether
/// a candidate is reportable and how confident the detection is.
pub trait PiiDetector: Send + Sync {
    fn pii_type(&self) -> PiiType;

    fn pattern(&self) -> &Regex;

    /// `(reportable, confidence)`. Checksum failures on otherwise
    /// well-formed national IDs stay reportable at reduced confidence.
    fn validate(&self, value: &str) -> (bool, f32);

    fn detect(&self, text: &str) -> Vec<PiiMatch> {
        let mut matches = Vec::new();
        for m in self.pattern().find_iter(text) {
            let (reportable, confidence) = self.validate(m.as_str());
            if reportable {
                matches.push(PiiMatch::new(
                    self.pii_type(),
                    m.as_str().to_string(),
                    m.start(),
                    confidence,
                ));
            }
        }
        matches
    }
}
