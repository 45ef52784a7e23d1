use lazy_static::lazy_static;
use regex::Regex;

use textflow_models::PiiType;

use super::NationalIdDetector;
use crate::pii::checksum::{extract_digits, weighted_sum};
use crate::pii::PiiDetector;

lazy_static! {
    static ref TFN: Regex = Regex::new(r"\b\d{3}[-\s]?\d{3}[-\s]?\d{3}\b").unwrap();
}

const TFN_WEIGHTS: [u32; 9] = [1, 4, 3, 7, 5, 8, 6, 9, 10];

/// Australian tax file number: weighted sum divisible by 11.
pub struct AustraliaTfnDetector;

impl AustraliaTfnDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PiiDetector for AustraliaTfnDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &TFN
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if digits.len() != 9 {
            return (false, 0.0);
        }
        if weighted_sum(&digits, &TFN_WEIGHTS) % 11 == 0 {
            (true, 0.95)
        } else {
            (true, 0.40)
        }
    }
}

impl NationalIdDetector for AustraliaTfnDetector {
    fn language_code(&self) -> &'static str {
        "en-AU"
    }

    fn national_id_type(&self) -> &'static str {
        "TFN"
    }

    fn country_name(&self) -> &'static str {
        "Australia"
    }

    fn format_description(&self) -> &'static str {
        "9 digits, weighted sum divisible by 11"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tfn_weighted_sum() {
        let detector = AustraliaTfnDetector::new();
        let (ok, conf) = detector.validate("123 456 782");
        assert!(ok);
        assert!(conf >= 0.9);

        let (ok, conf) = detector.validate("123 456 783");
        assert!(ok);
        assert!(conf <= 0.5);
    }
}
