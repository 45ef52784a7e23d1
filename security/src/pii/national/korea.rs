use lazy_static::lazy_static;
use regex::Regex;

use textflow_models::PiiType;

use super::{valid_month_day, NationalIdDetector};
use crate::pii::checksum::extract_digits;
use crate::pii::PiiDetector;

lazy_static! {
    static ref RRN: Regex = Regex::new(r"\b\d{6}[-\s]?\d{7}\b").unwrap();
}

const WEIGHTS: [u32; 12] = [2, 3, 4, 5, 6, 7, 8, 9, 2, 3, 4, 5];

/// Korean resident registration number (주민등록번호): YYMMDD-GNNNNNNC.
///
/// Date and gender digit are validated structurally; the Mod-11 checksum
/// then decides between high and reduced confidence. A failing checksum on
/// an otherwise plausible number is still reported as PII.
pub struct KoreaRrnDetector;

impl KoreaRrnDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KoreaRrnDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiDetector for KoreaRrnDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &RRN
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if digits.len() != 13 {
            return (false, 0.0);
        }

        let month = digits[2] as u32 * 10 + digits[3] as u32;
        let day = digits[4] as u32 * 10 + digits[5] as u32;
        // Gender/century digit: 1-4 for citizens, 5-8 for foreign residents.
        let gender = digits[6];
        if !valid_month_day(month, day) || !(1..=8).contains(&gender) {
            return (false, 0.30);
        }

        let sum: u32 = digits[..12]
            .iter()
            .zip(WEIGHTS.iter())
            .map(|(&d, &w)| d as u32 * w)
            .sum();
        let check = ((11 - sum % 11) % 10) as u8;
        if check == digits[12] {
            (true, 0.97)
        } else {
            (true, 0.70)
        }
    }
}

impl NationalIdDetector for KoreaRrnDetector {
    fn language_code(&self) -> &'static str {
        "ko"
    }

    fn national_id_type(&self) -> &'static str {
        "RRN"
    }

    fn country_name(&self) -> &'static str {
        "Korea"
    }

    fn format_description(&self) -> &'static str {
        "YYMMDD-GNNNNNC, 13 digits with Mod-11 check digit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_valid_rrn_scores_high() {
        let detector = KoreaRrnDetector::new();
        let (ok, conf) = detector.validate("900101-1234568");
        assert!(ok);
        assert!(conf >= 0.9);
    }

    #[test]
    fn checksum_failure_with_valid_date_still_reports() {
        let detector = KoreaRrnDetector::new();
        let (ok, conf) = detector.validate("900101-1234567");
        assert!(ok);
        assert!((conf - 0.70).abs() < 1e-6);
    }

    #[test]
    fn impossible_dates_are_rejected() {
        let detector = KoreaRrnDetector::new();
        let (ok, conf) = detector.validate("991332-1234567");
        assert!(!ok);
        assert!(conf <= 0.5);
    }

    #[test]
    fn detects_inside_korean_text() {
        let detector = KoreaRrnDetector::new();
        let text = "주민등록번호: 900101-1234567";
        let matches = detector.detect(text);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].value, "900101-1234567");
        assert_eq!(matches[0].pii_type, PiiType::NationalId);
        assert!(matches[0].confidence >= 0.7);
        assert_eq!(&text[matches[0].start..matches[0].end], matches[0].value);
    }
}
