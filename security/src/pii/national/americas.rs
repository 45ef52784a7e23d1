use lazy_static::lazy_static;
use regex::Regex;

use textflow_models::PiiType;

use super::NationalIdDetector;
use crate::pii::checksum::{extract_digits, luhn};
use crate::pii::PiiDetector;

lazy_static! {
    static ref SSN: Regex = Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap();
    static ref SIN: Regex = Regex::new(r"\b\d{3}[-\s]?\d{3}[-\s]?\d{3}\b").unwrap();
    static ref CPF: Regex = Regex::new(r"\b\d{3}\.?\d{3}\.?\d{3}-?\d{2}\b").unwrap();
}

/// Known published test SSNs that must never validate.
const TEST_SSNS: &[&str] = &["078051120", "219099999", "457555462"];

/// US social security number: structural rules only, no checksum exists.
pub struct UsSsnDetector;

impl UsSsnDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PiiDetector for UsSsnDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &SSN
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if digits.len() != 9 {
            return (false, 0.0);
        }
        let normalized: String = digits.iter().map(|d| (d + b'0') as char).collect();
        let area: u32 = normalized[..3].parse().expect("three digits");
        let group: u32 = normalized[3..5].parse().expect("two digits");
        let serial: u32 = normalized[5..].parse().expect("four digits");

        let invalid = area == 0
            || area == 666
            || (900..=999).contains(&area)
            || group == 0
            || serial == 0
            || TEST_SSNS.contains(&normalized.as_str());
        if invalid {
            (false, 0.20)
        } else {
            (true, 0.90)
        }
    }
}

impl NationalIdDetector for UsSsnDetector {
    fn language_code(&self) -> &'static str {
        "en-US"
    }

    fn national_id_type(&self) -> &'static str {
        "SSN"
    }

    fn country_name(&self) -> &'static str {
        "United States"
    }

    fn format_description(&self) -> &'static str {
        "AAA-GG-SSSS, area/group/serial rules, no check digit"
    }
}

/// Canadian social insurance number: Luhn-checked, first digit restricted.
pub struct CanadaSinDetector;

impl CanadaSinDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PiiDetector for CanadaSinDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &SIN
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if digits.len() != 9 {
            return (false, 0.0);
        }
        // 0 and 8 are unassigned leading digits.
        if digits[0] == 0 || digits[0] == 8 {
            return (false, 0.20);
        }
        if !luhn(&digits) {
            return (true, 0.40);
        }
        // 9 marks a temporary resident's SIN, still a valid number.
        if digits[0] == 9 {
            (true, 0.90)
        } else {
            (true, 0.95)
        }
    }
}

impl NationalIdDetector for CanadaSinDetector {
    fn language_code(&self) -> &'static str {
        "en-CA"
    }

    fn national_id_type(&self) -> &'static str {
        "SIN"
    }

    fn country_name(&self) -> &'static str {
        "Canada"
    }

    fn format_description(&self) -> &'static str {
        "9 digits, Luhn check, leading digit not 0 or 8"
    }
}

/// Brazilian CPF: two Mod-11 check digits.
pub struct BrazilCpfDetector;

impl BrazilCpfDetector {
    pub fn new() -> Self {
        Self
    }

    fn check_digit(digits: &[u8], initial_weight: u32) -> u8 {
        let sum: u32 = digits
            .iter()
            .enumerate()
            .map(|(i, &d)| d as u32 * (initial_weight - i as u32))
            .sum();
        let remainder = sum % 11;
        if remainder < 2 {
            0
        } else {
            (11 - remainder) as u8
        }
    }
}

impl PiiDetector for BrazilCpfDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &CPF
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if digits.len() != 11 {
            return (false, 0.0);
        }
        if digits.windows(2).all(|w| w[0] == w[1]) {
            // 111.111.111-11 and friends are canonical fakes.
            return (false, 0.10);
        }
        let c1 = Self::check_digit(&digits[..9], 10);
        let c2 = Self::check_digit(&digits[..10], 11);
        if c1 == digits[9] && c2 == digits[10] {
            (true, 0.95)
        } else {
            (true, 0.40)
        }
    }
}

impl NationalIdDetector for BrazilCpfDetector {
    fn language_code(&self) -> &'static str {
        "pt-BR"
    }

    fn national_id_type(&self) -> &'static str {
        "CPF"
    }

    fn country_name(&self) -> &'static str {
        "Brazil"
    }

    fn format_description(&self) -> &'static str {
        "NNN.NNN.NNN-CC, two Mod-11 check digits"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plausible_ssn_validates() {
        let detector = UsSsnDetector::new();
        let (ok, conf) = detector.validate("123-45-6789");
        assert!(ok);
        assert!(conf >= 0.9);
    }

    #[test]
    fn reserved_ssn_areas_are_rejected() {
        let detector = UsSsnDetector::new();
        for fake in ["000-12-3456", "666-12-3456", "900-12-3456", "078-05-1120"] {
            let (ok, conf) = detector.validate(fake);
            assert!(!ok, "{fake} should not validate");
            assert!(conf <= 0.5);
        }
    }

    #[test]
    fn canadian_sin_luhn() {
        let detector = CanadaSinDetector::new();
        // Leading zero is unassigned even though the number is Luhn-valid.
        let (ok, _) = detector.validate("046-454-286");
        assert!(!ok);

        let (ok, conf) = detector.validate("130-692-544");
        assert!(ok);
        assert!(conf >= 0.9);

        let (ok, conf) = detector.validate("130-692-545");
        assert!(ok);
        assert!(conf <= 0.5);
    }

    #[test]
    fn brazilian_cpf_check_digits() {
        let detector = BrazilCpfDetector::new();
        let (ok, conf) = detector.validate("111.444.777-35");
        assert!(ok);
        assert!(conf >= 0.9);

        let (ok, conf) = detector.validate("111.444.777-36");
        assert!(ok);
        assert!(conf <= 0.5);

        let (ok, _) = detector.validate("111.111.111-11");
        assert!(!ok);
    }
}
