use lazy_static::lazy_static;
use regex::Regex;

use textflow_models::PiiType;

use super::checksum::{extract_digits, luhn};
use super::PiiDetector;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap();
    // Korean mobile/landline/toll-free, US with or without area parens, and
    // international +CC formats.
    static ref PHONE: Regex = Regex::new(
        r"(?x)
        \+\d{1,3}[-\s]?\d{1,4}[-\s]?\d{3,4}[-\s]?\d{4}
        | 01[016789][-\s]?\d{3,4}[-\s]?\d{4}
        | 0\d{1,2}[-\s]?\d{3,4}[-\s]?\d{4}
        | \(\d{3}\)\s?\d{3}[-\s]?\d{4}
        | \d{3}[-\s]\d{3}[-\s]\d{4}
        ",
    )
    .unwrap();
    static ref CREDIT_CARD: Regex = Regex::new(r"\b\d(?:[ \-]?\d){12,18}\b").unwrap();
    static ref IP_ADDRESS: Regex = Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap();
    static ref URL: Regex = Regex::new(r#"https?://[^\s<>"']+|www\.[^\s<>"']+"#).unwrap();
}

const COMMON_TLDS: &[&str] = &["com", "org", "net", "edu", "gov", "io", "co", "dev", "app"];

/// Email addresses with TLD-calibrated confidence.
pub struct EmailDetector;

impl PiiDetector for EmailDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::Email
    }

    fn pattern(&self) -> &Regex {
        &EMAIL
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let Some((local, domain)) = value.split_once('@') else {
            return (false, 0.0);
        };
        if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
            return (false, 0.0);
        }
        let tld = domain.rsplit('.').next().unwrap_or("").to_lowercase();
        let confidence = if tld == "kr" {
            0.95
        } else if COMMON_TLDS.contains(&tld.as_str()) {
            0.90
        } else if tld.len() == 2 {
            0.70
        } else {
            0.60
        };
        (true, confidence)
    }
}

/// Phone numbers classified by normalized digit prefix and length.
pub struct PhoneDetector;

impl PiiDetector for PhoneDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::Phone
    }

    fn pattern(&self) -> &Regex {
        &PHONE
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if !(8..=15).contains(&digits.len()) {
            return (false, 0.0);
        }
        let normalized: String = digits.iter().map(|d| (d + b'0') as char).collect();

        let confidence = if value.trim_start().starts_with('+') {
            0.90
        } else if normalized.starts_with("01") && (10..=11).contains(&digits.len()) {
            // Korean mobile
            0.95
        } else if normalized.starts_with("080") || normalized.starts_with("070") {
            0.85
        } else if normalized.starts_with('0') && (9..=11).contains(&digits.len()) {
            // Korean landline
            0.80
        } else if digits.len() == 10 {
            // US without country code
            0.85
        } else {
            0.70
        };
        (true, confidence)
    }
}

/// Card numbers: Luhn plus issuer-prefix inspection.
pub struct CreditCardDetector;

impl CreditCardDetector {
    fn has_known_prefix(digits: &[u8]) -> bool {
        let lead: String = digits.iter().take(4).map(|d| (d + b'0') as char).collect();
        let two: u32 = lead[..2].parse().unwrap_or(0);
        let four: u32 = lead.parse().unwrap_or(0);
        digits.first() == Some(&4)
            || (51..=55).contains(&two)
            || (2221..=2720).contains(&four)
            || two == 34
            || two == 37
            || four == 6011
            || two == 65
            || two == 35
            || two == 62
    }
}

impl PiiDetector for CreditCardDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::CreditCard
    }

    fn pattern(&self) -> &Regex {
        &CREDIT_CARD
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if !(13..=19).contains(&digits.len()) {
            return (false, 0.0);
        }
        let prefix = Self::has_known_prefix(&digits);
        let luhn_ok = luhn(&digits);
        match (prefix, luhn_ok) {
            (true, true) => (true, 0.96),
            (true, false) => (true, 0.65),
            (false, true) => (true, 0.70),
            (false, false) => (false, 0.20),
        }
    }
}

/// Dotted-quad IPv4 addresses; octet range checked, fixed confidence.
pub struct IpAddressDetector;

impl PiiDetector for IpAddressDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::IpAddress
    }

    fn pattern(&self) -> &Regex {
        &IP_ADDRESS
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let valid = value
            .split('.')
            .all(|octet| octet.parse::<u32>().map(|n| n <= 255).unwrap_or(false));
        if valid {
            (true, 0.90)
        } else {
            (false, 0.0)
        }
    }
}

/// http(s) and www URLs, pattern-only.
pub struct UrlDetector;

impl PiiDetector for UrlDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::Url
    }

    fn pattern(&self) -> &Regex {
        &URL
    }

    fn validate(&self, _value: &str) -> (bool, f32) {
        (true, 0.85)
    }
}
