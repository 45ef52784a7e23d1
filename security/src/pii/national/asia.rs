use lazy_static::lazy_static;
use regex::Regex;

use textflow_models::PiiType;

use super::{valid_month_day, NationalIdDetector};
use crate::pii::checksum::{extract_digits, iso7064_mod11_2, verhoeff};
use crate::pii::PiiDetector;

lazy_static! {
    static ref MY_NUMBER: Regex = Regex::new(r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}\b").unwrap();
    static ref CHINA_ID: Regex = Regex::new(r"\b\d{17}[0-9Xx]\b").unwrap();
    static ref AADHAAR: Regex = Regex::new(r"\b[2-9]\d{3}[-\s]?\d{4}[-\s]?\d{4}\b").unwrap();
}

const MY_NUMBER_WEIGHTS: [u32; 11] = [6, 5, 4, 3, 2, 7, 6, 5, 4, 3, 2];

/// Japanese My Number: 12 digits with a Mod-11 variant check digit.
pub struct JapanMyNumberDetector;

impl JapanMyNumberDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PiiDetector for JapanMyNumberDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &MY_NUMBER
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if digits.len() != 12 {
            return (false, 0.0);
        }
        let sum: u32 = digits[..11]
            .iter()
            .zip(MY_NUMBER_WEIGHTS.iter())
            .map(|(&d, &w)| d as u32 * w)
            .sum();
        let remainder = sum % 11;
        let check = if remainder <= 1 { 0 } else { 11 - remainder } as u8;
        if check == digits[11] {
            (true, 0.95)
        } else {
            (true, 0.40)
        }
    }
}

impl NationalIdDetector for JapanMyNumberDetector {
    fn language_code(&self) -> &'static str {
        "ja"
    }

    fn national_id_type(&self) -> &'static str {
        "MyNumber"
    }

    fn country_name(&self) -> &'static str {
        "Japan"
    }

    fn format_description(&self) -> &'static str {
        "12 digits with weighted Mod-11 check digit"
    }
}

/// Chinese resident identity card: 18 characters, birthdate plus an
/// ISO 7064 Mod 11-2 check character.
pub struct ChinaIdCardDetector;

impl ChinaIdCardDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PiiDetector for ChinaIdCardDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &CHINA_ID
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let upper = value.to_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() != 18 {
            return (false, 0.0);
        }
        let digits = extract_digits(&upper[..17]);
        if digits.len() != 17 {
            return (false, 0.0);
        }

        let year: u32 = upper[6..10].parse().unwrap_or(0);
        let month: u32 = upper[10..12].parse().unwrap_or(0);
        let day: u32 = upper[12..14].parse().unwrap_or(0);
        let date_ok = (1900..=2100).contains(&year) && valid_month_day(month, day);
        if !date_ok {
            return (false, 0.30);
        }

        if iso7064_mod11_2(&digits) == bytes[17] as char {
            (true, 0.97)
        } else {
            (true, 0.70)
        }
    }
}

impl NationalIdDetector for ChinaIdCardDetector {
    fn language_code(&self) -> &'static str {
        "zh-CN"
    }

    fn national_id_type(&self) -> &'static str {
        "ResidentId"
    }

    fn country_name(&self) -> &'static str {
        "China"
    }

    fn format_description(&self) -> &'static str {
        "17 digits plus ISO 7064 Mod 11-2 check character"
    }
}

/// Indian Aadhaar: 12 digits, Verhoeff-checked, first digit 2-9.
pub struct IndiaAadhaarDetector;

impl IndiaAadhaarDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PiiDetector for IndiaAadhaarDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &AADHAAR
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if digits.len() != 12 || digits[0] < 2 {
            return (false, 0.0);
        }
        if verhoeff(&digits) {
            (true, 0.95)
        } else {
            (true, 0.40)
        }
    }
}

impl NationalIdDetector for IndiaAadhaarDetector {
    fn language_code(&self) -> &'static str {
        "hi"
    }

    fn national_id_type(&self) -> &'static str {
        "Aadhaar"
    }

    fn country_name(&self) -> &'static str {
        "India"
    }

    fn format_description(&self) -> &'static str {
        "12 digits, Verhoeff check, first digit 2-9"
    }
}
