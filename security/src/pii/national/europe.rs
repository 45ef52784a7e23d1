use lazy_static::lazy_static;
use regex::Regex;

use textflow_models::PiiType;

use super::NationalIdDetector;
use crate::pii::checksum::{extract_digits, mod97_key};
use crate::pii::PiiDetector;

lazy_static! {
    static ref NINO: Regex =
        Regex::new(r"\b[A-Za-z]{2}\s?\d{2}\s?\d{2}\s?\d{2}\s?[A-Da-d]\b").unwrap();
    static ref STEUER_ID: Regex = Regex::new(r"\b\d{11}\b").unwrap();
    static ref INSEE: Regex =
        Regex::new(r"\b[12]\s?\d{2}\s?\d{2}\s?\d{2}\s?\d{3}\s?\d{3}\s?\d{2}\b").unwrap();
    static ref DNI: Regex = Regex::new(r"\b(?:\d{8}|[XYZxyz]\d{7})[A-Za-z]\b").unwrap();
    static ref CODICE_FISCALE: Regex =
        Regex::new(r"\b[A-Za-z]{6}\d{2}[A-Za-z]\d{2}[A-Za-z]\d{3}[A-Za-z]\b").unwrap();
}

/// UK national insurance number: prefix allowlist, no check digit.
pub struct UkNinoDetector;

impl UkNinoDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PiiDetector for UkNinoDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &NINO
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let compact: String = value
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        if compact.len() != 9 {
            return (false, 0.0);
        }
        let first = compact.as_bytes()[0] as char;
        let second = compact.as_bytes()[1] as char;
        const EXCLUDED_FIRST: &[char] = &['D', 'F', 'I', 'Q', 'U', 'V'];
        const EXCLUDED_SECOND: &[char] = &['D', 'F', 'I', 'Q', 'U', 'V', 'O'];
        const EXCLUDED_PREFIXES: &[&str] = &["BG", "GB", "NK", "KN", "TN", "NT", "ZZ"];

        let prefix = &compact[..2];
        if EXCLUDED_FIRST.contains(&first)
            || EXCLUDED_SECOND.contains(&second)
            || EXCLUDED_PREFIXES.contains(&prefix)
        {
            (false, 0.30)
        } else {
            (true, 0.90)
        }
    }
}

impl NationalIdDetector for UkNinoDetector {
    fn language_code(&self) -> &'static str {
        "en-GB"
    }

    fn national_id_type(&self) -> &'static str {
        "NINO"
    }

    fn country_name(&self) -> &'static str {
        "United Kingdom"
    }

    fn format_description(&self) -> &'static str {
        "Two prefix letters, six digits, suffix A-D"
    }
}

/// German tax identification number: digit-frequency rule plus an iterative
/// product-10 check digit.
pub struct GermanySteuerIdDetector;

impl GermanySteuerIdDetector {
    pub fn new() -> Self {
        Self
    }

    fn check_digit(digits: &[u8]) -> u8 {
        let mut product = 10u32;
        for &d in digits {
            let mut sum = (d as u32 + product) % 10;
            if sum == 0 {
                sum = 10;
            }
            product = (sum * 2) % 11;
        }
        let check = 11 - product;
        if check == 10 {
            0
        } else {
            check as u8
        }
    }
}

impl PiiDetector for GermanySteuerIdDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &STEUER_ID
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if digits.len() != 11 || digits[0] == 0 {
            return (false, 0.0);
        }
        // Among the first ten digits exactly one value appears two or three
        // times; everything else appears at most once.
        let mut counts = [0u8; 10];
        for &d in &digits[..10] {
            counts[d as usize] += 1;
        }
        let repeated: Vec<u8> = counts.iter().copied().filter(|&c| c >= 2).collect();
        if repeated.len() != 1 || repeated[0] > 3 {
            return (false, 0.30);
        }

        if Self::check_digit(&digits[..10]) == digits[10] {
            (true, 0.95)
        } else {
            (true, 0.40)
        }
    }
}

impl NationalIdDetector for GermanySteuerIdDetector {
    fn language_code(&self) -> &'static str {
        "de"
    }

    fn national_id_type(&self) -> &'static str {
        "SteuerId"
    }

    fn country_name(&self) -> &'static str {
        "Germany"
    }

    fn format_description(&self) -> &'static str {
        "11 digits, frequency rule and product-10 check digit"
    }
}

/// French INSEE number: 13 digits plus a Mod-97 key.
pub struct FranceInseeDetector;

impl FranceInseeDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PiiDetector for FranceInseeDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &INSEE
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let digits = extract_digits(value);
        if digits.len() != 15 {
            return (false, 0.0);
        }
        let first13: u64 = digits[..13].iter().fold(0u64, |acc, &d| acc * 10 + d as u64);
        let key: u64 = digits[13] as u64 * 10 + digits[14] as u64;
        let month = digits[3] as u32 * 10 + digits[4] as u32;
        // Months 20+ encode unknown birth dates; 1-12 are ordinary births.
        let month_plausible = (1..=12).contains(&month) || (20..=42).contains(&month);

        if mod97_key(first13) == key {
            if month_plausible {
                (true, 0.95)
            } else {
                (true, 0.70)
            }
        } else {
            (true, 0.40)
        }
    }
}

impl NationalIdDetector for FranceInseeDetector {
    fn language_code(&self) -> &'static str {
        "fr"
    }

    fn national_id_type(&self) -> &'static str {
        "INSEE"
    }

    fn country_name(&self) -> &'static str {
        "France"
    }

    fn format_description(&self) -> &'static str {
        "15 digits: SYYMMDDDDDCCCOO plus 97-complement key"
    }
}

const DNI_LETTERS: &[u8] = b"TRWAGMYFPDXBNJZSQVHLCKE";

/// Spanish DNI and NIE: the final letter is the number mod 23.
pub struct SpainDniDetector;

impl SpainDniDetector {
    pub fn new() -> Self {
        Self
    }
}

impl PiiDetector for SpainDniDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &DNI
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let upper = value.to_uppercase();
        let (number_part, letter) = upper.split_at(upper.len() - 1);
        let letter = letter.as_bytes()[0];

        // NIE prefixes map X/Y/Z onto a leading digit.
        let normalized: String = match number_part.as_bytes()[0] {
            b'X' => format!("0{}", &number_part[1..]),
            b'Y' => format!("1{}", &number_part[1..]),
            b'Z' => format!("2{}", &number_part[1..]),
            _ => number_part.to_string(),
        };
        let Ok(number) = normalized.parse::<u32>() else {
            return (false, 0.0);
        };

        if DNI_LETTERS[(number % 23) as usize] == letter {
            (true, 0.95)
        } else {
            (true, 0.40)
        }
    }
}

impl NationalIdDetector for SpainDniDetector {
    fn language_code(&self) -> &'static str {
        "es"
    }

    fn national_id_type(&self) -> &'static str {
        "DNI"
    }

    fn country_name(&self) -> &'static str {
        "Spain"
    }

    fn format_description(&self) -> &'static str {
        "8 digits (or X/Y/Z + 7) plus control letter, number mod 23"
    }
}

// Per-position values for the odd (1st, 3rd, ...) characters of a codice
// fiscale, indexed 0-9 then A-Z.
const CF_ODD_DIGITS: [u32; 10] = [1, 0, 5, 7, 9, 13, 15, 17, 19, 21];
const CF_ODD_LETTERS: [u32; 26] = [
    1, 0, 5, 7, 9, 13, 15, 17, 19, 21, 2, 4, 18, 20, 11, 3, 6, 8, 12, 14, 16, 10, 22, 25, 24, 23,
];

/// Italian codice fiscale: 15 data characters plus a check letter computed
/// from per-position odd/even tables.
pub struct ItalyCodiceFiscaleDetector;

impl ItalyCodiceFiscaleDetector {
    pub fn new() -> Self {
        Self
    }

    fn char_value(ch: u8, odd_position: bool) -> Option<u32> {
        match (ch, odd_position) {
            (b'0'..=b'9', true) => Some(CF_ODD_DIGITS[(ch - b'0') as usize]),
            (b'A'..=b'Z', true) => Some(CF_ODD_LETTERS[(ch - b'A') as usize]),
            (b'0'..=b'9', false) => Some((ch - b'0') as u32),
            (b'A'..=b'Z', false) => Some((ch - b'A') as u32),
            _ => None,
        }
    }
}

impl PiiDetector for ItalyCodiceFiscaleDetector {
    fn pii_type(&self) -> PiiType {
        PiiType::NationalId
    }

    fn pattern(&self) -> &Regex {
        &CODICE_FISCALE
    }

    fn validate(&self, value: &str) -> (bool, f32) {
        let upper = value.to_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() != 16 {
            return (false, 0.0);
        }

        let mut sum = 0u32;
        for (i, &ch) in bytes[..15].iter().enumerate() {
            // The standard numbers positions from 1, so even indices here
            // are odd positions.
            let Some(v) = Self::char_value(ch, i % 2 == 0) else {
                return (false, 0.0);
            };
            sum += v;
        }
        let check = b'A' + (sum % 26) as u8;
        if check == bytes[15] {
            (true, 0.95)
        } else {
            (true, 0.40)
        }
    }
}

impl NationalIdDetector for ItalyCodiceFiscaleDetector {
    fn language_code(&self) -> &'static str {
        "it"
    }

    fn national_id_type(&self) -> &'static str {
        "CodiceFiscale"
    }

    fn country_name(&self) -> &'static str {
        "Italy"
    }

    fn format_description(&self) -> &'static str {
        "16 alphanumeric characters with odd/even table check letter"
    }
}
