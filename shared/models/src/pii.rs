use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Categories of personally identifiable information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    Email,
    Phone,
    CreditCard,
    BankAccount,
    Passport,
    DriversLicense,
    IpAddress,
    Url,
    PersonName,
    Address,
    NationalId,
    TaxId,
    SocialSecurityNumber,
    Custom,
}

impl PiiType {
    /// Human-readable label used in summaries ("Detected 2 PII item(s): 1 Email, …")
    pub fn label(&self) -> &'static str {
        match self {
            PiiType::Email => "Email",
            PiiType::Phone => "Phone",
            PiiType::CreditCard => "CreditCard",
            PiiType::BankAccount => "BankAccount",
            PiiType::Passport => "Passport",
            PiiType::DriversLicense => "DriversLicense",
            PiiType::IpAddress => "IPAddress",
            PiiType::Url => "URL",
            PiiType::PersonName => "PersonName",
            PiiType::Address => "Address",
            PiiType::NationalId => "NationalId",
            PiiType::TaxId => "TaxId",
            PiiType::SocialSecurityNumber => "SocialSecurityNumber",
            PiiType::Custom => "Custom",
        }
    }

    /// Uppercase tag used by the Token masking strategy, e.g. `[EMAIL]`
    pub fn token_tag(&self) -> &'static str {
        match self {
            PiiType::Email => "EMAIL",
            PiiType::Phone => "PHONE",
            PiiType::CreditCard => "CREDIT_CARD",
            PiiType::BankAccount => "BANK_ACCOUNT",
            PiiType::Passport => "PASSPORT",
            PiiType::DriversLicense => "DRIVERS_LICENSE",
            PiiType::IpAddress => "IP",
            PiiType::Url => "URL",
            PiiType::PersonName => "NAME",
            PiiType::Address => "ADDRESS",
            PiiType::NationalId => "NATIONAL_ID",
            PiiType::TaxId => "TAX_ID",
            PiiType::SocialSecurityNumber => "SSN",
            PiiType::Custom => "PII",
        }
    }
}

/// A single PII occurrence inside the scanned text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiMatch {
    #[serde(rename = "type")]
    pub pii_type: PiiType,
    /// Original matched value
    pub value: String,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked_value: Option<String>,
}

impl PiiMatch {
    pub fn new(pii_type: PiiType, value: String, start: usize, confidence: f32) -> Self {
        let end = start + value.len();
        Self {
            pii_type,
            value,
            start,
            end,
            confidence,
            masked_value: None,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// How detected PII is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskingStrategy {
    /// `[EMAIL]`, `[PHONE]`, … or a custom mapping
    Token,
    /// Same-length run of `mask_char`
    Asterisk,
    /// Same-length run of 'X'
    Character,
    /// Fixed `[REDACTED]`
    Redact,
    /// Type-specific partial reveal (email prefix, phone last four)
    Partial,
    /// `[HASH:xxxxxxxx]`, deterministic across runs
    Hash,
    /// Delete the span
    Remove,
}

/// Configuration for a masking run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiMaskingOptions {
    pub strategy: MaskingStrategy,
    /// Which global detector types run; empty means all registered
    pub types_to_mask: Vec<PiiType>,
    /// National-ID detectors to include; `"auto"` selects all
    pub language_codes: Vec<String>,
    pub mask_char: char,
    /// Leading characters preserved by the Partial strategy
    pub partial_preserve_count: usize,
    /// Overrides for the Token strategy, e.g. Email -> "[MAIL]"
    #[serde(default)]
    pub custom_tokens: HashMap<PiiType, String>,
    /// Matches below this confidence are discarded
    pub min_confidence: f32,
    pub enable_parallel_processing: bool,
    /// Input length (chars) above which detectors may run concurrently
    pub parallel_threshold: usize,
}

impl Default for PiiMaskingOptions {
    fn default() -> Self {
        Self {
            strategy: MaskingStrategy::Token,
            types_to_mask: Vec::new(),
            language_codes: Vec::new(),
            mask_char: '*',
            partial_preserve_count: 2,
            custom_tokens: HashMap::new(),
            min_confidence: 0.5,
            enable_parallel_processing: false,
            parallel_threshold: 10_000,
        }
    }
}

impl PiiMaskingOptions {
    /// The common contact-data set: email, phone, credit card, IP, URL
    pub fn common() -> Self {
        Self {
            types_to_mask: vec![
                PiiType::Email,
                PiiType::Phone,
                PiiType::CreditCard,
                PiiType::IpAddress,
                PiiType::Url,
            ],
            ..Default::default()
        }
    }

    /// Common set plus the national-ID detectors for the given languages
    pub fn with_national_ids<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut opts = Self::common();
        opts.types_to_mask.push(PiiType::NationalId);
        opts.language_codes = codes.into_iter().map(Into::into).collect();
        opts
    }
}

/// Outcome of a masking run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingResult {
    pub original_text: String,
    pub masked_text: String,
    /// Surviving matches, sorted by start offset, each carrying its masked value
    pub matches: Vec<PiiMatch>,
    pub options: PiiMaskingOptions,
    pub processed_at: DateTime<Utc>,
}

impl MaskingResult {
    pub fn count_by_type(&self) -> HashMap<PiiType, usize> {
        let mut counts = HashMap::new();
        for m in &self.matches {
            *counts.entry(m.pii_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        if self.matches.is_empty() {
            return "No PII detected.".to_string();
        }
        let counts = self.count_by_type();
        let mut parts: Vec<(PiiType, usize)> = counts.into_iter().collect();
        parts.sort_by_key(|(t, _)| t.label());
        let listing = parts
            .iter()
            .map(|(t, n)| format!("{} {}", n, t.label()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Detected {} PII item(s): {}", self.matches.len(), listing)
    }
}
