//! PII detection, masking, and rule-based content filtering.
//!
//! Detectors pair a compiled regex with a validator that calibrates a
//! confidence score; national-ID detectors add country-specific checksum
//! validation. The masker runs detectors, resolves overlapping matches, and
//! rewrites the surviving spans with the configured strategy.

pub mod filter;
pub mod pii;

pub use filter::ContentFilter;
pub use pii::masker::PiiMasker;
pub use pii::national::{national_id_registry, NationalIdDetector, NationalIdRegistry};
pub use pii::PiiDetector;
