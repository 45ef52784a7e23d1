mod builtin;
mod korean;
mod profile;
mod registry;

pub use korean::KoreanProfile;
pub use profile::{BasicProfile, LanguageProfile};
pub use registry::LanguageRegistry;

/// The process-wide language registry, pre-loaded with the built-in profiles.
pub fn registry() -> &'static LanguageRegistry {
    registry::global()
}
