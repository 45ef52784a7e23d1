use thiserror::Error;

/// Errors surfaced by the preprocessing core.
///
/// Empty input is never an error: public entry points accept empty strings
/// and return empty results.
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Chunking strategy not available: {0}")]
    StrategyUnavailable(String),

    #[error("Embedder failed: {0}")]
    EmbedderFailed(String),

    #[error("Operation was cancelled")]
    Cancelled,
}
