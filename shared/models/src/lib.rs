pub mod chunk;
pub mod error;
pub mod filter;
pub mod pii;
pub mod preprocess;
pub mod refine;

pub use chunk::{
    Chunk, ChunkLocation, ChunkMetadata, ChunkOptions, ChunkStats, ChunkStrategy,
};
pub use error::PreprocessError;
pub use filter::{
    ContentFilterMatch, ContentFilterOptions, ContentFilterResult, FilterAction, FilterRule,
};
pub use pii::{MaskingResult, MaskingStrategy, PiiMaskingOptions, PiiMatch, PiiType};
pub use preprocess::{PreprocessOptions, PreprocessResult};
pub use refine::{RefineOptions, RefineResult};
