//! Language-aware chunking engine for RAG preprocessing.
//!
//! Splits raw text into [`textflow_models::Chunk`] sequences using one of
//! five strategies (sentence, paragraph, token, hierarchical, semantic),
//! balances the result toward a configured size window, and cleans noisy
//! extraction artifacts with a deterministic refiner.

pub mod balancer;
pub mod embedder;
pub mod language;
pub mod refine;
pub mod strategies;

pub use balancer::ChunkBalancer;
pub use embedder::Embedder;
pub use language::{registry, LanguageProfile};
pub use refine::TextRefiner;
pub use strategies::{Chunker, ChunkerFactory};
