use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use textflow_models::{Chunk, ChunkOptions, ChunkStrategy, PreprocessError};

use super::{
    resolve_profile, Chunker, HierarchicalChunker, ParagraphChunker, SemanticChunker,
    SentenceChunker, TokenChunker,
};
use crate::balancer::ChunkBalancer;
use crate::embedder::Embedder;

type ChunkerCtor = Arc<dyn Fn() -> Arc<dyn Chunker> + Send + Sync>;

/// Registry from strategy tag to chunker constructor.
///
/// Semantic is only registered when an embedder is supplied; requesting it
/// otherwise fails with `StrategyUnavailable`. `Auto` resolves to Sentence.
pub struct ChunkerFactory {
    constructors: DashMap<ChunkStrategy, ChunkerCtor>,
}

impl ChunkerFactory {
    pub fn new() -> Self {
        let factory = Self {
            constructors: DashMap::new(),
        };
        factory.register(
            ChunkStrategy::Sentence,
            Arc::new(|| Arc::new(SentenceChunker) as Arc<dyn Chunker>),
        );
        factory.register(
            ChunkStrategy::Paragraph,
            Arc::new(|| Arc::new(ParagraphChunker) as Arc<dyn Chunker>),
        );
        factory.register(
            ChunkStrategy::Token,
            Arc::new(|| Arc::new(TokenChunker) as Arc<dyn Chunker>),
        );
        factory.register(
            ChunkStrategy::Hierarchical,
            Arc::new(|| Arc::new(HierarchicalChunker) as Arc<dyn Chunker>),
        );
        factory
    }

    /// A factory that can also build the semantic strategy.
    pub fn with_embedder(embedder: Arc<dyn Embedder>) -> Self {
        let factory = Self::new();
        factory.register(
            ChunkStrategy::Semantic,
            Arc::new(move || {
                Arc::new(SemanticChunker::new(Arc::clone(&embedder))) as Arc<dyn Chunker>
            }),
        );
        factory
    }

    pub fn register(&self, strategy: ChunkStrategy, constructor: ChunkerCtor) {
        self.constructors.insert(strategy, constructor);
    }

    pub fn available_strategies(&self) -> Vec<ChunkStrategy> {
        let mut strategies: Vec<ChunkStrategy> =
            self.constructors.iter().map(|e| *e.key()).collect();
        strategies.sort_by_key(|s| s.as_str());
        strategies
    }

    pub fn is_available(&self, strategy: ChunkStrategy) -> bool {
        self.constructors.contains_key(&Self::resolve(strategy))
    }

    /// The Sentence chunker.
    pub fn default_chunker(&self) -> Arc<dyn Chunker> {
        self.create(ChunkStrategy::Sentence)
            .expect("sentence strategy is always registered")
    }

    pub fn create(&self, strategy: ChunkStrategy) -> Result<Arc<dyn Chunker>, PreprocessError> {
        let resolved = Self::resolve(strategy);
        self.constructors
            .get(&resolved)
            .map(|ctor| ctor())
            .ok_or_else(|| PreprocessError::StrategyUnavailable(resolved.as_str().to_string()))
    }

    pub fn try_create(&self, strategy: ChunkStrategy) -> Option<Arc<dyn Chunker>> {
        self.create(strategy).ok()
    }

    /// Run the full strategy-then-balancer flow for one input.
    pub async fn chunk(
        &self,
        text: &str,
        options: &ChunkOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, PreprocessError> {
        let chunker = self.create(options.strategy)?;
        let chunks = chunker.chunk(text, options, cancel).await?;
        if !options.enable_chunk_balancing || chunks.is_empty() {
            return Ok(chunks);
        }
        debug!(chunks = chunks.len(), "balancing chunk list");
        let balancer = ChunkBalancer::new(resolve_profile(text, options));
        balancer.balance(chunks, options, cancel).await
    }

    fn resolve(strategy: ChunkStrategy) -> ChunkStrategy {
        match strategy {
            ChunkStrategy::Auto => ChunkStrategy::Sentence,
            other => other,
        }
    }
}

impl Default for ChunkerFactory {
    fn default() -> Self {
        Self::new()
    }
}
