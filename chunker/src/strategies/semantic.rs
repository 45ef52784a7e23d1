use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use textflow_models::{Chunk, ChunkOptions, ChunkStrategy, PreprocessError};

use super::{check_cancelled, resolve_profile, ChunkAssembler, Chunker};
use crate::embedder::Embedder;

/// Breaks where meaning shifts: sentences are embedded in one batch and a
/// chunk boundary is placed after sentence `i` once the running group has
/// reached `min_size` tokens and similarity(i, i+1) falls below the
/// configured threshold, or unconditionally at `max_size`.
pub struct SemanticChunker {
    embedder: Arc<dyn Embedder>,
}

impl SemanticChunker {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl Chunker for SemanticChunker {
    fn strategy_name(&self) -> &'static str {
        "semantic"
    }

    fn requires_embedder(&self) -> bool {
        true
    }

    async fn chunk(
        &self,
        text: &str,
        options: &ChunkOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, PreprocessError> {
        options.validate()?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let profile = resolve_profile(text, options);
        let assembler =
            ChunkAssembler::new(text, Arc::clone(&profile), options, ChunkStrategy::Semantic);

        // Sentence spans, whitespace-only ones dropped.
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut prev = 0usize;
        for &boundary in assembler.boundaries() {
            if !text[prev..boundary].trim().is_empty() {
                spans.push((prev, boundary));
            }
            prev = boundary;
        }

        if spans.len() <= 1 {
            return Ok(assembler.assemble(&[(0, text.len())]));
        }

        let sentences: Vec<String> = spans
            .iter()
            .map(|&(s, e)| text[s..e].trim().to_string())
            .collect();

        check_cancelled(cancel)?;
        let embeddings = self.embedder.embed_batch(&sentences, cancel).await?;
        check_cancelled(cancel)?;

        if embeddings.len() != sentences.len() {
            return Err(PreprocessError::EmbedderFailed(format!(
                "expected {} vectors, got {}",
                sentences.len(),
                embeddings.len()
            )));
        }

        let similarities: Vec<f32> = embeddings
            .windows(2)
            .map(|pair| self.embedder.cosine_similarity(&pair[0], &pair[1]))
            .collect();

        // Breakpoints are sentence indices where a new group starts. The
        // terminal breakpoint at sentence count is implicit.
        let mut breakpoints: Vec<usize> = Vec::new();
        let mut group_tokens = 0usize;
        for (i, &(start, end)) in spans.iter().enumerate() {
            check_cancelled(cancel)?;
            group_tokens += profile.estimate_token_count(&text[start..end]);
            if i + 1 >= spans.len() {
                break;
            }
            let semantic_break =
                group_tokens >= options.min_size && similarities[i] < options.similarity_threshold;
            let forced_break = group_tokens >= options.max_size;
            if semantic_break || forced_break {
                breakpoints.push(i + 1);
                group_tokens = 0;
            }
        }
        breakpoints.push(spans.len());

        let mut segments: Vec<(usize, usize)> = Vec::new();
        let mut group_start_idx = 0usize;
        for &bp in &breakpoints {
            if bp > group_start_idx {
                segments.push((spans[group_start_idx].0, spans[bp - 1].1));
                group_start_idx = bp;
            }
        }
        debug!(
            sentences = sentences.len(),
            segments = segments.len(),
            "semantic chunking complete"
        );

        Ok(assembler.assemble(&segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two artificial topics: sentences mentioning "ocean" embed on one axis,
    /// everything else on the other.
    struct TopicEmbedder;

    #[async_trait]
    impl Embedder for TopicEmbedder {
        fn embedding_dimension(&self) -> usize {
            2
        }

        async fn embed_one(
            &self,
            text: &str,
            _cancel: &CancellationToken,
        ) -> Result<Vec<f32>, PreprocessError> {
            Ok(if text.contains("ocean") {
                vec![1.0, 0.0]
            } else {
                vec![0.0, 1.0]
            })
        }

        async fn embed_batch(
            &self,
            texts: &[String],
            cancel: &CancellationToken,
        ) -> Result<Vec<Vec<f32>>, PreprocessError> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed_one(text, cancel).await?);
            }
            Ok(out)
        }
    }

    /// Always returns the wrong number of vectors.
    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn embedding_dimension(&self) -> usize {
            2
        }

        async fn embed_one(
            &self,
            _text: &str,
            _cancel: &CancellationToken,
        ) -> Result<Vec<f32>, PreprocessError> {
            Ok(vec![0.0, 0.0])
        }

        async fn embed_batch(
            &self,
            _texts: &[String],
            _cancel: &CancellationToken,
        ) -> Result<Vec<Vec<f32>>, PreprocessError> {
            Ok(vec![vec![0.0, 0.0]])
        }
    }

    fn options() -> ChunkOptions {
        ChunkOptions {
            strategy: ChunkStrategy::Semantic,
            min_size: 2,
            max_size: 200,
            target_size: 100,
            overlap_size: 0,
            similarity_threshold: 0.5,
            language: Some("en".to_string()),
            enable_chunk_balancing: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn breaks_where_similarity_drops() {
        let chunker = SemanticChunker::new(Arc::new(TopicEmbedder));
        let text = "The ocean waves crashed loudly. The ocean breeze felt cool. \
                    Stock markets closed higher today. Investors cheered the earnings report.";
        let chunks = chunker
            .chunk(text, &options(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.contains("ocean"));
        assert!(chunks[1].content.contains("markets"));
    }

    #[tokio::test]
    async fn single_sentence_is_one_chunk() {
        let chunker = SemanticChunker::new(Arc::new(TopicEmbedder));
        let chunks = chunker
            .chunk(
                "Only one sentence lives here.",
                &options(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn wrong_batch_length_is_an_embedder_failure() {
        let chunker = SemanticChunker::new(Arc::new(BrokenEmbedder));
        let text = "Sentence one is here. Sentence two is here. Sentence three is here.";
        let result = chunker
            .chunk(text, &options(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(PreprocessError::EmbedderFailed(_))));
    }

    #[tokio::test]
    async fn cancelled_before_embedding_aborts() {
        let chunker = SemanticChunker::new(Arc::new(TopicEmbedder));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = chunker
            .chunk("One sentence. Two sentences.", &options(), &cancel)
            .await;
        assert!(matches!(result, Err(PreprocessError::Cancelled)));
    }
}
