//! End-to-end preprocessing pipeline scenarios.
//!
//! These tests exercise the full flow the library is built for:
//! 1. Raw text -> Refiner (noise removal)
//! 2. -> PII Masker (detection + rewriting)
//! 3. -> Chunker strategy (language-aware splitting)
//! 4. -> Chunk Balancer (size window)
//! plus the cross-cutting invariants every chunk list must satisfy.

use std::collections::HashSet;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use textflow_chunker::{ChunkBalancer, Chunker, ChunkerFactory, TextRefiner};
use textflow_chunker::language;
use textflow_chunker::strategies::SentenceChunker;
use textflow_models::{
    Chunk, ChunkOptions, ChunkStrategy, PiiMaskingOptions, PreprocessOptions, PreprocessResult,
    RefineOptions,
};
use textflow_security::PiiMasker;

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

fn assert_list_invariants(chunks: &[Chunk]) {
    let total = chunks.len();
    let mut ids = HashSet::new();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i, "indices must run 0..N-1");
        assert_eq!(chunk.total_count, total, "total_count must equal N");
        assert!(ids.insert(chunk.id.clone()), "ids must be unique");
        assert!(chunk.location.end >= chunk.location.start);
        if !chunk.content.is_empty() {
            assert!(chunk.metadata.estimated_tokens > 0);
        }
    }
    for pair in chunks.windows(2) {
        assert!(
            pair[1].location.start >= pair[0].location.start,
            "chunk starts must be monotonically non-decreasing"
        );
    }
}

#[tokio::test]
async fn sentence_chunking_with_overlap() {
    let text = "First sentence with content. Second sentence with more content. Third sentence ends here.";
    let options = ChunkOptions {
        strategy: ChunkStrategy::Sentence,
        max_size: 15,
        min_size: 3,
        target_size: 12,
        overlap_size: 4,
        language: Some("en".to_string()),
        enable_chunk_balancing: false,
        ..Default::default()
    };

    let chunks = SentenceChunker.chunk(text, &options, &cancel()).await.unwrap();
    assert!(chunks.len() >= 2);
    assert_list_invariants(&chunks);

    for chunk in &chunks {
        assert!(chunk.metadata.starts_at_sentence_boundary);
        assert!(chunk.metadata.ends_at_sentence_boundary);
    }
    let overlap = chunks[1]
        .metadata
        .overlap_from_previous
        .as_ref()
        .expect("chunk 2 must carry overlap");
    assert!(!overlap.is_empty());
    assert!(chunks[0].content.ends_with(overlap.as_str()));
}

#[tokio::test]
async fn hierarchical_parent_child_links() {
    let text = "# Root\nRoot content.\n## Child 1\nChild 1 content.\n## Child 2\nChild 2 content.\n";
    let options = ChunkOptions {
        strategy: ChunkStrategy::Hierarchical,
        language: Some("en".to_string()),
        enable_chunk_balancing: false,
        overlap_size: 0,
        ..Default::default()
    };

    let factory = ChunkerFactory::new();
    let chunker = factory.create(ChunkStrategy::Hierarchical).unwrap();
    let chunks = chunker.chunk(text, &options, &cancel()).await.unwrap();

    assert_eq!(chunks.len(), 3);
    assert_list_invariants(&chunks);

    let root = &chunks[0];
    assert_eq!(root.hierarchy_level(), Some(1));
    assert_eq!(root.section_title(), Some("Root"));
    assert_eq!(root.location.section_path.as_deref(), Some("Root"));
    assert!(root.parent_id().is_none());
    assert_eq!(root.child_ids(), vec![chunks[1].id.clone(), chunks[2].id.clone()]);
    assert!((root.metadata.quality_score - 0.9).abs() < 1e-6);

    for (chunk, expected_path) in chunks[1..].iter().zip(["Root > Child 1", "Root > Child 2"]) {
        assert_eq!(chunk.hierarchy_level(), Some(2));
        assert_eq!(chunk.parent_id(), Some(root.id.as_str()));
        assert_eq!(chunk.location.section_path.as_deref(), Some(expected_path));
        assert!((chunk.metadata.quality_score - 0.8).abs() < 1e-6);
    }
}

#[tokio::test]
async fn balancer_merges_undersized_runs() {
    let text = "Tiny one.\n\nTiny two.\n\nTiny three.\n\nTiny four.";
    let options = ChunkOptions {
        strategy: ChunkStrategy::Paragraph,
        min_size: 100,
        max_size: 500,
        target_size: 300,
        overlap_size: 0,
        language: Some("en".to_string()),
        enable_chunk_balancing: true,
        ..Default::default()
    };

    let chunks = ChunkerFactory::new().chunk(text, &options, &cancel()).await.unwrap();
    assert!(chunks.len() <= 2);
    assert_list_invariants(&chunks);
    for chunk in &chunks {
        assert!(chunk.metadata.estimated_tokens <= options.max_size);
    }
}

#[tokio::test]
async fn balancer_is_idempotent_over_pipeline_output() {
    let text = "A short one. Another short one. And a third short sentence for the list. \
                Plus a fourth sentence that carries a little more text than the others do.";
    let options = ChunkOptions {
        strategy: ChunkStrategy::Sentence,
        min_size: 8,
        max_size: 30,
        target_size: 20,
        overlap_size: 0,
        language: Some("en".to_string()),
        ..Default::default()
    };

    let once = ChunkerFactory::new().chunk(text, &options, &cancel()).await.unwrap();
    let balancer = ChunkBalancer::for_options(&options);
    let twice = balancer
        .balance(once.clone(), &options, &cancel())
        .await
        .unwrap();
    let snapshot = |cs: &[Chunk]| {
        cs.iter()
            .map(|c| (c.content.clone(), c.index, c.total_count))
            .collect::<Vec<_>>()
    };
    assert_eq!(snapshot(&once), snapshot(&twice));
}

#[tokio::test]
async fn chunkers_lose_no_content_without_overlap() {
    let text = "Alpha sentence here. Beta sentence here. Gamma sentence here. \
                Delta sentence here. Epsilon sentence here.";
    let options = ChunkOptions {
        strategy: ChunkStrategy::Sentence,
        max_size: 12,
        min_size: 2,
        target_size: 10,
        overlap_size: 0,
        language: Some("en".to_string()),
        enable_chunk_balancing: false,
        ..Default::default()
    };

    let chunks = SentenceChunker.chunk(text, &options, &cancel()).await.unwrap();
    let rebuilt: Vec<&str> = chunks
        .iter()
        .flat_map(|c| c.content.split_whitespace())
        .collect();
    let original: Vec<&str> = text.split_whitespace().collect();
    assert_eq!(rebuilt, original, "no words may be lost or duplicated");
}

#[test]
fn refiner_applies_separators_before_repeats() {
    let refiner = TextRefiner::new(RefineOptions::for_token_optimization());
    // A full separator line collapses to the replacement, not to "====".
    assert_eq!(refiner.refine("========"), "---");
    // Inline runs are a repeated-character case instead.
    assert_eq!(
        refiner.refine("========================Section========================"),
        "====Section===="
    );
}

#[test]
fn refiner_aggressive_preset_shrinks_noise() {
    let noise = format!(
        "╔══════════════╗\n║ NOISY HEADER ║\n╚══════════════╝\n\n\
         Actual paragraph with meaningful text that must survive refining.\n\n\
         ------------------------------\n\n\
         Second meaningful paragraph with more retained content here.\n\
         data:image/png;base64,{}\nTrailing line.",
        "Q".repeat(120)
    );
    let refiner = TextRefiner::new(RefineOptions::for_aggressive_token_optimization());
    let result = refiner.refine_with_result(&noise);

    assert!(result.refined_text.len() <= (noise.len() as f64 * 0.7) as usize);
    assert!(!result.refined_text.contains('║'));
    assert!(!result.refined_text.contains("---"));
    assert!(result.refined_text.contains("[embedded-data]"));
    assert!(result.refined_text.contains("meaningful text"));
    // Running the pipeline again changes nothing.
    assert_eq!(refiner.refine(&result.refined_text), result.refined_text);
}

#[test]
fn korean_text_detects_and_profiles_as_ko() {
    let registry = language::registry();
    assert_eq!(registry.detect_language("안녕하세요. 테스트입니다."), "ko");
    let profile = registry.detect_profile("안녕하세요. 테스트입니다.");
    assert_eq!(profile.code(), "ko");
    // Hangul-heavy text uses the two-phase Korean estimate.
    assert_eq!(profile.estimate_token_count("안녕하세요. 테스트입니다."), 9);
}

#[tokio::test]
async fn full_pipeline_refine_mask_chunk() {
    let raw = "Customer record\n================\n\
               Contact: test@example.com or call 010-1234-5678.\n\n\
               The customer asked about delivery times. The order ships next week. \
               A follow-up call is scheduled for Friday.";

    // Stage 1: refine away the separator noise.
    let refiner = TextRefiner::new(RefineOptions::for_token_optimization());
    let refined = refiner.refine(raw);
    assert!(!refined.contains("===="));

    // Stage 2: mask contact PII.
    let masker = PiiMasker::new(PiiMaskingOptions::common());
    let masked = masker.mask(&refined, &cancel()).await.unwrap();
    assert!(masked.masked_text.contains("[EMAIL]"));
    assert!(masked.masked_text.contains("[PHONE]"));
    assert_eq!(masked.matches.len(), 2);

    // Stage 3 + 4: chunk and balance.
    let chunk_options = ChunkOptions {
        strategy: ChunkStrategy::Sentence,
        max_size: 20,
        min_size: 3,
        target_size: 15,
        overlap_size: 0,
        language: Some("en".to_string()),
        ..Default::default()
    };
    let chunks = ChunkerFactory::new()
        .chunk(&masked.masked_text, &chunk_options, &cancel())
        .await
        .unwrap();
    assert!(!chunks.is_empty());
    assert_list_invariants(&chunks);

    let result = PreprocessResult {
        original_text: raw.to_string(),
        processed_text: masked.masked_text.clone(),
        chunks,
        pii_matches: masked.matches.clone(),
        filter_matches: Vec::new(),
        is_blocked: false,
        options: PreprocessOptions {
            refine: Some(refiner.options().clone()),
            masking: Some(masker.options().clone()),
            chunking: chunk_options,
            ..Default::default()
        },
        processed_at: Utc::now(),
    };
    assert!(result.summary().contains("2 PII match(es)"));
}

#[tokio::test]
async fn empty_input_is_never_an_error() {
    let factory = ChunkerFactory::new();
    for strategy in [
        ChunkStrategy::Sentence,
        ChunkStrategy::Paragraph,
        ChunkStrategy::Token,
        ChunkStrategy::Hierarchical,
    ] {
        let options = ChunkOptions {
            strategy,
            ..Default::default()
        };
        let chunks = factory.chunk("", &options, &cancel()).await.unwrap();
        assert!(chunks.is_empty(), "{strategy:?} must accept empty input");
    }

    let masker = PiiMasker::with_defaults();
    let result = masker.mask("", &cancel()).await.unwrap();
    assert_eq!(result.summary(), "No PII detected.");
}
