//! Hybrid multi-stage retrieval pipeline.
//!
//! Stage 1 fans out up to five query variants through the embedding provider
//! and the vector index concurrently, merging candidates on their best
//! semantic score. Stage 2 scores candidates by keyword relevance, Stage 3
//! fuses the two signals, Stage 4 applies the adaptive threshold with a
//! relaxation floor, and Stage 5 re-ranks structurally. Keyword anchoring
//! steps in only when Stage 4 leaves nothing.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::error::RagError;
use crate::providers::{
    embedding::{fallback_embedding, is_zero_vector},
    with_retry, DeadlineBudget, EmbeddingProvider, IndexMatch, VectorIndex,
};
use crate::retrieval::{keyword, rerank, threshold};
use crate::types::{
    sort_results, MetadataFilter, QueryContext, QueryIntent, RetrievalMethod, RetrievalResult,
};

/// Everything the response assembler needs to explain a retrieval run.
#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
    pub results: Vec<RetrievalResult>,
    pub effective_threshold: f32,
    pub adaptive: bool,
    pub fallback_used: bool,
    pub relaxation_applied: bool,
    pub query_variants: Vec<String>,
}

pub struct HybridRetriever<'a> {
    embeddings: &'a dyn EmbeddingProvider,
    index: &'a dyn VectorIndex,
    config: &'a RetrievalConfig,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(
        embeddings: &'a dyn EmbeddingProvider,
        index: &'a dyn VectorIndex,
        config: &'a RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            index,
            config,
        }
    }

    pub async fn retrieve(
        &self,
        ctx: &QueryContext,
        return_count: usize,
        base_threshold: f32,
        filter: Option<&MetadataFilter>,
        budget: &DeadlineBudget,
    ) -> Result<RetrievalOutcome, RagError> {
        // Stage 1: semantic fan-out over query variants.
        let variants = self.build_query_variants(ctx);
        let merged = self.semantic_fan_out(&variants, filter, budget).await?;
        let semantic_scores: Vec<f32> = merged.iter().map(|c| c.semantic_score).collect();
        info!(
            variants = variants.len(),
            candidates = merged.len(),
            "semantic fan-out complete"
        );

        // Stage 2: keyword scoring over the candidate pool.
        let mut candidates = merged;
        if self.config.search.enable_hybrid_search {
            self.extend_pool_if_low(&mut candidates, return_count, filter, budget)
                .await?;
            for candidate in &mut candidates {
                let (score, matched) =
                    keyword::keyword_score(&candidate.text.to_lowercase(), &ctx.keywords);
                candidate.keyword_score = score;
                candidate.matched_keywords = matched;
            }
        }

        // Stage 3: score fusion.
        let semantic_weight = self.config.search.semantic_weight;
        let keyword_weight = self.config.search.keyword_weight;
        for candidate in &mut candidates {
            candidate.combined_score = if self.config.search.enable_hybrid_search {
                (candidate.semantic_score * semantic_weight
                    + candidate.keyword_score * keyword_weight)
                    .clamp(0.0, 1.0)
            } else {
                candidate.semantic_score.clamp(0.0, 1.0)
            };
        }

        // Stage 4: adaptive thresholding with the relaxation floor.
        let effective = threshold::effective_threshold(
            base_threshold,
            &semantic_scores,
            &self.config.thresholds,
        );
        let mut survivors: Vec<RetrievalResult> = candidates
            .iter()
            .filter(|c| c.combined_score >= effective)
            .cloned()
            .collect();
        debug!(
            threshold = effective,
            pool = candidates.len(),
            survivors = survivors.len(),
            "threshold filter"
        );

        let min_required = self.config.thresholds.min_results_required;
        let mut relaxation_applied = false;
        if survivors.len() < min_required && !candidates.is_empty() {
            let floor = self.config.thresholds.min_similarity_threshold;
            let mut relaxed: Vec<RetrievalResult> = candidates
                .iter()
                .filter(|c| c.combined_score >= floor)
                .cloned()
                .collect();
            if relaxed.len() > survivors.len() {
                info!(
                    floor = floor,
                    recovered = relaxed.len(),
                    "relaxed threshold to meet minimum results"
                );
                sort_results(&mut relaxed);
                relaxed.truncate(min_required);
                survivors = relaxed;
                relaxation_applied = true;
            }
        }

        // Fallback: keyword anchoring when the semantic stages leave nothing.
        if survivors.is_empty() {
            if self.config.fallback.enable_keyword_anchoring {
                let fallback = with_retry(budget, "index", || {
                    keyword::keyword_anchoring(self.index, ctx, filter, &self.config.fallback)
                })
                .await?;
                return Ok(RetrievalOutcome {
                    fallback_used: !fallback.is_empty(),
                    results: fallback,
                    effective_threshold: effective,
                    adaptive: self.config.thresholds.adaptive_threshold,
                    relaxation_applied,
                    query_variants: variants,
                });
            }
            return Ok(RetrievalOutcome {
                results: Vec::new(),
                effective_threshold: effective,
                adaptive: self.config.thresholds.adaptive_threshold,
                fallback_used: false,
                relaxation_applied,
                query_variants: variants,
            });
        }

        // Stage 5: structural re-rank, intent boost, final truncation.
        let method = if self.config.search.enable_hybrid_search && keyword_weight > 0.0 {
            RetrievalMethod::Hybrid
        } else {
            RetrievalMethod::Semantic
        };
        for survivor in &mut survivors {
            survivor.retrieval_method = method;
        }
        rerank::apply_structural_ranks(&mut survivors, &ctx.normalized);
        rerank::apply_intent_boost(&mut survivors, ctx.intent);
        survivors.truncate(return_count);

        Ok(RetrievalOutcome {
            results: survivors,
            effective_threshold: effective,
            adaptive: self.config.thresholds.adaptive_threshold,
            fallback_used: false,
            relaxation_applied,
            query_variants: variants,
        })
    }

    /// Build up to `max_query_variants` search phrasings: the normalized
    /// query, the raw form, an intent-expanded phrasing, and a keyword-only
    /// variant.
    fn build_query_variants(&self, ctx: &QueryContext) -> Vec<String> {
        let mut variants = vec![ctx.normalized.clone()];
        if !self.config.search.enable_query_enhancement {
            return variants;
        }

        let raw_lower = ctx.raw.trim().to_lowercase();
        if !raw_lower.is_empty() && raw_lower != ctx.normalized {
            variants.push(raw_lower);
        }

        if ctx.intent != QueryIntent::InformationSeeking {
            let cues = crate::domain::intent_section_cues(ctx.intent);
            let extras: Vec<&str> = cues
                .iter()
                .copied()
                .filter(|cue| !ctx.normalized.contains(cue))
                .take(2)
                .collect();
            if !extras.is_empty() {
                variants.push(format!("{} {}", ctx.normalized, extras.join(" ")));
            }
        }

        if ctx.keywords.len() >= 3 {
            variants.push(ctx.keywords[..3].join(" "));
        }

        let mut seen = std::collections::HashSet::new();
        variants.retain(|v| seen.insert(v.clone()));
        variants.truncate(self.config.search.max_query_variants);
        variants
    }

    /// Embed every variant and query the index for each, concurrently.
    /// Candidates merge by chunk id on their maximum semantic score.
    async fn semantic_fan_out(
        &self,
        variants: &[String],
        filter: Option<&MetadataFilter>,
        budget: &DeadlineBudget,
    ) -> Result<Vec<RetrievalResult>, RagError> {
        let vectors = self.embed_variants(variants, budget).await?;

        let top_k = self.config.search.stage_one_top_k;
        let queries = vectors
            .iter()
            .map(|vector| async move { self.index.query(vector, top_k, filter).await });
        let remaining = budget
            .remaining()
            .ok_or_else(|| RagError::hard("index", "query deadline exceeded"))?;
        let outcomes = tokio::time::timeout(remaining, join_all(queries))
            .await
            .map_err(|_| RagError::hard("index", "query deadline exceeded"))?;

        let mut best: HashMap<String, IndexMatch> = HashMap::new();
        for outcome in outcomes {
            for hit in outcome? {
                best.entry(hit.id.clone())
                    .and_modify(|existing| {
                        if hit.score > existing.score {
                            existing.score = hit.score;
                        }
                    })
                    .or_insert(hit);
            }
        }

        Ok(best.into_values().map(candidate_from_match).collect())
    }

    async fn embed_variants(
        &self,
        variants: &[String],
        budget: &DeadlineBudget,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let owned: Vec<String> = variants.to_vec();
        let embedded = with_retry(budget, "embedding", || {
            let texts = owned.clone();
            async move { self.embeddings.embed(&texts).await }
        })
        .await;

        let dimension = self.config.embedding.embedding_dimension;
        match embedded {
            Ok(vectors) => {
                let mut sanitized = Vec::with_capacity(vectors.len());
                for (vector, text) in vectors.into_iter().zip(variants) {
                    if is_zero_vector(&vector) {
                        if self.config.embedding.allow_embedding_fallback {
                            warn!(variant = %text, "zero embedding replaced by deterministic fallback");
                            sanitized.push(fallback_embedding(text, dimension));
                        } else {
                            return Err(RagError::hard(
                                "embedding",
                                "provider returned an all-zero vector",
                            ));
                        }
                    } else {
                        sanitized.push(vector);
                    }
                }
                Ok(sanitized)
            }
            Err(err) if self.config.embedding.allow_embedding_fallback => {
                warn!(error = %err, "embedding provider down, using deterministic fallback vectors");
                Ok(variants
                    .iter()
                    .map(|text| fallback_embedding(text, dimension))
                    .collect())
            }
            Err(err) => Err(err),
        }
    }

    /// When the semantic pool is smaller than the requested result count,
    /// widen it with a bounded metadata scan so keyword scoring has
    /// something to chew on.
    async fn extend_pool_if_low(
        &self,
        candidates: &mut Vec<RetrievalResult>,
        return_count: usize,
        filter: Option<&MetadataFilter>,
        budget: &DeadlineBudget,
    ) -> Result<(), RagError> {
        if candidates.len() >= return_count {
            return Ok(());
        }

        let limit = self.config.fallback.max_keyword_search_vectors;
        let scanned = with_retry(budget, "index", || async {
            self.index.scan(filter, limit).await
        })
        .await?;

        let known: std::collections::HashSet<String> =
            candidates.iter().map(|c| c.chunk_id.clone()).collect();
        for record in scanned {
            if known.contains(&record.id) {
                continue;
            }
            let text = record
                .metadata
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            candidates.push(RetrievalResult {
                chunk_id: record.id,
                text,
                metadata: record.metadata,
                semantic_score: 0.0,
                keyword_score: 0.0,
                combined_score: 0.0,
                structural_rank: 3,
                retrieval_method: RetrievalMethod::Hybrid,
                matched_keywords: Vec::new(),
            });
        }
        Ok(())
    }
}

fn candidate_from_match(hit: IndexMatch) -> RetrievalResult {
    let text = hit
        .metadata
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    RetrievalResult {
        chunk_id: hit.id,
        text,
        metadata: hit.metadata,
        semantic_score: hit.score.clamp(0.0, 1.0),
        keyword_score: 0.0,
        combined_score: hit.score.clamp(0.0, 1.0),
        structural_rank: 3,
        retrieval_method: RetrievalMethod::Semantic,
        matched_keywords: Vec::new(),
    }
}
