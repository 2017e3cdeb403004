use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RagError;

/// Configuration for the retrieval and answer-assembly pipeline.
/// Loaded once at startup and frozen after the engine is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub chunking: ChunkingConfig,
    pub thresholds: ThresholdConfig,
    pub search: SearchConfig,
    pub fallback: FallbackConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    /// End-to-end budget per query in milliseconds. Every external call
    /// carries a deadline derived from what remains of this budget.
    pub query_deadline_ms: u64,
    /// Upper bound on question length, in characters. Longer input is a
    /// validation error and makes no external calls.
    pub max_question_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Sliding-window size in whitespace tokens.
    pub chunk_size: usize,
    /// Sliding-window overlap in whitespace tokens.
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub min_similarity_threshold: f32,
    pub medium_similarity_threshold: f32,
    pub high_similarity_threshold: f32,
    /// Enable adaptive threshold adjustment from the observed score
    /// distribution.
    pub adaptive_threshold: bool,
    /// Relaxation floor: if fewer results survive filtering, the filter is
    /// re-applied at the minimum threshold and this many results returned.
    pub min_results_required: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Candidates requested from the index per query variant.
    pub stage_one_top_k: usize,
    pub enable_hybrid_search: bool,
    /// Fusion weights. Must sum to 1.
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    pub enable_query_enhancement: bool,
    /// Stage-1 fan-out width, capped at 5.
    pub max_query_variants: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub enable_keyword_anchoring: bool,
    /// Bound on records scanned during keyword anchoring.
    pub max_keyword_search_vectors: usize,
    /// Bound on results returned by keyword anchoring.
    pub max_keyword_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub llm_max_tokens: usize,
    pub llm_temperature: f32,
    /// Character budget used only for the response length factor. Answers
    /// are never truncated against it.
    pub max_answer_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Must match the index's declared dimension.
    pub embedding_dimension: usize,
    /// Opt-in non-production mode: on provider failure, query embeddings
    /// fall back to a deterministic pseudo-random vector derived from the
    /// text. Never applies to ingest writes.
    pub allow_embedding_fallback: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig {
                chunk_size: 800,
                chunk_overlap: 300,
            },
            thresholds: ThresholdConfig {
                min_similarity_threshold: 0.2,
                medium_similarity_threshold: 0.5,
                high_similarity_threshold: 0.8,
                adaptive_threshold: true,
                min_results_required: 1,
            },
            search: SearchConfig {
                stage_one_top_k: 10,
                enable_hybrid_search: true,
                semantic_weight: 0.7,
                keyword_weight: 0.3,
                enable_query_enhancement: true,
                max_query_variants: 5,
            },
            fallback: FallbackConfig {
                enable_keyword_anchoring: true,
                max_keyword_search_vectors: 1000,
                max_keyword_results: 3,
            },
            llm: LlmConfig {
                llm_max_tokens: 8000,
                llm_temperature: 0.1,
                max_answer_chars: 8000,
            },
            embedding: EmbeddingConfig {
                embedding_dimension: 1024,
                allow_embedding_fallback: false,
            },
            query_deadline_ms: 10_000,
            max_question_len: 10_000,
        }
    }
}

impl RetrievalConfig {
    /// Validate config values, returning errors for clearly broken
    /// configurations.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.embedding.embedding_dimension == 0 {
            return Err(RagError::Configuration(
                "embedding_dimension must be > 0".into(),
            ));
        }
        if self.chunking.chunk_size == 0 {
            return Err(RagError::Configuration("chunk_size must be > 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::Configuration(
                "chunk_overlap must be < chunk_size".into(),
            ));
        }
        let t = &self.thresholds;
        for (name, value) in [
            ("min_similarity_threshold", t.min_similarity_threshold),
            ("medium_similarity_threshold", t.medium_similarity_threshold),
            ("high_similarity_threshold", t.high_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RagError::Configuration(format!(
                    "{} must be in [0.0, 1.0]",
                    name
                )));
            }
        }
        if t.min_similarity_threshold > t.medium_similarity_threshold
            || t.medium_similarity_threshold > t.high_similarity_threshold
        {
            return Err(RagError::Configuration(
                "similarity thresholds must be ordered min <= medium <= high".into(),
            ));
        }
        if t.min_results_required == 0 {
            return Err(RagError::Configuration(
                "min_results_required must be >= 1".into(),
            ));
        }
        let weight_sum = self.search.semantic_weight + self.search.keyword_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(RagError::Configuration(format!(
                "semantic_weight + keyword_weight must equal 1.0, got {}",
                weight_sum
            )));
        }
        if self.search.max_query_variants == 0 || self.search.max_query_variants > 5 {
            return Err(RagError::Configuration(
                "max_query_variants must be in 1..=5".into(),
            ));
        }
        if self.search.stage_one_top_k == 0 {
            return Err(RagError::Configuration("stage_one_top_k must be > 0".into()));
        }
        if self.query_deadline_ms == 0 {
            return Err(RagError::Configuration("query_deadline_ms must be > 0".into()));
        }
        Ok(())
    }

    /// Load config from a JSON file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagError::Configuration(format!("failed to read config file: {}", e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| RagError::Configuration(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RetrievalConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unbalanced_fusion_weights() {
        let mut config = RetrievalConfig::default();
        config.search.semantic_weight = 0.8;
        assert!(matches!(
            config.validate(),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_overlap_not_below_chunk_size() {
        let mut config = RetrievalConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unordered_thresholds() {
        let mut config = RetrievalConfig::default();
        config.thresholds.medium_similarity_threshold = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_dimension() {
        let mut config = RetrievalConfig::default();
        config.embedding.embedding_dimension = 0;
        assert!(config.validate().is_err());
    }
}
