//! The retrieval-QA engine: document ingestion, the query pipeline, and
//! query diagnostics.
//!
//! Per query the pipeline walks received -> normalized -> intent_analyzed ->
//! retrieved -> (fallback?) -> ranked -> prompted -> answered -> assembled,
//! recording each stage in the explainability audit trail. Terminal states
//! are `assembled`, `error`, and `no_results`; the caller always receives a
//! well-formed envelope.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::chunking::{build_chunk_metadata, LegalChunker};
use crate::config::RetrievalConfig;
use crate::error::RagError;
use crate::providers::{
    with_retry, DeadlineBudget, EmbeddingProvider, LlmProvider, VectorIndex,
};
use crate::query::build_query_context;
use crate::response::{ResponseAssembler, RetrievalMeta, StructuredResponse};
use crate::retrieval::HybridRetriever;
use crate::types::{Complexity, IndexRecord, Metadata, MetadataFilter, QueryContext, QueryIntent};

/// Default number of results returned to the caller.
const DEFAULT_RETURN_COUNT: usize = 5;
/// Default base similarity threshold before adaptive adjustment.
const DEFAULT_BASE_THRESHOLD: f32 = 0.25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub chunks_written: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub normalized: String,
    pub intent: QueryIntent,
    pub complexity: Complexity,
    pub sub_questions: Vec<String>,
    pub matched_categories: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub top_k: Option<usize>,
    pub base_threshold: Option<f32>,
    pub filter: Option<MetadataFilter>,
}

pub struct RagEngine {
    config: RetrievalConfig,
    chunker: LegalChunker,
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmProvider>,
    assembler: ResponseAssembler,
}

impl RagEngine {
    /// Construct the engine, validating the configuration against the
    /// providers. Configuration is frozen from here on.
    pub async fn new(
        config: RetrievalConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self, RagError> {
        config.validate()?;

        if embeddings.dimension() != config.embedding.embedding_dimension {
            return Err(RagError::Configuration(format!(
                "embedding provider dimension {} does not match configured dimension {}",
                embeddings.dimension(),
                config.embedding.embedding_dimension
            )));
        }
        let stats = index.stats().await?;
        if stats.dimension != config.embedding.embedding_dimension {
            return Err(RagError::Configuration(format!(
                "index dimension {} does not match configured dimension {}",
                stats.dimension, config.embedding.embedding_dimension
            )));
        }

        let chunker = LegalChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap);
        let assembler = ResponseAssembler::new(config.clone());

        Ok(Self {
            config,
            chunker,
            embeddings,
            index,
            llm,
            assembler,
        })
    }

    /// Ingest a document: chunk, embed, and atomically replace all prior
    /// chunks for the same `doc_id`. Idempotent by document id.
    pub async fn ingest(
        &self,
        doc_id: &str,
        doc_type: &str,
        doc_title: &str,
        raw_text: &str,
        metadata: Option<Metadata>,
    ) -> Result<IngestReport, RagError> {
        if doc_id.trim().is_empty() {
            return Err(RagError::Validation("doc_id must not be empty".into()));
        }

        let mut warnings = Vec::new();
        let chunks = self
            .chunker
            .chunk_document(doc_id, doc_type, doc_title, raw_text);
        if chunks.is_empty() {
            warnings.push("document produced no chunks".to_string());
        }

        let extra = metadata.unwrap_or_default();
        let filter = MetadataFilter::for_doc(doc_id);

        if chunks.is_empty() {
            // Re-ingestion with empty content still replaces prior chunks.
            self.index.replace(&filter, Vec::new()).await?;
            return Ok(IngestReport {
                chunks_written: 0,
                warnings,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let budget = DeadlineBudget::unbounded();
        let vectors = with_retry(&budget, "embedding", || {
            let texts = texts.clone();
            let embeddings = Arc::clone(&self.embeddings);
            async move { embeddings.embed(&texts).await }
        })
        .await?;

        if vectors.len() != chunks.len() {
            return Err(RagError::Internal(format!(
                "embedding count {} does not match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }
        // Non-deterministic fallback vectors are never written to the index;
        // a zero vector on the ingest path is always a provider fault.
        for (chunk, vector) in chunks.iter().zip(&vectors) {
            if vector.iter().all(|v| *v == 0.0) {
                return Err(RagError::hard(
                    "embedding",
                    format!("all-zero embedding for chunk {}", chunk.chunk_id),
                ));
            }
        }

        let records: Vec<IndexRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| IndexRecord {
                chunk_id: chunk.chunk_id.clone(),
                embedding,
                metadata: build_chunk_metadata(chunk, doc_type, &extra),
            })
            .collect();

        let written = records.len();
        self.index.replace(&filter, records).await?;

        info!(
            doc_id = doc_id,
            doc_type = doc_type,
            chunks = written,
            "ingested document"
        );

        Ok(IngestReport {
            chunks_written: written,
            warnings,
        })
    }

    /// Answer a question. Always returns a well-formed envelope: terminal
    /// states are `assembled`, `error`, and `no_results`.
    pub async fn query(&self, question: &str, opts: QueryOptions) -> StructuredResponse {
        let mut stages = vec!["received".to_string()];

        // Validation happens before any external call.
        if let Err(err) = self.validate_question(question) {
            let ctx = empty_context(question);
            let meta = self.meta(0.0, false, false, false, stages);
            return self
                .assembler
                .error_response(&ctx, "validation", &err.to_string(), &meta);
        }

        let budget = DeadlineBudget::new(Duration::from_millis(self.config.query_deadline_ms));

        let ctx = build_query_context(question);
        stages.push("normalized".to_string());
        stages.push("intent_analyzed".to_string());
        info!(
            query = question,
            normalized = %ctx.normalized,
            intent = ?ctx.intent,
            sub_questions = ctx.sub_questions.len(),
            "query analyzed"
        );

        let return_count = opts.top_k.unwrap_or(DEFAULT_RETURN_COUNT).max(1);
        let base_threshold = opts.base_threshold.unwrap_or(DEFAULT_BASE_THRESHOLD);

        let retriever = HybridRetriever::new(
            self.embeddings.as_ref(),
            self.index.as_ref(),
            &self.config,
        );
        let outcome = match retriever
            .retrieve(&ctx, return_count, base_threshold, opts.filter.as_ref(), &budget)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, "retrieval failed");
                let meta = self.meta(base_threshold, false, false, false, stages);
                return self
                    .assembler
                    .error_response(&ctx, "retrieved", &err.to_string(), &meta);
            }
        };
        stages.push("retrieved".to_string());
        if outcome.fallback_used {
            stages.push("fallback".to_string());
        }
        stages.push("ranked".to_string());

        if outcome.results.is_empty() {
            let meta = self.meta(
                outcome.effective_threshold,
                outcome.adaptive,
                outcome.fallback_used,
                outcome.relaxation_applied,
                stages,
            );
            return self.assembler.no_results_response(&ctx, &meta);
        }

        let context = self.assembler.format_context(&outcome.results);
        let (system, user) = self.assembler.build_prompt(&ctx, &context);
        stages.push("prompted".to_string());

        let answer = {
            let max_tokens = self.config.llm.llm_max_tokens;
            let temperature = self.config.llm.llm_temperature;
            let llm = Arc::clone(&self.llm);
            with_retry(&budget, "llm", || {
                let llm = Arc::clone(&llm);
                let system = system.clone();
                let user = user.clone();
                async move { llm.complete(&system, &user, max_tokens, temperature).await }
            })
            .await
        };

        let answer = match answer {
            Ok(answer) => answer,
            Err(err) => {
                error!(error = %err, "llm call failed");
                let meta = self.meta(
                    outcome.effective_threshold,
                    outcome.adaptive,
                    outcome.fallback_used,
                    outcome.relaxation_applied,
                    stages,
                );
                return self
                    .assembler
                    .error_response(&ctx, "answered", &err.to_string(), &meta);
            }
        };
        stages.push("answered".to_string());
        stages.push("assembled".to_string());

        let meta = self.meta(
            outcome.effective_threshold,
            outcome.adaptive,
            outcome.fallback_used,
            outcome.relaxation_applied,
            stages,
        );
        self.assembler
            .assemble(&ctx, &outcome.results, &context, &answer, &meta)
    }

    /// Diagnostics: run the query front end without touching any provider.
    pub fn analyze(&self, question: &str) -> Result<QueryAnalysis, RagError> {
        self.validate_question(question)?;
        let ctx = build_query_context(question);
        Ok(QueryAnalysis {
            normalized: ctx.normalized,
            intent: ctx.intent,
            complexity: ctx.complexity,
            sub_questions: ctx.sub_questions,
            matched_categories: ctx.matched_categories,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    fn validate_question(&self, question: &str) -> Result<(), RagError> {
        if question.trim().is_empty() {
            return Err(RagError::Validation("question must not be empty".into()));
        }
        if question.len() > self.config.max_question_len {
            return Err(RagError::Validation(format!(
                "question exceeds the {} character limit",
                self.config.max_question_len
            )));
        }
        Ok(())
    }

    fn meta(
        &self,
        threshold_used: f32,
        adaptive: bool,
        fallback_used: bool,
        relaxation_applied: bool,
        stages: Vec<String>,
    ) -> RetrievalMeta {
        RetrievalMeta {
            threshold_used,
            adaptive,
            fallback_used,
            relaxation_applied,
            stages,
        }
    }
}

fn empty_context(question: &str) -> QueryContext {
    QueryContext {
        raw: question.to_string(),
        normalized: String::new(),
        intent: QueryIntent::InformationSeeking,
        intent_confidence: 0.0,
        complexity: Complexity::Low,
        keywords: Vec::new(),
        sub_questions: vec![String::new()],
        matched_categories: Vec::new(),
    }
}

impl std::fmt::Debug for RagEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryIndex;
    use async_trait::async_trait;

    struct HashEmbeddings {
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for HashEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts
                .iter()
                .map(|t| crate::providers::fallback_embedding(t, self.dimension))
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _max_tokens: usize,
            _temperature: f32,
        ) -> Result<String, RagError> {
            Ok("1. As per clause 5, pre-existing diseases are excluded for 36 months.".into())
        }
    }

    fn test_config() -> RetrievalConfig {
        let mut config = RetrievalConfig::default();
        config.embedding.embedding_dimension = 32;
        config
    }

    async fn engine() -> RagEngine {
        RagEngine::new(
            test_config(),
            Arc::new(HashEmbeddings { dimension: 32 }),
            Arc::new(MemoryIndex::new(32)),
            Arc::new(EchoLlm),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch_at_construction() {
        let result = RagEngine::new(
            test_config(),
            Arc::new(HashEmbeddings { dimension: 64 }),
            Arc::new(MemoryIndex::new(32)),
            Arc::new(EchoLlm),
        )
        .await;
        assert!(matches!(result, Err(RagError::Configuration(_))));
    }

    #[tokio::test]
    async fn ingest_writes_chunks_and_is_idempotent() {
        let engine = engine().await;
        let text = "1.1 COVERAGE\nHospitalization expenses are covered.\n1.2 EXCLUSIONS\nPre-existing disease is excluded.";

        let first = engine
            .ingest("doc-1", "policy", "Policy", text, None)
            .await
            .unwrap();
        assert_eq!(first.chunks_written, 2);

        let second = engine
            .ingest("doc-1", "policy", "Policy", text, None)
            .await
            .unwrap();
        assert_eq!(second.chunks_written, 2);

        let stats = engine.index.stats().await.unwrap();
        assert_eq!(stats.count, 2);
    }

    #[tokio::test]
    async fn reingest_replaces_prior_snapshot() {
        let engine = engine().await;
        let long = "1.1 COVERAGE\nCovered.\n1.2 EXCLUSIONS\nExcluded.\n2.1 DEDUCTIBLE\nApplies.";
        let short = "1.1 COVERAGE\nCovered in full.";

        engine
            .ingest("doc-1", "policy", "Policy", long, None)
            .await
            .unwrap();
        assert_eq!(engine.index.stats().await.unwrap().count, 3);

        engine
            .ingest("doc-1", "policy", "Policy", short, None)
            .await
            .unwrap();
        let scan = engine.index.scan(None, 100).await.unwrap();
        assert_eq!(scan.len(), 1);
        assert_eq!(scan[0].id, "doc-1:section_1.1");
    }

    struct ZeroEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for ZeroEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(texts.iter().map(|_| vec![0.0f32; 32]).collect())
        }

        fn dimension(&self) -> usize {
            32
        }
    }

    #[tokio::test]
    async fn ingest_refuses_zero_embeddings() {
        let engine = RagEngine::new(
            test_config(),
            Arc::new(ZeroEmbeddings),
            Arc::new(MemoryIndex::new(32)),
            Arc::new(EchoLlm),
        )
        .await
        .unwrap();

        let result = engine
            .ingest("doc-1", "policy", "Policy", "1.1 COVERAGE\nCovered.", None)
            .await;
        assert!(matches!(result, Err(RagError::HardExternal { .. })));
        assert_eq!(engine.index.stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn ingest_rejects_empty_doc_id() {
        let engine = engine().await;
        let result = engine.ingest("  ", "policy", "Policy", "text", None).await;
        assert!(matches!(result, Err(RagError::Validation(_))));
    }

    #[tokio::test]
    async fn empty_question_returns_validation_error_envelope() {
        let engine = engine().await;
        let response = engine.query("   ", QueryOptions::default()).await;
        assert_eq!(
            response.response_type,
            crate::response::schema::ResponseType::Error
        );
        assert!(response
            .explainability
            .audit_trail
            .stages
            .iter()
            .any(|s| s == "failed:validation"));
    }

    #[tokio::test]
    async fn oversized_question_is_rejected_without_external_calls() {
        let engine = engine().await;
        let question = "x".repeat(engine.config.max_question_len + 1);
        let response = engine.query(&question, QueryOptions::default()).await;
        assert_eq!(
            response.response_type,
            crate::response::schema::ResponseType::Error
        );
    }

    #[tokio::test]
    async fn query_on_empty_index_yields_no_results() {
        let engine = engine().await;
        let response = engine
            .query("What are the PED exclusions?", QueryOptions::default())
            .await;
        assert_eq!(
            response.response_type,
            crate::response::schema::ResponseType::NoResults
        );
        assert_eq!(response.sources.total_count, 0);
    }

    #[tokio::test]
    async fn analyze_reports_normalization_and_intent() {
        let engine = engine().await;
        let analysis = engine.analyze("What are the PED exclusions?").unwrap();
        assert_eq!(
            analysis.normalized,
            "what are the preexisting diseases exclusions?"
        );
        assert_eq!(analysis.intent, QueryIntent::Exclusion);
        assert_eq!(analysis.sub_questions.len(), 1);
        assert!(analysis
            .matched_categories
            .contains(&"preexisting_diseases".to_string()));
    }

    #[tokio::test]
    async fn end_to_end_query_assembles_answer() {
        let engine = engine().await;
        engine
            .ingest(
                "policy-1",
                "policy",
                "Health Policy",
                "1.2 EXCLUSIONS\nClause 5: pre-existing disease is excluded for 36 months.",
                None,
            )
            .await
            .unwrap();

        let response = engine
            .query(
                "What are the PED exclusions?",
                QueryOptions {
                    base_threshold: Some(0.0),
                    ..QueryOptions::default()
                },
            )
            .await;

        // The hash-based test embeddings rarely align query and chunk, so
        // either the hybrid path or keyword anchoring supplies sources; both
        // must produce an assembled (non-error) envelope.
        assert_ne!(
            response.response_type,
            crate::response::schema::ResponseType::Error
        );
        if response.sources.total_count > 0 {
            assert!(!response.answer.is_empty());
            assert!(response
                .explainability
                .audit_trail
                .stages
                .iter()
                .any(|s| s == "assembled"));
        }
    }
}
