//! Thin contracts to the external embedding, vector-index, and LLM
//! providers, plus the shared deadline/retry policy for external calls.

pub mod embedding;
pub mod index;
pub mod llm;

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::RagError;
use crate::types::{IndexRecord, Metadata, MetadataFilter};

pub use embedding::{fallback_embedding, HttpEmbeddingClient};
pub use index::MemoryIndex;
pub use llm::HttpLlmClient;

/// Embedding provider. Deterministic per (model, text); the returned
/// dimension must equal the index's declared dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;

    fn dimension(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct ScanRecord {
    pub id: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub count: usize,
    pub dimension: usize,
    pub metric: String,
}

/// Vector index with cosine metric. Metadata values are scalars or lists of
/// strings only. May be eventually consistent at second scale after upsert.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), RagError>;

    async fn delete_by_filter(&self, filter: &MetadataFilter) -> Result<usize, RagError>;

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>, RagError>;

    /// Bounded metadata scan; used only by the keyword-anchoring fallback
    /// and the low-pool keyword stage.
    async fn scan(
        &self,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<ScanRecord>, RagError>;

    async fn stats(&self) -> Result<IndexStats, RagError>;

    /// Replace every record matching `filter` with `records`. The default
    /// composes delete + upsert; backends that can do better (the in-memory
    /// index does it under one lock) override this so readers observe either
    /// the pre- or the post-write state at document granularity.
    async fn replace(
        &self,
        filter: &MetadataFilter,
        records: Vec<IndexRecord>,
    ) -> Result<(), RagError> {
        self.delete_by_filter(filter).await?;
        self.upsert(records).await
    }
}

/// LLM completion provider. Never returns null on success; may fail with
/// transient errors.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String, RagError>;
}

/// Remaining-time budget for one query. Every external call (and its single
/// retry) is bounded by what is left of it.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineBudget {
    deadline: Option<Instant>,
}

impl DeadlineBudget {
    pub fn new(total: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + total),
        }
    }

    /// Budget without a wall-clock bound (ingestion of large documents).
    pub fn unbounded() -> Self {
        Self { deadline: None }
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self.deadline {
            None => Some(Duration::from_secs(24 * 60 * 60)),
            Some(deadline) => {
                let now = Instant::now();
                (deadline > now).then(|| deadline - now)
            }
        }
    }
}

/// Run an external call under the budget with exactly one retry on a
/// transient failure. A second failure or an elapsed deadline maps to a
/// hard external error; validation errors are never retried.
pub async fn with_retry<T, F, Fut>(
    budget: &DeadlineBudget,
    provider: &str,
    mut op: F,
) -> Result<T, RagError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RagError>>,
{
    let remaining = budget
        .remaining()
        .ok_or_else(|| RagError::hard(provider, "query deadline exceeded"))?;

    match tokio::time::timeout(remaining, op()).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) if err.is_transient() => {
            tracing::warn!(provider = provider, error = %err, "transient failure, retrying once");
            let remaining = budget
                .remaining()
                .ok_or_else(|| RagError::hard(provider, "query deadline exceeded"))?;
            match tokio::time::timeout(remaining, op()).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(err.into_hard()),
                Err(_) => Err(RagError::hard(provider, "query deadline exceeded during retry")),
            }
        }
        Ok(Err(err)) => Err(err),
        Err(_) => Err(RagError::hard(provider, "query deadline exceeded")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_once_on_transient_failure() {
        let calls = AtomicUsize::new(0);
        let budget = DeadlineBudget::new(Duration::from_secs(5));

        let result = with_retry(&budget, "embedding", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(RagError::transient("embedding", "429"))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_transient_failure_becomes_hard() {
        let budget = DeadlineBudget::new(Duration::from_secs(5));
        let result: Result<u32, _> = with_retry(&budget, "llm", || async {
            Err(RagError::transient("llm", "503"))
        })
        .await;

        assert!(matches!(result, Err(RagError::HardExternal { .. })));
    }

    #[tokio::test]
    async fn hard_failure_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let budget = DeadlineBudget::new(Duration::from_secs(5));

        let result: Result<u32, _> = with_retry(&budget, "llm", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RagError::hard("llm", "bad request")) }
        })
        .await;

        assert!(matches!(result, Err(RagError::HardExternal { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn elapsed_budget_fails_without_calling() {
        let budget = DeadlineBudget::new(Duration::from_millis(0));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let calls = AtomicUsize::new(0);

        let result: Result<u32, _> = with_retry(&budget, "index", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(1) }
        })
        .await;

        assert!(matches!(result, Err(RagError::HardExternal { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
