//! In-memory cosine vector index.
//!
//! The local backend and the test double for the `VectorIndex` contract.
//! Safe for concurrent use; `replace` swaps a document's records under a
//! single write lock so readers see either the old or the new snapshot,
//! never a mixture.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::RagError;
use crate::providers::{IndexMatch, IndexStats, ScanRecord, VectorIndex};
use crate::types::{IndexRecord, MetadataFilter};

pub struct MemoryIndex {
    dimension: usize,
    records: RwLock<Vec<IndexRecord>>,
}

impl MemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(Vec::new()),
        }
    }

    fn validate(&self, records: &[IndexRecord]) -> Result<(), RagError> {
        for record in records {
            if record.embedding.len() != self.dimension {
                return Err(RagError::Validation(format!(
                    "record {} has dimension {}, index expects {}",
                    record.chunk_id,
                    record.embedding.len(),
                    self.dimension
                )));
            }
            if record.embedding.iter().all(|v| *v == 0.0) {
                return Err(RagError::Validation(format!(
                    "record {} has an all-zero embedding",
                    record.chunk_id
                )));
            }
        }
        Ok(())
    }

    fn upsert_locked(store: &mut Vec<IndexRecord>, records: Vec<IndexRecord>) {
        for record in records {
            if let Some(existing) = store.iter_mut().find(|r| r.chunk_id == record.chunk_id) {
                *existing = record;
            } else {
                store.push(record);
            }
        }
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), RagError> {
        self.validate(&records)?;
        let mut store = self.records.write();
        Self::upsert_locked(&mut store, records);
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &MetadataFilter) -> Result<usize, RagError> {
        let mut store = self.records.write();
        let before = store.len();
        store.retain(|record| !filter.matches(&record.metadata));
        Ok(before - store.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexMatch>, RagError> {
        if vector.len() != self.dimension {
            return Err(RagError::Validation(format!(
                "query vector has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }

        let store = self.records.read();
        let mut matches: Vec<IndexMatch> = store
            .iter()
            .filter(|record| filter.map_or(true, |f| f.matches(&record.metadata)))
            .map(|record| IndexMatch {
                id: record.chunk_id.clone(),
                score: cosine(vector, &record.embedding),
                metadata: record.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn scan(
        &self,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> Result<Vec<ScanRecord>, RagError> {
        let store = self.records.read();
        Ok(store
            .iter()
            .filter(|record| filter.map_or(true, |f| f.matches(&record.metadata)))
            .take(limit)
            .map(|record| ScanRecord {
                id: record.chunk_id.clone(),
                metadata: record.metadata.clone(),
            })
            .collect())
    }

    async fn stats(&self) -> Result<IndexStats, RagError> {
        Ok(IndexStats {
            count: self.records.read().len(),
            dimension: self.dimension,
            metric: "cosine".to_string(),
        })
    }

    async fn replace(
        &self,
        filter: &MetadataFilter,
        records: Vec<IndexRecord>,
    ) -> Result<(), RagError> {
        self.validate(&records)?;
        let mut store = self.records.write();
        store.retain(|record| !filter.matches(&record.metadata));
        Self::upsert_locked(&mut store, records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn record(id: &str, doc_id: &str, vector: Vec<f32>) -> IndexRecord {
        let mut metadata = Metadata::new();
        metadata.insert("doc_id".into(), doc_id.into());
        metadata.insert("chunk_id".into(), id.into());
        metadata.insert("text".into(), format!("text of {}", id).into());
        IndexRecord {
            chunk_id: id.to_string(),
            embedding: vector,
            metadata,
        }
    }

    #[tokio::test]
    async fn query_ranks_by_cosine_similarity() {
        let index = MemoryIndex::new(3);
        index
            .upsert(vec![
                record("a:0", "a", vec![1.0, 0.0, 0.0]),
                record("a:1", "a", vec![0.0, 1.0, 0.0]),
                record("a:2", "a", vec![0.9, 0.1, 0.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a:0");
        assert_eq!(matches[1].id, "a:2");
        assert!(matches[0].score > matches[1].score);
    }

    #[tokio::test]
    async fn rejects_zero_vectors_and_bad_dimensions() {
        let index = MemoryIndex::new(3);
        let result = index.upsert(vec![record("z", "z", vec![0.0, 0.0, 0.0])]).await;
        assert!(matches!(result, Err(RagError::Validation(_))));

        let result = index.upsert(vec![record("d", "d", vec![1.0])]).await;
        assert!(matches!(result, Err(RagError::Validation(_))));
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let index = MemoryIndex::new(2);
        index
            .upsert(vec![record("a:0", "a", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(vec![record("a:0", "a", vec![0.0, 1.0])])
            .await
            .unwrap();

        let stats = index.stats().await.unwrap();
        assert_eq!(stats.count, 1);
        let matches = index.query(&[0.0, 1.0], 1, None).await.unwrap();
        assert!(matches[0].score > 0.99);
    }

    #[tokio::test]
    async fn replace_swaps_document_snapshot() {
        let index = MemoryIndex::new(2);
        index
            .upsert(vec![
                record("a:0", "a", vec![1.0, 0.0]),
                record("a:1", "a", vec![0.0, 1.0]),
                record("b:0", "b", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        index
            .replace(
                &MetadataFilter::for_doc("a"),
                vec![record("a:new", "a", vec![0.5, 0.5])],
            )
            .await
            .unwrap();

        let scan = index.scan(None, 100).await.unwrap();
        let ids: Vec<&str> = scan.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"a:new"));
        assert!(ids.contains(&"b:0"));
        assert!(!ids.contains(&"a:0"));
        assert!(!ids.contains(&"a:1"));
    }

    #[tokio::test]
    async fn delete_by_filter_removes_only_matching() {
        let index = MemoryIndex::new(2);
        index
            .upsert(vec![
                record("a:0", "a", vec![1.0, 0.0]),
                record("b:0", "b", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let deleted = index
            .delete_by_filter(&MetadataFilter::for_doc("a"))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(index.stats().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn scan_honors_limit_and_filter() {
        let index = MemoryIndex::new(2);
        let records: Vec<IndexRecord> = (0..10)
            .map(|i| record(&format!("a:{}", i), "a", vec![1.0, i as f32]))
            .collect();
        index.upsert(records).await.unwrap();

        let scan = index.scan(None, 4).await.unwrap();
        assert_eq!(scan.len(), 4);

        let scan = index
            .scan(Some(&MetadataFilter::for_doc("zzz")), 100)
            .await
            .unwrap();
        assert!(scan.is_empty());
    }
}
