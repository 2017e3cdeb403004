use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a chunk was carved out of its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingMethod {
    PolicySection,
    LegalSection,
    SlidingWindow,
}

/// A contiguous text fragment with retrieval metadata. Created during
/// ingestion, never mutated, deleted only with its owning document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub doc_title: String,
    /// Leading numeric identifier of the source section (e.g. "1.2") when
    /// the chunk is structure-derived.
    pub section_anchor: Option<String>,
    pub section_title: Option<String>,
    pub page_number: Option<u32>,
    pub word_count: usize,
    /// Fraction of tokens that are recognized legal terms, in [0, 1].
    pub legal_density: f32,
    /// One entry per legal-term occurrence, in order of appearance.
    pub legal_terms: Vec<String>,
    pub chunking_method: ChunkingMethod,
    pub text: String,
}

/// Metadata values accepted by the vector index: scalars or lists of
/// strings. There is deliberately no mapping variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Str(String),
    Num(f64),
    Bool(bool),
    StrList(Vec<String>),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type Metadata = HashMap<String, MetadataValue>;

/// One record written to the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    pub chunk_id: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
}

/// Equality filter over scalar metadata fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFilter {
    pub doc_id: Option<String>,
    pub doc_type: Option<String>,
    pub custom: HashMap<String, MetadataValue>,
}

impl MetadataFilter {
    pub fn for_doc(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: Some(doc_id.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.doc_id.is_none() && self.doc_type.is_none() && self.custom.is_empty()
    }

    /// Whether the given metadata satisfies every constraint in the filter.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        if let Some(ref doc_id) = self.doc_id {
            if metadata.get("doc_id").and_then(|v| v.as_str()) != Some(doc_id.as_str()) {
                return false;
            }
        }
        if let Some(ref doc_type) = self.doc_type {
            if metadata.get("doc_type").and_then(|v| v.as_str()) != Some(doc_type.as_str()) {
                return false;
            }
        }
        self.custom
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

/// Closed set of recognized query intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    InformationSeeking,
    Procedural,
    Coverage,
    Exclusion,
    Financial,
    Temporal,
    Claim,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InformationSeeking => "information_seeking",
            Self::Procedural => "procedural",
            Self::Coverage => "coverage",
            Self::Exclusion => "exclusion",
            Self::Financial => "financial",
            Self::Temporal => "temporal",
            Self::Claim => "claim",
        }
    }

    /// Fixed tie-break priority: lower wins.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Exclusion => 0,
            Self::Coverage => 1,
            Self::Temporal => 2,
            Self::Financial => 3,
            Self::Claim => 4,
            Self::Procedural => 5,
            Self::InformationSeeking => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Per-query analysis carried through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryContext {
    pub raw: String,
    pub normalized: String,
    pub intent: QueryIntent,
    pub intent_confidence: f32,
    pub complexity: Complexity,
    pub keywords: Vec<String>,
    /// Ordered decomposition when the raw question bundles several
    /// questions; always non-empty.
    pub sub_questions: Vec<String>,
    /// Domain categories with at least one surface-form match, by name.
    pub matched_categories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    Semantic,
    KeywordAnchoring,
    Hybrid,
}

/// One ranked retrieval candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub text: String,
    pub metadata: Metadata,
    pub semantic_score: f32,
    pub keyword_score: f32,
    /// In [0, 1].
    pub combined_score: f32,
    /// 1 is best, 3 is worst.
    pub structural_rank: u8,
    pub retrieval_method: RetrievalMethod,
    pub matched_keywords: Vec<String>,
}

impl RetrievalResult {
    pub fn doc_id(&self) -> &str {
        self.metadata
            .get("doc_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    pub fn doc_title(&self) -> &str {
        self.metadata
            .get("doc_title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    pub fn section_title(&self) -> &str {
        self.metadata
            .get("section_title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    pub fn section_anchor(&self) -> Option<&str> {
        self.metadata.get("section_anchor").and_then(|v| v.as_str())
    }

    pub fn page_number(&self) -> Option<u32> {
        self.metadata
            .get("page_number")
            .and_then(|v| v.as_num())
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32)
    }
}

/// Deterministic ordering shared by every stage that emits ranked results:
/// structural rank ascending, combined score descending, chunk id ascending.
pub fn sort_results(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        a.structural_rank
            .cmp(&b.structural_rank)
            .then(
                b.combined_score
                    .partial_cmp(&a.combined_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(chunk_id: &str, rank: u8, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk_id: chunk_id.to_string(),
            text: String::new(),
            metadata: Metadata::new(),
            semantic_score: score,
            keyword_score: 0.0,
            combined_score: score,
            structural_rank: rank,
            retrieval_method: RetrievalMethod::Hybrid,
            matched_keywords: Vec::new(),
        }
    }

    #[test]
    fn ordering_is_rank_then_score_then_id() {
        let mut results = vec![
            result("d:3", 2, 0.9),
            result("d:1", 1, 0.5),
            result("d:2", 1, 0.5),
            result("d:0", 1, 0.8),
        ];
        sort_results(&mut results);
        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, ["d:0", "d:1", "d:2", "d:3"]);
    }

    #[test]
    fn metadata_value_serializes_untagged() {
        let value = MetadataValue::StrList(vec!["claim".into(), "claim".into()]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"["claim","claim"]"#);
        let number: MetadataValue = serde_json::from_str("3.5").unwrap();
        assert_eq!(number, MetadataValue::Num(3.5));
    }

    #[test]
    fn filter_matches_on_doc_id_and_custom() {
        let mut metadata = Metadata::new();
        metadata.insert("doc_id".into(), "policy-1".into());
        metadata.insert("doc_type".into(), "policy".into());

        assert!(MetadataFilter::for_doc("policy-1").matches(&metadata));
        assert!(!MetadataFilter::for_doc("policy-2").matches(&metadata));

        let mut filter = MetadataFilter::default();
        filter
            .custom
            .insert("doc_type".into(), MetadataValue::Str("contract".into()));
        assert!(!filter.matches(&metadata));
    }
}
