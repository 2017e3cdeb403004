//! Structured response envelope returned for every query.
//!
//! A response is produced once per query and never mutated. The
//! `response_type` variant constrains the rest of the envelope: `error` and
//! `no_results` carry empty sources, populated warnings, and zeroed
//! confidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::QueryContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    DirectAnswer,
    Procedural,
    Exclusion,
    Coverage,
    Claim,
    WaitingPeriod,
    Premium,
    Renewal,
    Termination,
    Limitation,
    General,
    Error,
    NoResults,
}

impl ResponseType {
    pub fn category(&self) -> &'static str {
        match self {
            Self::DirectAnswer => "information",
            Self::Procedural => "procedure",
            Self::Exclusion => "exclusion",
            Self::Coverage => "coverage",
            Self::Claim => "claim",
            Self::WaitingPeriod => "timing",
            Self::Premium => "financial",
            Self::Renewal => "renewal",
            Self::Termination => "termination",
            Self::Limitation => "limitation",
            Self::General => "general",
            Self::Error => "error",
            Self::NoResults => "no_results",
        }
    }

    /// Template prefix prepended to the cleaned answer text.
    pub fn answer_prefix(&self) -> Option<&'static str> {
        match self {
            Self::DirectAnswer => Some("Based on the policy document: "),
            Self::Procedural => Some("According to the policy procedures: "),
            Self::Exclusion => Some("Important exclusion information: "),
            Self::Coverage => Some("Coverage details: "),
            Self::Claim => Some("Claim process information: "),
            Self::WaitingPeriod => Some("Waiting period information: "),
            Self::Premium => Some("Premium-related information: "),
            Self::Renewal => Some("Renewal information: "),
            Self::Termination => Some("Termination details: "),
            Self::Limitation => Some("Limitation information: "),
            Self::General | Self::Error | Self::NoResults => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            Self::High
        } else if score >= 0.6 {
            Self::Medium
        } else if score >= 0.4 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub overall: f32,
    pub level: ConfidenceLevel,
    pub source_relevance: f32,
    pub response_completeness: f32,
    pub citation_quality: f32,
    pub length_factor: f32,
}

impl ConfidenceReport {
    pub fn zero() -> Self {
        Self {
            overall: 0.0,
            level: ConfidenceLevel::VeryLow,
            source_relevance: 0.0,
            response_completeness: 0.0,
            citation_quality: 0.0,
            length_factor: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub doc_id: String,
    pub doc_title: String,
    pub section_title: String,
    pub section_anchor: Option<String>,
    pub page_number: Option<u32>,
    pub chunk_id: String,
    pub similarity_score: f32,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub structural_rank: u8,
    pub retrieval_method: String,
    pub text_preview: String,
    pub has_citations: bool,
    pub word_count: usize,
    pub legal_density: f32,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub matched_keywords: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub clause_identifiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceCoverage {
    pub documents: usize,
    pub pages: usize,
    pub sections: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    pub total_count: usize,
    pub documents: Vec<SourceRef>,
    pub coverage: SourceCoverage,
}

impl SourceSummary {
    pub fn empty() -> Self {
        Self {
            total_count: 0,
            documents: Vec::new(),
            coverage: SourceCoverage {
                documents: 0,
                pages: 0,
                sections: 0,
                total_chunks: 0,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParameters {
    pub threshold_used: f32,
    pub adaptive: bool,
    pub method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIndicators {
    pub completeness: f32,
    pub specificity: f32,
    pub citation_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    LowConfidence,
    LowThreshold,
    NoSources,
    LimitedSources,
    ShortAnswer,
    FallbackUsed,
    UnansweredSubQuestions,
    TechnicalError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub severity: WarningSeverity,
    pub message: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ImproveQuery,
    AddDocuments,
    ProceduralQuery,
    RetryQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: RecommendationPriority,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub examples: Vec<String>,
}

/// A clause identifier detected in the retrieved context, cross-referenced
/// against the generated answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseReference {
    pub identifier: String,
    pub source_chunk_id: Option<String>,
    pub found_in_response: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysisReport {
    pub original_query: String,
    pub normalized_query: String,
    pub intent: String,
    pub intent_confidence: f32,
    pub complexity: String,
    pub normalization_changed: bool,
    pub sub_question_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAnalysisReport {
    pub total_sources: usize,
    pub unique_documents: usize,
    pub pages_covered: usize,
    pub sections_covered: usize,
    pub retrieval_methods: HashMap<String, usize>,
    pub average_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub threshold_used: f32,
    /// Pipeline stages that fired, in order.
    pub stages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explainability {
    pub query_analysis: QueryAnalysisReport,
    pub source_analysis: SourceAnalysisReport,
    pub audit_trail: AuditTrail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResponse {
    pub response_id: String,
    pub timestamp: DateTime<Utc>,
    pub answer: String,
    pub response_type: ResponseType,
    pub category: String,
    pub query: QueryContext,
    pub confidence: ConfidenceReport,
    pub sources: SourceSummary,
    pub search_parameters: SearchParameters,
    pub quality_indicators: QualityIndicators,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub clause_references: Vec<ClauseReference>,
    pub warnings: Vec<Warning>,
    pub recommendations: Vec<Recommendation>,
    pub explainability: Explainability,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_levels_follow_score_bands() {
        assert_eq!(ConfidenceLevel::from_score(0.85), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.65), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.45), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0.1), ConfidenceLevel::VeryLow);
    }

    #[test]
    fn response_types_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&ResponseType::WaitingPeriod).unwrap(),
            "\"waiting_period\""
        );
        assert_eq!(
            serde_json::to_string(&ResponseType::NoResults).unwrap(),
            "\"no_results\""
        );
    }

    #[test]
    fn error_and_no_results_have_no_prefix() {
        assert!(ResponseType::Error.answer_prefix().is_none());
        assert!(ResponseType::NoResults.answer_prefix().is_none());
        assert!(ResponseType::Coverage.answer_prefix().is_some());
    }
}
