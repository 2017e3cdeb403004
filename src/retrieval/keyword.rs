//! Keyword scoring and the keyword-anchoring fallback.
//!
//! The keyword score blends density (0.4), query-keyword coverage (0.4),
//! and an earliest-occurrence position bonus (0.2). These weights belong to
//! the keyword score alone; semantic-vs-keyword fusion uses its own weights
//! in the hybrid pipeline.

use tracing::{debug, info};

use crate::config::FallbackConfig;
use crate::domain;
use crate::error::RagError;
use crate::providers::VectorIndex;
use crate::retrieval::rerank::structural_rank;
use crate::types::{
    sort_results, Metadata, MetadataFilter, QueryContext, RetrievalMethod, RetrievalResult,
};

const DENSITY_WEIGHT: f32 = 0.4;
const COVERAGE_WEIGHT: f32 = 0.4;
const POSITION_WEIGHT: f32 = 0.2;

/// Score a candidate text against the query keywords. Returns the score in
/// [0, 1] and the keywords that matched. `text` is expected lowercase.
pub fn keyword_score(text: &str, keywords: &[String]) -> (f32, Vec<String>) {
    if keywords.is_empty() || text.is_empty() {
        return (0.0, Vec::new());
    }

    let total_words = text.split_whitespace().count().max(1);
    let mut matched = Vec::new();
    let mut occurrences = 0usize;
    let mut earliest: Option<usize> = None;

    for keyword in keywords {
        let needle = keyword.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let mut from = 0;
        let mut found = false;
        while let Some(pos) = text[from..].find(&needle) {
            found = true;
            occurrences += 1;
            let absolute = from + pos;
            earliest = Some(earliest.map_or(absolute, |e| e.min(absolute)));
            from = absolute + needle.len();
            if from >= text.len() {
                break;
            }
        }
        if found {
            matched.push(keyword.clone());
        }
    }

    if matched.is_empty() {
        return (0.0, Vec::new());
    }

    let density = occurrences as f32 / total_words as f32;
    let coverage = matched.len() as f32 / keywords.len() as f32;
    let position = earliest
        .map(|pos| 1.0 - pos as f32 / text.len() as f32)
        .unwrap_or(0.0);

    let score =
        density * DENSITY_WEIGHT + coverage * COVERAGE_WEIGHT + position * POSITION_WEIGHT;
    (score.clamp(0.0, 1.0), matched)
}

/// Extract anchoring keywords from the normalized query: every surface form
/// of every matched domain category, general legal terms literally present,
/// and query tokens from the relevant-word list. Order-preserving dedup.
pub fn extract_anchor_keywords(normalized: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let mut push_unique = |candidate: &str, keywords: &mut Vec<String>| {
        if !keywords.iter().any(|k| k == candidate) {
            keywords.push(candidate.to_string());
        }
    };

    for category in domain::matched_categories(normalized) {
        for form in category.surface_forms() {
            push_unique(form, &mut keywords);
        }
    }

    for term in domain::ANCHORING_LEGAL_TERMS {
        if normalized.contains(term) {
            push_unique(term, &mut keywords);
        }
    }

    for token in normalized.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric());
        if domain::ANCHORING_RELEVANT_WORDS.contains(&token) {
            push_unique(token, &mut keywords);
        }
    }

    keywords
}

/// Keyword-anchoring fallback: scan up to `max_keyword_search_vectors`
/// records and return the best `max_keyword_results` by keyword relevance.
/// Activated only when the semantic stages leave zero survivors.
pub async fn keyword_anchoring(
    index: &dyn VectorIndex,
    ctx: &QueryContext,
    filter: Option<&MetadataFilter>,
    config: &FallbackConfig,
) -> Result<Vec<RetrievalResult>, RagError> {
    let keywords = extract_anchor_keywords(&ctx.normalized);
    if keywords.is_empty() {
        debug!("no anchoring keywords extracted, skipping fallback");
        return Ok(Vec::new());
    }

    info!(keywords = ?keywords, "applying keyword anchoring backup");

    let records = index
        .scan(filter, config.max_keyword_search_vectors)
        .await?;

    let mut results = Vec::new();
    for record in records {
        let text = record
            .metadata
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let (score, matched) = keyword_score(&text.to_lowercase(), &keywords);
        if score <= 0.0 {
            continue;
        }

        let rank = structural_rank(&text.to_lowercase(), &ctx.normalized);
        results.push(build_anchoring_result(
            record.id,
            text,
            record.metadata,
            score,
            rank,
            matched,
        ));
    }

    sort_results(&mut results);
    results.truncate(config.max_keyword_results);

    info!(count = results.len(), "keyword anchoring results");
    Ok(results)
}

fn build_anchoring_result(
    chunk_id: String,
    text: String,
    metadata: Metadata,
    score: f32,
    rank: u8,
    matched: Vec<String>,
) -> RetrievalResult {
    RetrievalResult {
        chunk_id,
        text,
        metadata,
        semantic_score: 0.0,
        keyword_score: score,
        combined_score: score,
        structural_rank: rank,
        retrieval_method: RetrievalMethod::KeywordAnchoring,
        matched_keywords: matched,
    }
}
