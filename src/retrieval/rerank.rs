//! Structural ranking and context-aware re-ranking.
//!
//! Structural rank encodes domain-category co-occurrence between query and
//! candidate: rank 1 for a shared legal category, rank 2 for a generic
//! legal-term overlap without a shared category, rank 3 otherwise. The
//! context-aware pass then boosts candidates whose section matches the
//! query's primary intent, re-sorting within each rank bucket only.

use crate::domain::{self, LegalCategory};
use crate::types::{sort_results, QueryIntent, RetrievalResult};

/// Generic terms checked on the query side for the rank-2 overlap.
const GENERIC_QUERY_TERMS: &[&str] = &["exclusion", "limit", "limitation", "not covered"];

/// Compute the structural rank of a candidate text against the query. Both
/// arguments are expected lowercase; matching is substring-based the way
/// chunk text actually reads ("exclusions", "limitations").
pub fn structural_rank(text: &str, query: &str) -> u8 {
    for category in LegalCategory::ALL {
        let in_text = category
            .surface_forms()
            .iter()
            .any(|form| text.contains(form));
        if in_text {
            let in_query = category
                .surface_forms()
                .iter()
                .any(|form| query.contains(form));
            if in_query {
                return 1;
            }
        }
    }

    let text_generic = domain::GENERIC_OVERLAP_TERMS
        .iter()
        .any(|term| text.contains(term));
    let query_generic = GENERIC_QUERY_TERMS.iter().any(|term| query.contains(term));
    if text_generic && query_generic {
        return 2;
    }

    3
}

/// Assign structural ranks to every result and apply the deterministic
/// ordering (rank asc, combined score desc, chunk id asc).
pub fn apply_structural_ranks(results: &mut Vec<RetrievalResult>, normalized_query: &str) {
    for result in results.iter_mut() {
        result.structural_rank = structural_rank(&result.text.to_lowercase(), normalized_query);
    }
    sort_results(results);
}

/// Context-aware re-rank: a multiplicative bonus of up to +0.1 on the
/// combined score when the candidate's section title or metadata category
/// matches the query's primary intent. Buckets never cross; the final sort
/// keys on structural rank first.
pub fn apply_intent_boost(results: &mut Vec<RetrievalResult>, intent: QueryIntent) {
    let cues = domain::intent_section_cues(intent);
    if cues.is_empty() {
        return;
    }

    for result in results.iter_mut() {
        let section = result.section_title().to_lowercase();
        let category = result
            .metadata
            .get("category")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_lowercase();

        let matched = cues
            .iter()
            .any(|cue| section.contains(cue) || category.contains(cue));
        if matched {
            result.combined_score = (result.combined_score * 1.1).min(1.0);
        }
    }

    sort_results(results);
}
