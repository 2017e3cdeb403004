//! Intent classification for normalized legal queries.
//!
//! Each domain category votes for an intent with the number of its surface
//! forms found in the query. Ties break on a fixed priority order:
//! exclusion > coverage > temporal > financial > claim > procedural >
//! information_seeking.

use std::collections::HashMap;

use crate::domain::{self, LegalCategory};
use crate::types::{Complexity, QueryIntent};

/// Cue phrases that vote for the procedural intent without a category match.
const PROCEDURAL_CUES: &[&str] = &["how to", "process", "procedure", "steps", "submit", "file"];

pub struct IntentAnalysis {
    pub intent: QueryIntent,
    /// matched categories / total categories considered, in [0, 1].
    pub confidence: f32,
    pub complexity: Complexity,
    pub matched_categories: Vec<LegalCategory>,
}

/// Classify a normalized query. An empty query is information-seeking with
/// zero confidence.
pub fn analyze(normalized: &str, sub_question_count: usize) -> IntentAnalysis {
    let mut category_counts: Vec<(LegalCategory, usize)> = Vec::new();
    for category in LegalCategory::ALL {
        let count = category
            .surface_forms()
            .iter()
            .filter(|form| domain::contains_word(normalized, form))
            .count();
        if count > 0 {
            category_counts.push((category, count));
        }
    }

    let mut intent_scores: HashMap<QueryIntent, usize> = HashMap::new();
    for (category, count) in &category_counts {
        *intent_scores.entry(category.intent()).or_insert(0) += count;
    }
    if PROCEDURAL_CUES
        .iter()
        .any(|cue| normalized.contains(cue))
    {
        *intent_scores.entry(QueryIntent::Procedural).or_insert(0) += 1;
    }

    let intent = intent_scores
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.priority().cmp(&a.0.priority())))
        .map(|(intent, _)| *intent)
        .unwrap_or(QueryIntent::InformationSeeking);

    let matched_categories: Vec<LegalCategory> =
        category_counts.iter().map(|(c, _)| *c).collect();
    let confidence = matched_categories.len() as f32 / LegalCategory::ALL.len() as f32;

    let complexity = classify_complexity(
        normalized.split_whitespace().count(),
        sub_question_count,
        matched_categories.len(),
    );

    IntentAnalysis {
        intent,
        confidence,
        complexity,
        matched_categories,
    }
}

fn classify_complexity(
    word_count: usize,
    sub_question_count: usize,
    matched_categories: usize,
) -> Complexity {
    if sub_question_count > 2 || matched_categories >= 3 || word_count > 25 {
        Complexity::High
    } else if sub_question_count > 1 || matched_categories >= 2 || word_count > 10 {
        Complexity::Medium
    } else {
        Complexity::Low
    }
}
