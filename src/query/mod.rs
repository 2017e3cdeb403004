pub mod intent;
pub mod normalizer;
pub mod spell;

use crate::types::QueryContext;

/// Run the full query-analysis front end: spell correction, normalization,
/// sub-question detection, keyword extraction, and intent classification.
pub fn build_query_context(raw: &str) -> QueryContext {
    let corrected = spell::correct(raw);
    let normalized = normalizer::normalize(&corrected);
    let sub_questions = normalizer::detect_sub_questions(&normalized);
    let keywords = normalizer::extract_keywords(&normalized);
    let analysis = intent::analyze(&normalized, sub_questions.len());

    QueryContext {
        raw: raw.to_string(),
        normalized,
        intent: analysis.intent,
        intent_confidence: analysis.confidence,
        complexity: analysis.complexity,
        keywords,
        sub_questions,
        matched_categories: analysis
            .matched_categories
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueryIntent;

    #[test]
    fn ped_query_normalizes_and_classifies() {
        let ctx = build_query_context("What are the PED exclusions?");
        assert_eq!(ctx.normalized, "what are the preexisting diseases exclusions?");
        assert_eq!(ctx.intent, QueryIntent::Exclusion);
        assert_eq!(
            ctx.sub_questions,
            vec!["what are the preexisting diseases exclusions?"]
        );
        assert!(ctx
            .matched_categories
            .iter()
            .any(|c| c == "preexisting_diseases"));
        assert!(ctx.matched_categories.iter().any(|c| c == "exclusions"));
    }

    #[test]
    fn context_keeps_raw_question_untouched() {
        let ctx = build_query_context("What Are The PED Exclusions?");
        assert_eq!(ctx.raw, "What Are The PED Exclusions?");
        assert_ne!(ctx.raw, ctx.normalized);
    }
}
