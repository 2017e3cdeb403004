//! Query normalization and sub-question detection.
//!
//! Normalization lowercases, collapses whitespace, and maps domain synonyms
//! ("PED", "pre-existing disease") onto canonical tokens. Synonyms apply
//! only as whole-word matches, longest form first, and the pass repeats to a
//! fixpoint so normalization is idempotent.

use crate::domain::SYNONYM_TABLE;

/// Canonicalize a query. Idempotent: `normalize(normalize(q)) == normalize(q)`.
pub fn normalize(query: &str) -> String {
    let mut result = collapse_whitespace(&query.to_lowercase());

    // Repeat until stable; a replacement can surface a new multi-word form
    // ("not covered period" -> "exclusion period" -> "waiting period").
    for _ in 0..SYNONYM_TABLE.len() {
        let mut changed = false;
        for (surface, canonical) in SYNONYM_TABLE.iter() {
            if result.contains(surface) {
                let replaced = replace_whole_word(&result, surface, canonical);
                if replaced != result {
                    result = replaced;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    collapse_whitespace(&result)
}

/// Replace every whole-word occurrence of `from` with `to`. Word boundaries
/// are non-alphanumeric characters or string edges. Inputs are expected
/// lowercase.
pub fn replace_whole_word(text: &str, from: &str, to: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(from) {
        let end = pos + from.len();
        let before_ok = pos == 0
            || !rest[..pos]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after_ok = end == rest.len()
            || !rest[end..].chars().next().is_some_and(|c| c.is_alphanumeric());

        if before_ok && after_ok {
            result.push_str(&rest[..pos]);
            result.push_str(to);
        } else {
            result.push_str(&rest[..end]);
        }
        rest = &rest[end..];
    }
    result.push_str(rest);
    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a (normalized) query into sub-questions. Tries the separators in
/// order: comma, semicolon, " and ", multiple question marks. Fragments
/// shorter than 4 characters are dropped, every fragment is given a
/// trailing question mark, and a query with no separators comes back as a
/// single-element list. Total: never fails, never returns an empty list.
pub fn detect_sub_questions(query: &str) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() {
        return vec![String::new()];
    }

    let mut questions = split_and_clean(query, ",");
    if questions.is_empty() {
        questions = split_and_clean(query, ";");
    }
    if questions.is_empty() {
        questions = split_and_clean(query, " and ");
    }
    if questions.is_empty() && query.matches('?').count() > 1 {
        questions = query
            .split('?')
            .map(str::trim)
            .filter(|part| part.len() > 3)
            .map(|part| format!("{}?", part))
            .collect();
    }

    if questions.is_empty() {
        return vec![with_question_mark(query)];
    }
    questions
}

fn split_and_clean(query: &str, separator: &str) -> Vec<String> {
    if !query.contains(separator) {
        return Vec::new();
    }
    query
        .split(separator)
        .map(str::trim)
        .filter(|part| part.len() > 3)
        .map(with_question_mark)
        .collect()
}

fn with_question_mark(fragment: &str) -> String {
    if fragment.ends_with('?') {
        fragment.to_string()
    } else {
        format!("{}?", fragment)
    }
}

/// Extract content keywords from a normalized query: stop words and tokens
/// of fewer than three characters are dropped.
pub fn extract_keywords(query: &str) -> Vec<String> {
    const STOP_WORDS: &[&str] = &[
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
        "did", "will", "would", "could", "should", "may", "might", "can", "what", "when", "where",
        "why", "how",
    ];

    query
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|word| word.len() > 2 && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_ped_to_canonical_form() {
        assert_eq!(
            normalize("What are the PED exclusions?"),
            "what are the preexisting diseases exclusions?"
        );
    }

    #[test]
    fn synonyms_apply_whole_word_only() {
        // "ped" inside "pedestrian" must not be replaced.
        assert_eq!(normalize("pedestrian access"), "pedestrian access");
    }

    #[test]
    fn longest_form_wins() {
        assert_eq!(
            normalize("pre-existing disease cover"),
            "preexisting diseases cover"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        for query in [
            "What are the PED exclusions?",
            "is the waiting time over, and what about not covered items?",
            "EXCLUSION PERIOD for knee surgery",
        ] {
            let once = normalize(query);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", query);
        }
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(normalize("  what \t is   covered  "), "what is covered");
    }

    #[test]
    fn no_separator_returns_single_question() {
        assert_eq!(
            detect_sub_questions("what is the deductible"),
            vec!["what is the deductible?"]
        );
    }

    #[test]
    fn splits_on_commas() {
        let questions = detect_sub_questions(
            "what is covered, what is excluded, what is the waiting period",
        );
        assert_eq!(
            questions,
            vec![
                "what is covered?",
                "what is excluded?",
                "what is the waiting period?"
            ]
        );
    }

    #[test]
    fn splits_on_and_when_no_commas() {
        let questions = detect_sub_questions("what is covered and what is the premium");
        assert_eq!(questions.len(), 2);
        assert!(questions.iter().all(|q| q.ends_with('?')));
    }

    #[test]
    fn splits_on_multiple_question_marks() {
        let questions = detect_sub_questions("what is covered? what is excluded?");
        assert_eq!(questions, vec!["what is covered?", "what is excluded?"]);
    }

    #[test]
    fn drops_short_fragments() {
        let questions = detect_sub_questions("what is the deductible, ok");
        assert_eq!(questions, vec!["what is the deductible?"]);
    }

    #[test]
    fn detector_is_total_on_empty_input() {
        assert_eq!(detect_sub_questions(""), vec![String::new()]);
    }

    #[test]
    fn detection_is_stable_under_renormalization() {
        let query = normalize("What is covered, and what is excluded?");
        let first = detect_sub_questions(&query);
        let second = detect_sub_questions(&normalize(&query));
        assert_eq!(first, second);
    }

    #[test]
    fn keywords_drop_stop_words() {
        let keywords = extract_keywords("what is the waiting period for surgery");
        assert_eq!(keywords, vec!["waiting", "period", "surgery"]);
    }
}
