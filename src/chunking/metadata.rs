//! Chunk metadata construction.
//!
//! The vector index only accepts scalar or list-of-string metadata values, so
//! legal-term frequencies are represented as a flat occurrence list (one
//! entry per occurrence, in order of appearance) rather than a mapping.

use crate::domain;
use crate::types::{Chunk, ChunkingMethod, Metadata, MetadataValue};

/// Result of scanning text for recognized legal terms.
pub struct LegalTermAnalysis {
    /// One entry per occurrence, ordered by position in the text.
    pub occurrences: Vec<String>,
    /// occurrences / total whitespace tokens, in [0, 1].
    pub density: f32,
    pub is_legal_document: bool,
}

/// Scan text for the general legal vocabulary. Matching is whole-word and
/// case-insensitive.
pub fn analyze_legal_terms(text: &str) -> LegalTermAnalysis {
    let lower = text.to_lowercase();
    let total_words = lower.split_whitespace().count();

    let mut positioned: Vec<(usize, &str)> = Vec::new();
    for term in domain::LEGAL_TERMS {
        let mut from = 0;
        while let Some(pos) = lower[from..].find(term) {
            let start = from + pos;
            let end = start + term.len();
            let before_ok = start == 0
                || !lower[..start]
                    .chars()
                    .next_back()
                    .is_some_and(|c| c.is_alphanumeric());
            let after_ok = end == lower.len()
                || !lower[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
            if before_ok && after_ok {
                positioned.push((start, term));
            }
            from = end.max(from + 1);
            if from >= lower.len() {
                break;
            }
        }
    }
    positioned.sort_by_key(|(pos, _)| *pos);

    let occurrences: Vec<String> = positioned.into_iter().map(|(_, t)| t.to_string()).collect();
    let density = if total_words == 0 {
        0.0
    } else {
        occurrences.len() as f32 / total_words as f32
    };

    LegalTermAnalysis {
        density,
        is_legal_document: density > 0.01,
        occurrences,
    }
}

/// Build the index metadata for a chunk. Every value is a scalar or a list
/// of strings; the chunk text itself is carried in metadata so query-time
/// consumers can render it without a second lookup.
pub fn build_chunk_metadata(chunk: &Chunk, doc_type: &str, extra: &Metadata) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("doc_id".into(), chunk.doc_id.clone().into());
    metadata.insert("doc_title".into(), chunk.doc_title.clone().into());
    metadata.insert("doc_type".into(), doc_type.into());
    metadata.insert("chunk_id".into(), chunk.chunk_id.clone().into());
    metadata.insert("text".into(), chunk.text.clone().into());
    metadata.insert("word_count".into(), (chunk.word_count as f64).into());
    metadata.insert("legal_density".into(), (chunk.legal_density as f64).into());
    metadata.insert(
        "is_legal_document".into(),
        (chunk.legal_density > 0.01).into(),
    );
    metadata.insert(
        "legal_terms".into(),
        MetadataValue::StrList(chunk.legal_terms.clone()),
    );
    metadata.insert(
        "chunking_method".into(),
        match chunk.chunking_method {
            ChunkingMethod::PolicySection => "policy_section",
            ChunkingMethod::LegalSection => "legal_section",
            ChunkingMethod::SlidingWindow => "sliding_window",
        }
        .into(),
    );

    if let Some(ref anchor) = chunk.section_anchor {
        metadata.insert("section_anchor".into(), anchor.clone().into());
    }
    if let Some(ref title) = chunk.section_title {
        metadata.insert("section_title".into(), title.clone().into());
    }
    if let Some(page) = chunk.page_number {
        metadata.insert("page_number".into(), (page as f64).into());
    }

    // Caller-supplied metadata never overrides the pipeline's own fields.
    for (key, value) in extra {
        metadata.entry(key.clone()).or_insert_with(|| value.clone());
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkingMethod;

    fn sample_chunk(text: &str) -> Chunk {
        let analysis = analyze_legal_terms(text);
        Chunk {
            chunk_id: "d:0".into(),
            doc_id: "d".into(),
            doc_title: "Doc".into(),
            section_anchor: Some("1.2".into()),
            section_title: Some("1.2 EXCLUSIONS".into()),
            page_number: None,
            word_count: text.split_whitespace().count(),
            legal_density: analysis.density,
            legal_terms: analysis.occurrences,
            chunking_method: ChunkingMethod::PolicySection,
            text: text.to_string(),
        }
    }

    #[test]
    fn occurrences_preserve_order_and_repetition() {
        let analysis =
            analyze_legal_terms("The contract names each party. A breach of contract ends it.");
        assert_eq!(analysis.occurrences, ["contract", "party", "breach", "contract"]);
    }

    #[test]
    fn density_counts_occurrences_over_words() {
        let analysis =
            analyze_legal_terms("breach breach breach plus six more filler words here");
        assert_eq!(analysis.occurrences.len(), 3);
        assert!((analysis.density - 3.0 / 9.0).abs() < 1e-6);
        assert!(analysis.is_legal_document);
    }

    #[test]
    fn empty_text_has_zero_density() {
        let analysis = analyze_legal_terms("");
        assert_eq!(analysis.density, 0.0);
        assert!(!analysis.is_legal_document);
        assert!(analysis.occurrences.is_empty());
    }

    #[test]
    fn metadata_has_no_mapping_values() {
        let chunk = sample_chunk("This clause covers termination of the agreement.");
        let metadata = build_chunk_metadata(&chunk, "policy", &Metadata::new());

        // Every value round-trips as a scalar or a list of strings.
        for value in metadata.values() {
            let json = serde_json::to_value(value).unwrap();
            assert!(!json.is_object(), "metadata value must not be a mapping");
        }
        assert!(matches!(
            metadata.get("legal_terms"),
            Some(MetadataValue::StrList(_))
        ));
        assert_eq!(
            metadata.get("chunking_method").and_then(|v| v.as_str()),
            Some("policy_section")
        );
    }

    #[test]
    fn caller_metadata_cannot_override_pipeline_fields() {
        let chunk = sample_chunk("Some text");
        let mut extra = Metadata::new();
        extra.insert("doc_id".into(), "spoofed".into());
        extra.insert("department".into(), "claims".into());

        let metadata = build_chunk_metadata(&chunk, "policy", &extra);
        assert_eq!(metadata.get("doc_id").and_then(|v| v.as_str()), Some("d"));
        assert_eq!(
            metadata.get("department").and_then(|v| v.as_str()),
            Some("claims")
        );
    }
}
