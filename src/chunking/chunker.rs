//! Document chunking for legal and insurance text.
//!
//! The declared document type selects the method: numbered policy sections,
//! contract-style legal sections, or a token sliding window as the fallback.
//! Section chunks are atomic heading-to-heading blocks and may exceed the
//! window size; everything else respects `chunk_size`/`chunk_overlap`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::chunking::metadata::analyze_legal_terms;
use crate::types::{Chunk, ChunkingMethod};

static POLICY_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s+[A-Z][^\n]*$").expect("policy heading regex is valid")
});

static LEGAL_KEYWORD_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:ARTICLE|SECTION|CLAUSE)\s+(\d+)\b.*$").expect("legal heading regex is valid")
});

static LEGAL_NUMBERED_CAPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.\s+[A-Z][A-Z\s]*$").expect("numbered caps heading regex is valid")
});

pub struct LegalChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl LegalChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Chunk a document according to its declared type. Preserves source
    /// order; empty input yields an empty list.
    pub fn chunk_document(
        &self,
        doc_id: &str,
        doc_type: &str,
        doc_title: &str,
        text: &str,
    ) -> Vec<Chunk> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        match method_for_doc_type(doc_type) {
            ChunkingMethod::PolicySection => {
                self.chunk_by_sections(doc_id, doc_title, text, ChunkingMethod::PolicySection)
            }
            ChunkingMethod::LegalSection => {
                self.chunk_by_sections(doc_id, doc_title, text, ChunkingMethod::LegalSection)
            }
            ChunkingMethod::SlidingWindow => {
                self.sliding_window(doc_id, doc_title, text, &mut 0)
            }
        }
    }

    /// Section-driven segmentation. Lines matching the heading pattern open
    /// a new chunk whose text runs up to the next heading. Text before the
    /// first heading is emitted as sliding-window chunks so nothing is lost.
    /// A document with no detectable headings falls back entirely to the
    /// sliding window.
    fn chunk_by_sections(
        &self,
        doc_id: &str,
        doc_title: &str,
        text: &str,
        method: ChunkingMethod,
    ) -> Vec<Chunk> {
        let lines: Vec<&str> = text.lines().collect();
        let headings: Vec<(usize, String, String)> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| {
                heading_anchor(line.trim(), method).map(|anchor| (i, anchor, line.trim().to_string()))
            })
            .collect();

        if headings.is_empty() {
            return self.sliding_window(doc_id, doc_title, text, &mut 0);
        }

        let mut chunks = Vec::new();
        let mut window_index = 0usize;
        let mut anchor_counts: HashMap<String, usize> = HashMap::new();

        // Preamble before the first heading.
        let preamble = lines[..headings[0].0].join("\n");
        let preamble = preamble.trim();
        if !preamble.is_empty() {
            chunks.extend(self.sliding_window(doc_id, doc_title, preamble, &mut window_index));
        }

        for (section_idx, (line_idx, anchor, title)) in headings.iter().enumerate() {
            let end_line = headings
                .get(section_idx + 1)
                .map(|(next, _, _)| *next)
                .unwrap_or(lines.len());
            let section_text = lines[*line_idx..end_line].join("\n");
            let section_text = section_text.trim().to_string();
            if section_text.is_empty() {
                continue;
            }

            // Repeated anchors get a disambiguating suffix so ids stay unique.
            let seen = anchor_counts.entry(anchor.clone()).or_insert(0);
            let chunk_id = if *seen == 0 {
                format!("{}:section_{}", doc_id, anchor)
            } else {
                format!("{}:section_{}_{}", doc_id, anchor, seen)
            };
            *seen += 1;

            let word_count = section_text.split_whitespace().count();
            let analysis = analyze_legal_terms(&section_text);

            chunks.push(Chunk {
                chunk_id,
                doc_id: doc_id.to_string(),
                doc_title: doc_title.to_string(),
                section_anchor: Some(anchor.clone()),
                section_title: Some(title.clone()),
                page_number: None,
                word_count,
                legal_density: analysis.density,
                legal_terms: analysis.occurrences,
                chunking_method: method,
                text: section_text,
            });
        }

        chunks
    }

    /// Token sliding window: windows of `chunk_size` whitespace tokens with
    /// `chunk_overlap` tokens of overlap. Boundaries always fall on
    /// whitespace. Text shorter than one window becomes a single chunk.
    fn sliding_window(
        &self,
        doc_id: &str,
        doc_title: &str,
        text: &str,
        next_index: &mut usize,
    ) -> Vec<Chunk> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(tokens.len());
            let window_text = tokens[start..end].join(" ");
            let analysis = analyze_legal_terms(&window_text);

            chunks.push(Chunk {
                chunk_id: format!("{}:{}", doc_id, *next_index),
                doc_id: doc_id.to_string(),
                doc_title: doc_title.to_string(),
                section_anchor: None,
                section_title: None,
                page_number: None,
                word_count: end - start,
                legal_density: analysis.density,
                legal_terms: analysis.occurrences,
                chunking_method: ChunkingMethod::SlidingWindow,
                text: window_text,
            });
            *next_index += 1;

            if end == tokens.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl Default for LegalChunker {
    fn default() -> Self {
        Self::new(800, 300)
    }
}

/// Map a declared document type to its chunking method.
pub fn method_for_doc_type(doc_type: &str) -> ChunkingMethod {
    match doc_type.to_lowercase().as_str() {
        "policy" | "insurance_policy" | "health_policy" => ChunkingMethod::PolicySection,
        "contract" | "agreement" | "legal_contract" => ChunkingMethod::LegalSection,
        _ => ChunkingMethod::SlidingWindow,
    }
}

fn heading_anchor(line: &str, method: ChunkingMethod) -> Option<String> {
    match method {
        ChunkingMethod::PolicySection => POLICY_HEADING_RE
            .captures(line)
            .map(|cap| cap[1].to_string()),
        ChunkingMethod::LegalSection => LEGAL_KEYWORD_HEADING_RE
            .captures(line)
            .or_else(|| LEGAL_NUMBERED_CAPS_RE.captures(line))
            .map(|cap| cap[1].to_string()),
        ChunkingMethod::SlidingWindow => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_sections_split_on_numbered_headings() {
        let text = "1.1 COVERAGE\nAll hospitalization expenses are covered.\n1.2 EXCLUSIONS\nPre-existing disease is excluded for 36 months.\n2.1 DEDUCTIBLE\nA deductible of 5000 applies per claim.";
        let chunker = LegalChunker::default();
        let chunks = chunker.chunk_document("doc-1", "policy", "Health Policy", text);

        assert_eq!(chunks.len(), 3);
        let anchors: Vec<&str> = chunks
            .iter()
            .map(|c| c.section_anchor.as_deref().unwrap())
            .collect();
        assert_eq!(anchors, ["1.1", "1.2", "2.1"]);
        assert!(chunks
            .iter()
            .all(|c| c.chunking_method == ChunkingMethod::PolicySection));
        assert!(chunks[1].text.contains("Pre-existing disease is excluded"));
        assert_eq!(chunks[0].chunk_id, "doc-1:section_1.1");
    }

    #[test]
    fn lowercase_heading_yields_no_boundary() {
        let text = "1.1 coverage details\nbody text continues here for a while";
        let chunker = LegalChunker::default();
        let chunks = chunker.chunk_document("doc-1", "policy", "Policy", text);
        // No matching heading, so the whole document falls back to the
        // sliding window.
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunking_method, ChunkingMethod::SlidingWindow);
        assert_eq!(chunks[0].chunk_id, "doc-1:0");
    }

    #[test]
    fn legal_sections_recognize_article_and_caps_headings() {
        let text = "ARTICLE 1 DEFINITIONS\nTerms used in this agreement.\nSECTION 2 OBLIGATIONS\nThe parties shall perform.\n3. TERMINATION\nEither party may terminate.";
        let chunker = LegalChunker::default();
        let chunks = chunker.chunk_document("c-1", "contract", "Agreement", text);

        assert_eq!(chunks.len(), 3);
        let anchors: Vec<&str> = chunks
            .iter()
            .map(|c| c.section_anchor.as_deref().unwrap())
            .collect();
        assert_eq!(anchors, ["1", "2", "3"]);
        assert!(chunks
            .iter()
            .all(|c| c.chunking_method == ChunkingMethod::LegalSection));
    }

    #[test]
    fn preamble_before_first_heading_is_kept() {
        let text = "This policy is issued by Acme Insurance.\n1.1 COVERAGE\nHospitalization is covered.";
        let chunker = LegalChunker::default();
        let chunks = chunker.chunk_document("p-1", "policy", "Policy", text);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunking_method, ChunkingMethod::SlidingWindow);
        assert!(chunks[0].text.contains("Acme Insurance"));
        assert_eq!(chunks[1].section_anchor.as_deref(), Some("1.1"));
    }

    #[test]
    fn sliding_window_overlaps_and_covers_all_tokens() {
        let words: Vec<String> = (0..25).map(|i| format!("w{}", i)).collect();
        let text = words.join(" ");
        let chunker = LegalChunker::new(10, 4);
        let chunks = chunker.chunk_document("d", "note", "Note", &text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.word_count <= 10));
        // First token of each window advances by step = size - overlap.
        assert!(chunks[0].text.starts_with("w0"));
        assert!(chunks[1].text.starts_with("w6"));
        // Final token is present in the last window.
        assert!(chunks.last().unwrap().text.ends_with("w24"));
        assert_eq!(chunks[0].chunk_id, "d:0");
        assert_eq!(chunks[1].chunk_id, "d:1");
    }

    #[test]
    fn short_text_becomes_single_window_chunk() {
        let chunker = LegalChunker::default();
        let chunks = chunker.chunk_document("d", "unknown", "Doc", "short note about a claim");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunking_method, ChunkingMethod::SlidingWindow);
        assert_eq!(chunks[0].word_count, 5);
    }

    #[test]
    fn empty_input_yields_empty_list() {
        let chunker = LegalChunker::default();
        assert!(chunker
            .chunk_document("d", "policy", "Doc", "   \n  ")
            .is_empty());
    }

    #[test]
    fn duplicate_anchors_stay_unique() {
        let text = "1 COVERAGE\nFirst block.\n1 COVERAGE\nSecond block.";
        let chunker = LegalChunker::default();
        let chunks = chunker.chunk_document("d", "policy", "Doc", text);
        assert_eq!(chunks.len(), 2);
        assert_ne!(chunks[0].chunk_id, chunks[1].chunk_id);
    }

    #[test]
    fn chunk_text_is_trimmed() {
        let chunker = LegalChunker::default();
        let chunks = chunker.chunk_document("d", "unknown", "Doc", "  spaced   out   text  ");
        assert_eq!(chunks[0].text, chunks[0].text.trim());
    }
}
