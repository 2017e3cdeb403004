//! Response assembly: context formatting, prompt construction, completeness
//! checking, citation extraction, confidence scoring, and the structured
//! envelope. The assembler never truncates an answer.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::query::normalizer;
use crate::response::schema::{
    AuditTrail, ClauseReference, ConfidenceLevel, ConfidenceReport, Explainability,
    QualityIndicators, QueryAnalysisReport, Recommendation, RecommendationKind,
    RecommendationPriority, ResponseType, SearchParameters, SourceAnalysisReport, SourceCoverage,
    SourceRef, SourceSummary, StructuredResponse, Warning, WarningKind, WarningSeverity,
};
use crate::types::{QueryContext, QueryIntent, RetrievalMethod, RetrievalResult};

static CLAUSE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)clause\s+(\d+[a-z]?)").expect("clause regex is valid"),
        Regex::new(r"(?i)section\s+(\d+[a-z]?)").expect("section regex is valid"),
        Regex::new(r"(?i)article\s+(\d+[a-z]?)").expect("article regex is valid"),
        Regex::new(r"(?i)paragraph\s+(\d+[a-z]?)").expect("paragraph regex is valid"),
        Regex::new(r"\b(\d+\.\d+)\b").expect("dotted number regex is valid"),
        Regex::new(r"\b(\d+[a-z])\b").expect("numbered letter regex is valid"),
    ]
});

static BOILERPLATE_LEADS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)^based on the context[:\s]*").expect("lead regex is valid"),
        Regex::new(r"(?i)^according to the document[:\s]*").expect("lead regex is valid"),
        Regex::new(r"(?i)^the document states[:\s]*").expect("lead regex is valid"),
    ]
});

const SYSTEM_DIRECTIVE: &str = "You are a legal assistant with expertise in analyzing legal and \
insurance documents. Answer strictly from the provided context; if the information is not in \
the context, say so clearly. Always cite the specific clauses, sections, or page numbers you \
rely on. When several questions are asked, address each one separately and completely. Never \
stop mid-sentence.";

/// Retrieval facts the assembler needs to explain and annotate a response.
#[derive(Debug, Clone)]
pub struct RetrievalMeta {
    pub threshold_used: f32,
    pub adaptive: bool,
    pub fallback_used: bool,
    pub relaxation_applied: bool,
    pub stages: Vec<String>,
}

/// Clause identifiers detected in one context chunk.
#[derive(Debug, Clone)]
pub struct ChunkClauses {
    pub chunk_id: String,
    pub identifiers: Vec<String>,
}

/// Formatted context plus the clause inventory for citation
/// cross-referencing.
#[derive(Debug, Clone)]
pub struct ContextBundle {
    pub text: String,
    pub clauses: Vec<ChunkClauses>,
}

pub struct ResponseAssembler {
    config: RetrievalConfig,
}

impl ResponseAssembler {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Emit one context block per selected result: document title, section
    /// anchor and title, page when present, detected clause identifiers, and
    /// the chunk text.
    pub fn format_context(&self, results: &[RetrievalResult]) -> ContextBundle {
        let mut blocks = Vec::with_capacity(results.len());
        let mut clauses = Vec::with_capacity(results.len());

        for result in results {
            let mut source_info = Vec::new();
            if !result.doc_title().is_empty() {
                source_info.push(format!("Document: {}", result.doc_title()));
            }
            match (result.section_anchor(), result.section_title()) {
                (Some(anchor), title) if !title.is_empty() => {
                    source_info.push(format!("Section {}: {}", anchor, title));
                }
                (Some(anchor), _) => source_info.push(format!("Section {}", anchor)),
                (None, title) if !title.is_empty() => {
                    source_info.push(format!("Section: {}", title));
                }
                _ => {}
            }
            if let Some(page) = result.page_number() {
                source_info.push(format!("Page: {}", page));
            }

            let identifiers = extract_clause_identifiers(&result.text);
            let prefix = if source_info.is_empty() {
                String::new()
            } else {
                format!("[{}] ", source_info.join(" | "))
            };
            let clause_note = if identifiers.is_empty() {
                String::new()
            } else {
                format!(" [Clauses: {}]", identifiers.join(", "))
            };

            blocks.push(format!("{}{}{}", prefix, result.text, clause_note));
            clauses.push(ChunkClauses {
                chunk_id: result.chunk_id.clone(),
                identifiers,
            });
        }

        ContextBundle {
            text: blocks.join("\n\n"),
            clauses,
        }
    }

    /// Build the (system, user) prompt pair. The user block carries the
    /// formatted context and the original, un-normalized question; compound
    /// questions are enumerated so the model addresses each.
    pub fn build_prompt(&self, ctx: &QueryContext, context: &ContextBundle) -> (String, String) {
        let question_block = if ctx.sub_questions.len() > 1 {
            let mut parts =
                vec!["Please answer ALL of the following questions completely:".to_string()];
            for (i, question) in ctx.sub_questions.iter().enumerate() {
                parts.push(format!("{}. {}", i + 1, question));
            }
            parts.push(format!("\nOriginal question: {}", ctx.raw));
            parts.join("\n")
        } else {
            format!("Question: {}", ctx.raw)
        };

        let user = format!(
            "Context:\n{}\n\n{}\n\nInstructions:\n\
             - Answer from the context above only\n\
             - Cite specific clauses, sections, or page numbers\n\
             - Address every question separately when several are asked\n\
             - Complete the entire response; never stop mid-sentence",
            context.text, question_block
        );

        (SYSTEM_DIRECTIVE.to_string(), user)
    }

    /// Assemble the success envelope from the generated answer.
    pub fn assemble(
        &self,
        ctx: &QueryContext,
        results: &[RetrievalResult],
        context: &ContextBundle,
        raw_answer: &str,
        meta: &RetrievalMeta,
    ) -> StructuredResponse {
        // Signals computed on the raw answer, before any cleanup.
        let has_final_punctuation = raw_answer
            .trim_end()
            .chars()
            .next_back()
            .is_some_and(|c| matches!(c, '.' | '!' | '?'));

        let response_type = classify_response_type(&ctx.normalized, raw_answer, ctx.intent);
        let answer = format_answer(raw_answer, response_type);

        let (clause_references, verified_citations) =
            cross_reference_citations(&answer, &context.clauses);

        let unanswered = unanswered_sub_questions(&answer, &ctx.sub_questions);
        let answered_ratio = if ctx.sub_questions.len() <= 1 {
            1.0
        } else {
            (ctx.sub_questions.len() - unanswered.len()) as f32 / ctx.sub_questions.len() as f32
        };

        let confidence = self.compute_confidence(
            results,
            &answer,
            has_final_punctuation,
            answered_ratio,
            verified_citations,
            ctx.sub_questions.len(),
        );

        let mut warnings =
            self.build_warnings(confidence.overall, meta, results.len(), &answer);
        if !unanswered.is_empty() {
            warnings.push(Warning {
                kind: WarningKind::UnansweredSubQuestions,
                severity: WarningSeverity::High,
                message: format!(
                    "The answer appears to leave {} question(s) unaddressed: {}",
                    unanswered.len(),
                    unanswered.join("; ")
                ),
                suggestion: "Ask the unaddressed questions individually".to_string(),
            });
        }

        let recommendations =
            self.build_recommendations(&ctx.normalized, confidence.overall, results.len());

        StructuredResponse {
            response_id: new_response_id(),
            timestamp: Utc::now(),
            response_type,
            category: response_type.category().to_string(),
            query: ctx.clone(),
            confidence,
            sources: build_source_summary(results),
            search_parameters: SearchParameters {
                threshold_used: meta.threshold_used,
                adaptive: meta.adaptive,
                method: dominant_method(results),
            },
            quality_indicators: QualityIndicators {
                completeness: completeness_score(&answer),
                specificity: specificity_score(&answer),
                citation_count: verified_citations,
            },
            clause_references,
            warnings,
            recommendations,
            explainability: self.build_explainability(ctx, results, meta),
            answer,
        }
    }

    /// Envelope for a hard external failure: empty answer and sources, the
    /// failed stage recorded in the audit trail.
    pub fn error_response(
        &self,
        ctx: &QueryContext,
        failed_stage: &str,
        message: &str,
        meta: &RetrievalMeta,
    ) -> StructuredResponse {
        let mut stages = meta.stages.clone();
        stages.push(format!("failed:{}", failed_stage));
        let meta = RetrievalMeta {
            stages,
            ..meta.clone()
        };

        StructuredResponse {
            response_id: new_response_id(),
            timestamp: Utc::now(),
            answer: String::new(),
            response_type: ResponseType::Error,
            category: ResponseType::Error.category().to_string(),
            query: ctx.clone(),
            confidence: ConfidenceReport::zero(),
            sources: SourceSummary::empty(),
            search_parameters: SearchParameters {
                threshold_used: meta.threshold_used,
                adaptive: meta.adaptive,
                method: "none".to_string(),
            },
            quality_indicators: QualityIndicators {
                completeness: 0.0,
                specificity: 0.0,
                citation_count: 0,
            },
            clause_references: Vec::new(),
            warnings: vec![Warning {
                kind: WarningKind::TechnicalError,
                severity: WarningSeverity::High,
                message: message.to_string(),
                suggestion: "Try again or rephrase your question".to_string(),
            }],
            recommendations: vec![Recommendation {
                kind: RecommendationKind::RetryQuery,
                priority: RecommendationPriority::High,
                suggestion: "Try rephrasing your question".to_string(),
                examples: vec![
                    "Use simpler language".to_string(),
                    "Break down complex questions".to_string(),
                ],
            }],
            explainability: self.build_explainability(ctx, &[], &meta),
        }
    }

    /// Envelope for the empty-result terminal state. Not an error.
    pub fn no_results_response(
        &self,
        ctx: &QueryContext,
        meta: &RetrievalMeta,
    ) -> StructuredResponse {
        StructuredResponse {
            response_id: new_response_id(),
            timestamp: Utc::now(),
            answer: "I couldn't find specific information about this in the available \
                     documents. Please try rephrasing your question or check whether the \
                     relevant documents have been uploaded."
                .to_string(),
            response_type: ResponseType::NoResults,
            category: ResponseType::NoResults.category().to_string(),
            query: ctx.clone(),
            confidence: ConfidenceReport::zero(),
            sources: SourceSummary::empty(),
            search_parameters: SearchParameters {
                threshold_used: meta.threshold_used,
                adaptive: meta.adaptive,
                method: "none".to_string(),
            },
            quality_indicators: QualityIndicators {
                completeness: 0.0,
                specificity: 0.0,
                citation_count: 0,
            },
            clause_references: Vec::new(),
            warnings: vec![
                Warning {
                    kind: WarningKind::NoSources,
                    severity: WarningSeverity::High,
                    message: "No relevant documents found".to_string(),
                    suggestion: "Upload additional policy documents".to_string(),
                },
                Warning {
                    kind: WarningKind::LowThreshold,
                    severity: WarningSeverity::Medium,
                    message: "Consider rephrasing your question".to_string(),
                    suggestion: "Try different keywords".to_string(),
                },
            ],
            recommendations: vec![
                Recommendation {
                    kind: RecommendationKind::AddDocuments,
                    priority: RecommendationPriority::High,
                    suggestion: "Upload additional policy documents".to_string(),
                    examples: vec![
                        "Policy schedules".to_string(),
                        "Endorsements".to_string(),
                        "Riders".to_string(),
                    ],
                },
                Recommendation {
                    kind: RecommendationKind::ImproveQuery,
                    priority: RecommendationPriority::Medium,
                    suggestion: "Try more specific terms".to_string(),
                    examples: vec![
                        "Instead of 'coverage', try 'what medical expenses are covered'"
                            .to_string(),
                    ],
                },
            ],
            explainability: self.build_explainability(ctx, &[], meta),
        }
    }

    fn compute_confidence(
        &self,
        results: &[RetrievalResult],
        answer: &str,
        has_final_punctuation: bool,
        answered_ratio: f32,
        citations: usize,
        sub_question_count: usize,
    ) -> ConfidenceReport {
        let source_relevance = if results.is_empty() {
            0.0
        } else {
            let top: Vec<f32> = results.iter().take(3).map(|r| r.combined_score).collect();
            top.iter().sum::<f32>() / top.len() as f32
        };

        // Full credit at 1/16th of the answer budget (500 chars at the
        // default); never used to truncate.
        let target = (self.config.llm.max_answer_chars as f32 / 16.0).max(1.0);
        let length_factor = (answer.len() as f32 / target).min(1.0);
        let response_completeness = (f32::from(has_final_punctuation as u8)
            + length_factor
            + answered_ratio)
            / 3.0;

        let citation_quality =
            (citations as f32 / sub_question_count.max(1) as f32).min(1.0);

        let overall = (0.4 * source_relevance
            + 0.3 * response_completeness
            + 0.2 * citation_quality
            + 0.1 * length_factor)
            .clamp(0.0, 1.0);

        ConfidenceReport {
            overall,
            level: ConfidenceLevel::from_score(overall),
            source_relevance,
            response_completeness,
            citation_quality,
            length_factor,
        }
    }

    fn build_warnings(
        &self,
        confidence: f32,
        meta: &RetrievalMeta,
        source_count: usize,
        answer: &str,
    ) -> Vec<Warning> {
        let mut warnings = Vec::new();

        if confidence < 0.5 {
            warnings.push(Warning {
                kind: WarningKind::LowConfidence,
                severity: WarningSeverity::High,
                message: "Low confidence response".to_string(),
                suggestion: "Use more specific terms or break down your question".to_string(),
            });
        }

        if meta.fallback_used {
            warnings.push(Warning {
                kind: WarningKind::FallbackUsed,
                severity: WarningSeverity::Medium,
                message: "Semantic retrieval found nothing; sources come from keyword matching"
                    .to_string(),
                suggestion: "Results may be less precise than semantic matches".to_string(),
            });
        }

        let floor = self.config.thresholds.min_similarity_threshold;
        if meta.relaxation_applied || meta.threshold_used <= floor + f32::EPSILON {
            warnings.push(Warning {
                kind: WarningKind::LowThreshold,
                severity: WarningSeverity::Medium,
                message: "Similarity threshold was lowered to its floor; results may be less \
                          relevant"
                    .to_string(),
                suggestion: "Consider uploading more relevant documents".to_string(),
            });
        }

        if source_count == 1 {
            warnings.push(Warning {
                kind: WarningKind::LimitedSources,
                severity: WarningSeverity::Medium,
                message: "Limited source material".to_string(),
                suggestion: "Upload more policy documents for broader coverage".to_string(),
            });
        }

        if answer.len() < 50 {
            warnings.push(Warning {
                kind: WarningKind::ShortAnswer,
                severity: WarningSeverity::Medium,
                message: "Answer appears incomplete".to_string(),
                suggestion: "Try asking a more specific question".to_string(),
            });
        }

        warnings
    }

    fn build_recommendations(
        &self,
        normalized: &str,
        confidence: f32,
        source_count: usize,
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        if confidence < 0.7 {
            recommendations.push(Recommendation {
                kind: RecommendationKind::ImproveQuery,
                priority: RecommendationPriority::High,
                suggestion: "Rephrase your question with more specific terms".to_string(),
                examples: vec![
                    "Instead of 'coverage', try 'what medical expenses are covered'".to_string(),
                ],
            });
        }

        if source_count < 2 {
            recommendations.push(Recommendation {
                kind: RecommendationKind::AddDocuments,
                priority: RecommendationPriority::Medium,
                suggestion: "Upload additional policy documents for better coverage".to_string(),
                examples: vec![
                    "Policy schedules".to_string(),
                    "Endorsements".to_string(),
                    "Riders".to_string(),
                ],
            });
        }

        if normalized.contains("how") && !normalized.contains("procedure") {
            recommendations.push(Recommendation {
                kind: RecommendationKind::ProceduralQuery,
                priority: RecommendationPriority::Low,
                suggestion: "For procedural questions, include 'procedure' or 'steps'".to_string(),
                examples: vec!["How to file a claim procedure".to_string()],
            });
        }

        recommendations
    }

    fn build_explainability(
        &self,
        ctx: &QueryContext,
        results: &[RetrievalResult],
        meta: &RetrievalMeta,
    ) -> Explainability {
        let unique_documents: HashSet<&str> = results.iter().map(|r| r.doc_id()).collect();
        let pages: HashSet<u32> = results.iter().filter_map(|r| r.page_number()).collect();
        let sections: HashSet<&str> = results
            .iter()
            .map(|r| r.section_title())
            .filter(|s| !s.is_empty())
            .collect();

        let mut retrieval_methods: HashMap<String, usize> = HashMap::new();
        for result in results {
            let label = method_label(result.retrieval_method).to_string();
            *retrieval_methods.entry(label).or_insert(0) += 1;
        }

        let average_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.combined_score).sum::<f32>() / results.len() as f32
        };

        Explainability {
            query_analysis: QueryAnalysisReport {
                original_query: ctx.raw.clone(),
                normalized_query: ctx.normalized.clone(),
                intent: ctx.intent.as_str().to_string(),
                intent_confidence: ctx.intent_confidence,
                complexity: ctx.complexity.as_str().to_string(),
                normalization_changed: ctx.raw.to_lowercase().trim() != ctx.normalized,
                sub_question_count: ctx.sub_questions.len(),
            },
            source_analysis: SourceAnalysisReport {
                total_sources: results.len(),
                unique_documents: unique_documents.len(),
                pages_covered: pages.len(),
                sections_covered: sections.len(),
                retrieval_methods,
                average_score,
            },
            audit_trail: AuditTrail {
                timestamp: Utc::now(),
                query: ctx.raw.clone(),
                threshold_used: meta.threshold_used,
                stages: meta.stages.clone(),
            },
        }
    }
}

fn new_response_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("resp_{}", &hex[..8])
}

/// Detect clause identifiers in text: `clause N`, `section N`, `article N`,
/// `paragraph N`, dotted numbers like `1.2`, and number-letter forms like
/// `3a`. Distinct, in order of first appearance.
pub fn extract_clause_identifiers(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    let mut seen = HashSet::new();

    for pattern in CLAUSE_PATTERNS.iter() {
        for cap in pattern.captures_iter(text) {
            if let Some(m) = cap.get(1) {
                let identifier = m.as_str().to_lowercase();
                if seen.insert(identifier.clone()) {
                    found.push((m.start(), identifier));
                }
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, id)| id).collect()
}

/// Cross-reference answer citations against the context clause inventory.
/// Returns the reference list and the number of verified citations (answer
/// identifiers that exist in the retrieved context).
fn cross_reference_citations(
    answer: &str,
    context_clauses: &[ChunkClauses],
) -> (Vec<ClauseReference>, usize) {
    let answer_ids: HashSet<String> = extract_clause_identifiers(answer).into_iter().collect();

    let mut references = Vec::new();
    let mut covered = HashSet::new();
    let mut verified = 0usize;

    for chunk in context_clauses {
        for identifier in &chunk.identifiers {
            if !covered.insert(identifier.clone()) {
                continue;
            }
            let found = answer_ids.contains(identifier);
            if found {
                verified += 1;
            }
            references.push(ClauseReference {
                identifier: identifier.clone(),
                source_chunk_id: Some(chunk.chunk_id.clone()),
                found_in_response: found,
            });
        }
    }

    // Identifiers the answer cites that no context chunk contains.
    for identifier in answer_ids {
        if !covered.contains(&identifier) {
            references.push(ClauseReference {
                identifier,
                source_chunk_id: None,
                found_in_response: true,
            });
        }
    }

    (references, verified)
}

/// Sub-questions whose ordinal marker and leading content words are both
/// absent from the answer.
fn unanswered_sub_questions(answer: &str, sub_questions: &[String]) -> Vec<String> {
    if sub_questions.len() <= 1 {
        return Vec::new();
    }

    let answer_lower = answer.to_lowercase();
    let mut unanswered = Vec::new();

    for (i, question) in sub_questions.iter().enumerate() {
        let ordinal = i + 1;
        let markers = [
            format!("{}.", ordinal),
            format!("question {}", ordinal),
            format!("q{}", ordinal),
            format!("#{}", ordinal),
        ];
        if markers.iter().any(|m| answer_lower.contains(m.as_str())) {
            continue;
        }

        // Fall back to the question's first content words.
        let content_words: Vec<String> = normalizer::extract_keywords(question)
            .into_iter()
            .take(3)
            .collect();
        let covered = !content_words.is_empty()
            && content_words.iter().all(|w| answer_lower.contains(w.as_str()));
        if !covered {
            unanswered.push(question.clone());
        }
    }

    unanswered
}

/// Classify the response type from the normalized query, the answer content,
/// and the primary intent.
fn classify_response_type(normalized: &str, answer: &str, intent: QueryIntent) -> ResponseType {
    let answer_lower = answer.to_lowercase();

    if normalized.contains("waiting period") || normalized.contains("waiting time") {
        return ResponseType::WaitingPeriod;
    }
    if normalized.contains("premium") || normalized.contains("payment") {
        return ResponseType::Premium;
    }
    if normalized.contains("renewal") || normalized.contains("renew") {
        return ResponseType::Renewal;
    }
    if normalized.contains("termination")
        || normalized.contains("cancel")
        || normalized.contains("terminate")
    {
        return ResponseType::Termination;
    }
    if normalized.contains("exclusion")
        || normalized.contains("excluded")
        || normalized.contains("not covered")
        || answer_lower.contains("excluded")
    {
        return ResponseType::Exclusion;
    }
    if normalized.contains("limitation")
        || normalized.contains("maximum")
        || normalized.contains("cap ")
    {
        return ResponseType::Limitation;
    }
    if normalized.contains("how to")
        || normalized.contains("process")
        || normalized.contains("procedure")
        || normalized.contains("steps")
    {
        return ResponseType::Procedural;
    }
    if normalized.contains("coverage")
        || normalized.contains("covered")
        || normalized.contains("benefits")
    {
        return ResponseType::Coverage;
    }
    if normalized.contains("claim") {
        return ResponseType::Claim;
    }

    match intent {
        QueryIntent::InformationSeeking if !answer.is_empty() => ResponseType::DirectAnswer,
        _ => ResponseType::General,
    }
}

/// Clean the raw answer and apply the response-type template prefix. Never
/// truncates.
fn format_answer(raw: &str, response_type: ResponseType) -> String {
    let mut text = raw.trim().to_string();
    text = text.split_whitespace().collect::<Vec<_>>().join(" ");

    for lead in BOILERPLATE_LEADS.iter() {
        text = lead.replace(&text, "").to_string();
    }

    if let Some(first) = text.chars().next() {
        if first.is_lowercase() {
            let mut chars = text.chars();
            let upper: String = chars.next().unwrap().to_uppercase().collect();
            text = format!("{}{}", upper, chars.as_str());
        }
    }

    if !text.is_empty() && !text.ends_with(['.', '!', '?']) {
        text.push('.');
    }

    match response_type.answer_prefix() {
        Some(prefix) => format!("{}{}", prefix, text),
        None => text,
    }
}

fn completeness_score(answer: &str) -> f32 {
    if answer.is_empty() {
        return 0.0;
    }
    let lower = answer.to_lowercase();
    let indicators = [
        answer.len() > 100,
        ["according", "clause", "section", "page", "policy"]
            .iter()
            .any(|w| lower.contains(w)),
        answer.matches('.').count() > 2,
        !answer.ends_with("..."),
        answer.split_whitespace().count() > 20,
    ];
    indicators.iter().filter(|i| **i).count() as f32 / indicators.len() as f32
}

fn specificity_score(answer: &str) -> f32 {
    if answer.is_empty() {
        return 0.0;
    }
    let lower = answer.to_lowercase();
    let indicators = [
        ["specific", "exactly", "precisely"].iter().any(|w| lower.contains(w)),
        ["clause", "section", "article", "paragraph"]
            .iter()
            .any(|w| lower.contains(w)),
        ["page", "chapter", "part"].iter().any(|w| lower.contains(w)),
        ["according to", "as stated in", "per the policy"]
            .iter()
            .any(|w| lower.contains(w)),
        answer.chars().any(|c| c.is_ascii_digit()),
    ];
    indicators.iter().filter(|i| **i).count() as f32 / indicators.len() as f32
}

fn method_label(method: RetrievalMethod) -> &'static str {
    match method {
        RetrievalMethod::Semantic => "semantic",
        RetrievalMethod::KeywordAnchoring => "keyword_anchoring",
        RetrievalMethod::Hybrid => "hybrid",
    }
}

fn dominant_method(results: &[RetrievalResult]) -> String {
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for result in results {
        *counts.entry(method_label(result.retrieval_method)).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)))
        .map(|(label, _)| label.to_string())
        .unwrap_or_else(|| "none".to_string())
}

fn build_source_summary(results: &[RetrievalResult]) -> SourceSummary {
    let documents: Vec<SourceRef> = results
        .iter()
        .map(|result| {
            let identifiers = extract_clause_identifiers(&result.text);
            SourceRef {
                doc_id: result.doc_id().to_string(),
                doc_title: result.doc_title().to_string(),
                section_title: result.section_title().to_string(),
                section_anchor: result.section_anchor().map(str::to_string),
                page_number: result.page_number(),
                chunk_id: result.chunk_id.clone(),
                similarity_score: result.combined_score,
                semantic_score: result.semantic_score,
                keyword_score: result.keyword_score,
                structural_rank: result.structural_rank,
                retrieval_method: method_label(result.retrieval_method).to_string(),
                text_preview: preview(&result.text, 150),
                has_citations: !identifiers.is_empty(),
                word_count: result.text.split_whitespace().count(),
                legal_density: result
                    .metadata
                    .get("legal_density")
                    .and_then(|v| v.as_num())
                    .unwrap_or(0.0) as f32,
                matched_keywords: result.matched_keywords.clone(),
                clause_identifiers: identifiers,
            }
        })
        .collect();

    let unique_docs: HashSet<&str> = results.iter().map(|r| r.doc_id()).collect();
    let pages: HashSet<u32> = results.iter().filter_map(|r| r.page_number()).collect();
    let sections: HashSet<&str> = results
        .iter()
        .map(|r| r.section_title())
        .filter(|s| !s.is_empty())
        .collect();

    SourceSummary {
        total_count: documents.len(),
        coverage: SourceCoverage {
            documents: unique_docs.len(),
            pages: pages.len(),
            sections: sections.len(),
            total_chunks: results.len(),
        },
        documents,
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    match truncated.rfind(' ') {
        Some(pos) if pos > max_chars * 4 / 5 => format!("{}...", &truncated[..pos]),
        _ => format!("{}...", truncated),
    }
}
