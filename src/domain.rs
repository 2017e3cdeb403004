//! Static legal/insurance domain dictionary.
//!
//! Loaded once and read-only afterwards. Structural ranking, intent analysis,
//! keyword anchoring, and query normalization all draw from these tables.

use std::sync::LazyLock;

use crate::types::QueryIntent;

/// One legal category with its recognized surface forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegalCategory {
    PreexistingDiseases,
    Exclusions,
    Coverage,
    Claims,
    Deductibles,
    Premiums,
    WaitingPeriods,
    Renewals,
    Terminations,
}

impl LegalCategory {
    pub const ALL: [LegalCategory; 9] = [
        LegalCategory::PreexistingDiseases,
        LegalCategory::Exclusions,
        LegalCategory::Coverage,
        LegalCategory::Claims,
        LegalCategory::Deductibles,
        LegalCategory::Premiums,
        LegalCategory::WaitingPeriods,
        LegalCategory::Renewals,
        LegalCategory::Terminations,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PreexistingDiseases => "preexisting_diseases",
            Self::Exclusions => "exclusions",
            Self::Coverage => "coverage",
            Self::Claims => "claims",
            Self::Deductibles => "deductibles",
            Self::Premiums => "premiums",
            Self::WaitingPeriods => "waiting_periods",
            Self::Renewals => "renewals",
            Self::Terminations => "terminations",
        }
    }

    /// Surface forms recognized for this category.
    pub fn surface_forms(&self) -> &'static [&'static str] {
        match self {
            Self::PreexistingDiseases => &[
                "pre-existing disease",
                "ped",
                "excl 01",
                "preexisting condition",
                "existing illness",
                "pre-existing illness",
                "preexisting diseases",
                "medical history",
            ],
            Self::Exclusions => &[
                "exclusion",
                "exclusions",
                "excluded",
                "not covered",
                "limitations",
                "excluded conditions",
                "coverage limitations",
            ],
            Self::Coverage => &[
                "coverage",
                "covered",
                "benefits",
                "insurance coverage",
                "policy coverage",
                "medical coverage",
            ],
            Self::Claims => &[
                "claim",
                "claims",
                "claim filing",
                "claim process",
                "claim submission",
                "claim amount",
                "claim limits",
            ],
            Self::Deductibles => &[
                "deductible",
                "deductibles",
                "deductible amount",
                "out-of-pocket",
                "deductible limit",
                "cost sharing",
            ],
            Self::Premiums => &[
                "premium",
                "premiums",
                "insurance premium",
                "monthly premium",
                "annual premium",
                "payment",
            ],
            Self::WaitingPeriods => &[
                "waiting period",
                "waiting periods",
                "waiting time",
                "wait period",
                "exclusion period",
                "initial period",
            ],
            Self::Renewals => &[
                "renewal",
                "renewals",
                "policy renewal",
                "renewal process",
                "renewal terms",
                "extension",
            ],
            Self::Terminations => &[
                "termination",
                "terminations",
                "policy termination",
                "cancellation",
                "end of coverage",
                "discontinuation",
            ],
        }
    }

    /// Intent this category votes for during query analysis.
    pub fn intent(&self) -> QueryIntent {
        match self {
            Self::PreexistingDiseases | Self::Exclusions => QueryIntent::Exclusion,
            Self::Coverage => QueryIntent::Coverage,
            Self::Claims => QueryIntent::Claim,
            Self::Deductibles | Self::Premiums => QueryIntent::Financial,
            Self::WaitingPeriods => QueryIntent::Temporal,
            Self::Renewals | Self::Terminations => QueryIntent::Procedural,
        }
    }
}

/// General legal terms counted for the legal-density metadata.
pub const LEGAL_TERMS: &[&str] = &[
    "whereas",
    "hereby",
    "hereinafter",
    "party",
    "parties",
    "agreement",
    "contract",
    "clause",
    "section",
    "article",
    "paragraph",
    "subparagraph",
    "jurisdiction",
    "governing law",
    "dispute resolution",
    "arbitration",
    "breach",
    "termination",
    "liability",
    "indemnification",
    "confidentiality",
    "intellectual property",
    "force majeure",
    "amendment",
    "waiver",
];

/// Generic overlap terms that grant structural rank 2 when shared between
/// query and candidate without a shared category.
pub const GENERIC_OVERLAP_TERMS: &[&str] = &["exclusion", "limitation", "not covered"];

/// Fixed general legal terms used during keyword-anchoring extraction.
pub const ANCHORING_LEGAL_TERMS: &[&str] = &[
    "pre-existing disease",
    "exclusion",
    "coverage",
    "claim",
    "deductible",
    "premium",
    "waiting period",
    "renewal",
    "termination",
    "policy",
    "insurance",
    "medical",
    "hospitalization",
    "treatment",
    "expenses",
];

/// Single relevant words that qualify query tokens for anchoring.
pub const ANCHORING_RELEVANT_WORDS: &[&str] = &[
    "disease",
    "exclusion",
    "coverage",
    "claim",
    "deductible",
    "premium",
    "waiting",
    "renewal",
    "termination",
    "policy",
    "insurance",
    "medical",
    "hospital",
    "treatment",
    "expense",
    "limit",
    "amount",
    "period",
];

/// Section-title cues per intent for the context-aware re-rank boost.
pub fn intent_section_cues(intent: QueryIntent) -> &'static [&'static str] {
    match intent {
        QueryIntent::Temporal => &["waiting period", "waiting", "period", "duration"],
        QueryIntent::Exclusion => &["exclusion", "exclusions", "not covered", "limitation"],
        QueryIntent::Coverage => &["coverage", "benefits", "covered"],
        QueryIntent::Financial => &["premium", "deductible", "payment", "amount"],
        QueryIntent::Claim => &["claim", "claims", "reimbursement"],
        QueryIntent::Procedural => &["procedure", "process", "renewal", "termination"],
        QueryIntent::InformationSeeking => &[],
    }
}

/// Query-normalization synonym table: surface form -> canonical token.
/// Entries are consulted longest-surface-form first so multi-word forms win
/// over their substrings.
pub static SYNONYM_TABLE: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut table: Vec<(&'static str, &'static str)> = vec![
        ("pre-existing disease", "preexisting diseases"),
        ("pre-existing condition", "preexisting diseases"),
        ("pre-existing illness", "preexisting diseases"),
        ("existing illness", "preexisting diseases"),
        ("ped", "preexisting diseases"),
        ("insurance coverage", "coverage"),
        ("policy coverage", "coverage"),
        ("deductible amount", "deductible"),
        ("deductible limit", "deductible"),
        ("out-of-pocket", "deductible"),
        ("insurance premium", "premium"),
        ("monthly premium", "premium"),
        ("annual premium", "premium"),
        ("insurance claim", "claim"),
        ("claim filing", "claim process"),
        ("claim submission", "claim process"),
        ("excluded conditions", "exclusion"),
        ("not covered", "exclusion"),
        ("waiting time", "waiting period"),
        ("wait period", "waiting period"),
        ("exclusion period", "waiting period"),
        ("initial period", "waiting period"),
        ("policy renewal", "renewal"),
        ("renewal process", "renewal"),
        ("policy termination", "termination"),
        ("end of coverage", "termination"),
    ];
    // Longest first, so "pre-existing disease" is replaced before any
    // shorter form could clip it.
    table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    table
});

/// Spell-correction table for common legal/insurance misspellings:
/// misspelling -> correction, consulted longest first.
pub static SPELL_TABLE: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut table: Vec<(&'static str, &'static str)> = vec![
        ("pre existing disease", "pre-existing disease"),
        ("pre existing condition", "pre-existing condition"),
        ("pre existing", "pre-existing"),
        ("deductable", "deductible"),
        ("hospitilization", "hospitalization"),
        ("hospitilizations", "hospitalizations"),
        ("knee surgury", "knee surgery"),
        ("surgury", "surgery"),
        ("benifits", "benefits"),
        ("benifit", "benefit"),
        ("cancelation", "cancellation"),
        ("cancelations", "cancellations"),
        ("copayment", "co-payment"),
        ("copay", "co-pay"),
    ];
    table.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    table
});

/// Categories whose surface forms appear in the given lowercase text.
pub fn matched_categories(text: &str) -> Vec<LegalCategory> {
    LegalCategory::ALL
        .iter()
        .copied()
        .filter(|category| {
            category
                .surface_forms()
                .iter()
                .any(|form| contains_word(text, form))
        })
        .collect()
}

/// Whole-word containment check: `needle` must be bounded by non-alphanumeric
/// characters (or string edges) in `haystack`. Both inputs are expected
/// lowercase.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut search_from = 0;
    while let Some(pos) = haystack[search_from..].find(needle) {
        let start = search_from + pos;
        let end = start + needle.len();
        let before_ok = start == 0
            || !haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after_ok = end == haystack.len()
            || !haystack[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        search_from = start + needle.len().max(1);
        if search_from >= haystack.len() {
            break;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_word_respects_boundaries() {
        assert!(contains_word("the claim was filed", "claim"));
        assert!(!contains_word("the claimant was present", "claim"));
        assert!(contains_word("claim.", "claim"));
        assert!(contains_word("pre-existing disease cover", "pre-existing disease"));
    }

    #[test]
    fn matched_categories_finds_exclusion_and_ped() {
        let categories = matched_categories("what are the preexisting diseases exclusions?");
        assert!(categories.contains(&LegalCategory::PreexistingDiseases));
        assert!(categories.contains(&LegalCategory::Exclusions));
    }

    #[test]
    fn synonym_table_is_longest_first() {
        let lengths: Vec<usize> = SYNONYM_TABLE.iter().map(|(form, _)| form.len()).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn every_category_votes_for_an_intent() {
        for category in LegalCategory::ALL {
            // Exercise the mapping; absence of a panic is the assertion.
            let _ = category.intent();
        }
    }
}
