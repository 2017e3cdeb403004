//! Dictionary-driven spell correction for legal and insurance queries.
//!
//! Corrects the misspellings users actually type ("deductable",
//! "benifits") before normalization. Whole-word, longest-match first,
//! total and idempotent.

use crate::domain::SPELL_TABLE;
use crate::query::normalizer::replace_whole_word;

/// Apply the correction table to a query. The result is lowercase; callers
/// normalize afterwards anyway.
pub fn correct(query: &str) -> String {
    let mut result = query.to_lowercase();
    for (misspelling, correction) in SPELL_TABLE.iter() {
        if result.contains(misspelling) {
            result = replace_whole_word(&result, misspelling, correction);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrects_common_misspellings() {
        assert_eq!(
            correct("what is the Deductable amount"),
            "what is the deductible amount"
        );
        assert_eq!(correct("list the benifits"), "list the benefits");
    }

    #[test]
    fn multi_word_corrections_win_over_substrings() {
        assert_eq!(correct("is knee surgury covered"), "is knee surgery covered");
        assert_eq!(
            correct("pre existing disease waiting period"),
            "pre-existing disease waiting period"
        );
    }

    #[test]
    fn is_idempotent() {
        let once = correct("deductable benifits cancelation");
        assert_eq!(correct(&once), once);
    }

    #[test]
    fn leaves_correct_words_alone() {
        assert_eq!(correct("deductible"), "deductible");
    }

    #[test]
    fn does_not_fire_inside_longer_words() {
        assert_eq!(correct("copayments apply"), "copayments apply");
    }
}
