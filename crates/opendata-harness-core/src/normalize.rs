//! Address and free-text normalization.
//!
//! Upstream tables spell the same street many ways (`"Commonwealth Avenue"`,
//! `"Commonwealth Ave."`, `"COMMONWEALTH AV"`). [`normalize`] maps all of
//! them onto one canonical form so they can be compared for equality.
//!
//! # Algorithm
//!
//! 1. Remove every `.`.
//! 2. Uppercase.
//! 3. Replace whole-word street-suffix synonyms with their canonical
//!    abbreviation (`STREET` → `ST`, `AVENUE`/`AVE` → `AV`). `ST` is already
//!    canonical and passes through unchanged.
//! 4. Trim surrounding whitespace.
//!
//! Full-word synonyms are listed before their abbreviations, and no
//! replacement produces text another rule matches, so the function is
//! idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

/// Street-suffix synonyms and their canonical spelling, longest first.
const SUFFIX_SYNONYMS: &[(&str, &str)] = &[("STREET", "ST"), ("AVENUE", "AV"), ("AVE", "AV")];

static SUFFIX_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    SUFFIX_SYNONYMS
        .iter()
        .map(|(synonym, canonical)| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", synonym))
                .expect("suffix patterns are literal words");
            (re, *canonical)
        })
        .collect()
});

/// Canonicalize a location or free-text string. Pure and total.
///
/// ```
/// use opendata_harness_core::normalize::normalize;
///
/// assert_eq!(normalize("65 Commonwealth Avenue"), "65 COMMONWEALTH AV");
/// assert_eq!(normalize(" 100 Main St. "), "100 MAIN ST");
/// ```
pub fn normalize(input: &str) -> String {
    let mut out = input.replace('.', "").to_uppercase();
    for (re, canonical) in SUFFIX_RULES.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *canonical).into_owned();
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_street_synonyms() {
        assert_eq!(normalize("100 Main Street"), "100 MAIN ST");
        assert_eq!(normalize("100 Main St"), "100 MAIN ST");
        assert_eq!(normalize("100 Main St."), "100 MAIN ST");
        assert_eq!(normalize("100 MAIN ST"), "100 MAIN ST");
    }

    #[test]
    fn test_avenue_synonyms_are_equivalent() {
        let a = normalize("65 Commonwealth Avenue");
        let b = normalize("65 Commonwealth Ave");
        let c = normalize("65 COMMONWEALTH AV");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(normalize("65 Commonwealth Ave."), c);
    }

    #[test]
    fn test_whole_words_only() {
        // "STREETER" and "AVERY" contain synonyms but are different words.
        assert_eq!(normalize("12 Streeter Rd"), "12 STREETER RD");
        assert_eq!(normalize("9 Avery St"), "9 AVERY ST");
        assert_eq!(normalize("Stanhope St"), "STANHOPE ST");
    }

    #[test]
    fn test_trims_but_keeps_inner_spacing() {
        assert_eq!(normalize("  5  Elm  Street  "), "5  ELM  ST");
    }

    #[test]
    fn test_total_on_empty_and_odd_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("..."), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("Ünïcode straße"), "ÜNÏCODE STRASSE");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "65 Commonwealth Avenue",
            "100 Main St.",
            "  12 Streeter Rd ",
            "Ave Maria Street",
            "St. James Ave.",
            "avenue street ave st",
            "Ünïcode straße",
            "",
            "INTERSECTION of Washington St & Boylston St",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 2048,
            rng_seed: proptest::test_runner::RngSeed::Fixed(0),
            failure_persistence: None,
            .. ProptestConfig::default()
        })]

        #[test]
        fn prop_idempotent_on_any_text(s in "\\PC*") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_idempotent_on_street_like_text(
            s in "[0-9]{0,3}( |\\.)?(main|Elm|STREET|Street|st|St\\.|ave|Ave\\.|AVENUE|Avenue|av)( |\\.|ave|street){0,4}"
        ) {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
