//! Local reconciliation of over-inclusive full-text results.
//!
//! The upstream `q` search matches tokens anywhere in a row, so a query for
//! `"100 Main Street"` also returns `"1100 Main St"` or rows that merely
//! mention Main Street in a comment. [`reconcile`] re-checks the location
//! field of every fetched row after [`normalize`]-ing both sides.
//!
//! Missing fields are compared as the empty string and never cause an error.

use std::collections::HashSet;

use crate::models::Record;
use crate::normalize::normalize;

/// How a record's field is compared against the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Equal after normalization, or either side contains the other.
    ///
    /// A blank field is contained in every query, so it always passes.
    Bidirectional,
    /// Equal after normalization.
    Exact,
}

/// Test a single field value against an already-normalized query.
pub fn matches(value: &str, normalized_query: &str, mode: MatchMode) -> bool {
    let value = normalize(value);
    if value == normalized_query {
        return true;
    }
    match mode {
        MatchMode::Exact => false,
        MatchMode::Bidirectional => {
            value.contains(normalized_query) || normalized_query.contains(&value)
        }
    }
}

/// Keep the records whose `field` matches `query` under `mode`.
///
/// Input order is preserved. An empty result is a normal outcome.
pub fn reconcile(records: Vec<Record>, field: &str, query: &str, mode: MatchMode) -> Vec<Record> {
    let normalized_query = normalize(query);
    records
        .into_iter()
        .filter(|record| matches(&record.text(field), &normalized_query, mode))
        .collect()
}

/// Drop records whose `key_field` repeats an earlier record's value.
///
/// The first occurrence wins. Records with a blank key are always kept,
/// since there is nothing to compare them by.
pub fn dedupe_by(records: Vec<Record>, key_field: &str) -> Vec<Record> {
    let mut seen: HashSet<String> = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let key = record.text(key_field).trim().to_string();
            key.is_empty() || seen.insert(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rec(address: Value) -> Record {
        [("address", address)].into_iter().collect()
    }

    fn addresses(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.text("address").into_owned()).collect()
    }

    #[test]
    fn test_exact_mode_matches_synonyms_only() {
        let records = vec![
            rec(json!("100 Main Street")),
            rec(json!("100 MAIN ST.")),
            rec(json!("1100 Main St")),
            rec(json!("100 Main St Rear")),
        ];
        let out = reconcile(records, "address", "100 main st", MatchMode::Exact);
        assert_eq!(addresses(&out), vec!["100 Main Street", "100 MAIN ST."]);
    }

    #[test]
    fn test_bidirectional_mode_accepts_containment_both_ways() {
        let records = vec![
            rec(json!("100 Main Street Unit 4")),
            rec(json!("Main St")),
            rec(json!("22 Elm Street")),
        ];
        let out = reconcile(records, "address", "100 Main Street", MatchMode::Bidirectional);
        assert_eq!(addresses(&out), vec!["100 Main Street Unit 4", "Main St"]);
    }

    #[test]
    fn test_missing_and_null_fields_do_not_fail() {
        let records = vec![
            Record::new(),
            rec(Value::Null),
            rec(json!(100)),
            rec(json!("100 Main St")),
        ];
        let exact = reconcile(records.clone(), "address", "100 Main St", MatchMode::Exact);
        assert_eq!(exact.len(), 1);

        let fuzzy = reconcile(records, "address", "100 Main St", MatchMode::Bidirectional);
        // Missing and null read as "", which the query contains; so does "100".
        assert_eq!(fuzzy.len(), 4);
    }

    #[test]
    fn test_missing_address_passes_bidirectional_but_not_exact() {
        let records = vec![Record::new(), rec(json!("100 Main St"))];

        let fuzzy = reconcile(records.clone(), "address", "100 Main St", MatchMode::Bidirectional);
        assert_eq!(fuzzy.len(), 2);

        let exact = reconcile(records, "address", "100 Main St", MatchMode::Exact);
        assert_eq!(addresses(&exact), vec!["100 Main St"]);
    }

    #[test]
    fn test_empty_query_is_contained_in_every_field() {
        let records = vec![Record::new(), rec(json!("100 Main St"))];
        let fuzzy = reconcile(records.clone(), "address", "", MatchMode::Bidirectional);
        assert_eq!(fuzzy.len(), 2);

        let exact = reconcile(records, "address", " . ", MatchMode::Exact);
        assert_eq!(exact.len(), 1);
        assert!(exact[0].is_empty());
    }

    #[test]
    fn test_empty_result_is_fine() {
        let out = reconcile(vec![rec(json!("5 Elm St"))], "address", "1 Oak St", MatchMode::Exact);
        assert!(out.is_empty());
    }

    #[test]
    fn test_dedupe_keeps_first_and_blank_keys() {
        let records: Vec<Record> = vec![
            [("id", json!("A")), ("n", json!(1))].into_iter().collect(),
            [("id", json!("B")), ("n", json!(2))].into_iter().collect(),
            [("id", json!("A")), ("n", json!(3))].into_iter().collect(),
            [("n", json!(4))].into_iter().collect(),
            [("n", json!(5))].into_iter().collect(),
        ];
        let out = dedupe_by(records, "id");
        let ns: Vec<String> = out.iter().map(|r| r.text("n").into_owned()).collect();
        assert_eq!(ns, vec!["1", "2", "4", "5"]);
    }
}
