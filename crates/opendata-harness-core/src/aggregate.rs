//! Ranked summaries over a record set.
//!
//! [`summarize`] groups records by one field and ranks the groups by either
//! a row count or the sum of a numeric field.
//!
//! # Ranking
//!
//! Groups are sorted by metric, descending. Ties keep the order in which
//! their key was first seen while scanning the records (a stable sort over
//! insertion order, never alphabetical). The result is truncated to `top_n`
//! and is never longer than the number of distinct keys.

use std::collections::HashMap;

use crate::models::{FieldValue, Record, SummaryEntry};

/// Key used when the grouping field is missing, null or blank.
pub const UNKNOWN_KEY: &str = "UNKNOWN";

/// What to measure per group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metric {
    /// Number of records in the group.
    Count,
    /// Sum of a numeric field across the group. Unparsable values count as 0.
    Sum { field: String },
}

impl Metric {
    pub fn sum(field: impl Into<String>) -> Self {
        Metric::Sum {
            field: field.into(),
        }
    }
}

/// Group `records` by `grouping_field` and rank by `metric`.
///
/// `top_n` is expected to be range-checked by the caller; the output simply
/// holds at most `top_n` entries.
pub fn summarize(
    records: &[Record],
    grouping_field: &str,
    metric: &Metric,
    top_n: usize,
) -> Vec<SummaryEntry> {
    let mut groups: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = group_key(record.field(grouping_field));
        let amount = match metric {
            Metric::Count => 1.0,
            Metric::Sum { field } => amount_of(record.field(field)),
        };
        match index.get(&key) {
            Some(&i) => groups[i].1 += amount,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, amount));
            }
        }
    }

    // `sort_by` is stable, so equal metrics stay in first-seen order.
    groups.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    groups
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(i, (key, metric))| SummaryEntry {
            key,
            metric,
            rank: i + 1,
        })
        .collect()
}

/// Trimmed text of the grouping value, or [`UNKNOWN_KEY`].
fn group_key(value: FieldValue<'_>) -> String {
    let text = value.as_text();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        UNKNOWN_KEY.to_string()
    } else {
        trimmed.to_string()
    }
}

fn amount_of(value: FieldValue<'_>) -> f64 {
    match value {
        FieldValue::Number(n) => n.as_f64().unwrap_or(0.0),
        other => parse_amount(&other.as_text()),
    }
}

/// Parse a loosely formatted monetary amount.
///
/// Everything except ASCII digits, `+`, `-` and `.` is stripped first, so
/// `"$1,234.50"` parses as `1234.5`. Anything that still fails to parse
/// yields `0.0`.
pub fn parse_amount(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn rec(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn keyed(values: &[&str]) -> Vec<Record> {
        values.iter().map(|v| rec(&[("F", json!(v))])).collect()
    }

    #[test]
    fn test_count_ranks_descending() {
        let out = summarize(&keyed(&["A", "A", "B"]), "F", &Metric::Count, 2);
        assert_eq!(
            out,
            vec![
                SummaryEntry {
                    key: "A".to_string(),
                    metric: 2.0,
                    rank: 1
                },
                SummaryEntry {
                    key: "B".to_string(),
                    metric: 1.0,
                    rank: 2
                },
            ]
        );
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let out = summarize(&keyed(&["Zed", "Alpha", "Mid", "Alpha", "Zed", "Mid"]), "F", &Metric::Count, 10);
        let keys: Vec<&str> = out.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["Zed", "Alpha", "Mid"]);
        assert_eq!(out.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_length_capped_by_distinct_keys_and_top_n() {
        let records = keyed(&["A", "B", "C", "A"]);
        assert_eq!(summarize(&records, "F", &Metric::Count, 10).len(), 3);
        assert_eq!(summarize(&records, "F", &Metric::Count, 1).len(), 1);
        assert!(summarize(&[], "F", &Metric::Count, 5).is_empty());
    }

    #[test]
    fn test_missing_blank_and_null_group_as_unknown() {
        let records = vec![
            rec(&[("F", json!("  "))]),
            rec(&[("F", Value::Null)]),
            rec(&[]),
            rec(&[("F", json!(" B "))]),
        ];
        let out = summarize(&records, "F", &Metric::Count, 5);
        assert_eq!(out[0].key, UNKNOWN_KEY);
        assert_eq!(out[0].metric, 3.0);
        assert_eq!(out[1].key, "B");
    }

    #[test]
    fn test_sum_with_bad_data() {
        let records = vec![
            rec(&[("vendor", json!("ACME")), ("amt", json!("$10.00"))]),
            rec(&[("vendor", json!("ACME")), ("amt", json!("abc"))]),
            rec(&[("vendor", json!("ACME")), ("amt", json!("$5"))]),
        ];
        let out = summarize(&records, "vendor", &Metric::sum("amt"), 5);
        assert_eq!(out.len(), 1);
        assert!((out[0].metric - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_sum_ranks_vendors_by_spend() {
        let records = vec![
            rec(&[("vendor", json!("Small Co")), ("amt", json!(50))]),
            rec(&[("vendor", json!("Big Co")), ("amt", json!("$1,200.00"))]),
            rec(&[("vendor", json!("Small Co")), ("amt", json!(25.5))]),
            rec(&[("vendor", json!("No Amount Co"))]),
        ];
        let out = summarize(&records, "vendor", &Metric::sum("amt"), 10);
        let keys: Vec<&str> = out.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["Big Co", "Small Co", "No Amount Co"]);
        assert!((out[1].metric - 75.5).abs() < 1e-9);
        assert_eq!(out[2].metric, 0.0);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.50"), 1234.5);
        assert_eq!(parse_amount("-$20"), -20.0);
        assert_eq!(parse_amount("abc"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("1.2.3"), 0.0);
        assert_eq!(parse_amount("--5"), 0.0);
    }
}
