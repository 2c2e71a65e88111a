//! Plain-text rendering of tool results.
//!
//! Record sets render as `field: value` lines, one block per record, with
//! blocks separated by `---`. Summaries render as `rank. key: metric`, one
//! entry per line.

use crate::models::{FieldValue, Record, SummaryEntry};

/// Separator line placed between record blocks.
pub const RECORD_SEPARATOR: &str = "---";

/// How summary metrics are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFormat {
    /// Whole numbers (`42`).
    Count,
    /// Two decimals with a dollar sign (`$1234.50`, `-$20.00`).
    Currency,
}

/// Render one record as `field: value` lines.
///
/// With an empty `fields` list every field is printed except CKAN's
/// internal ones (leading underscore, e.g. `_id`, `_full_text`). Listed
/// fields that the record lacks are skipped.
pub fn format_record(record: &Record, fields: &[&str]) -> String {
    let lines: Vec<String> = if fields.is_empty() {
        record
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, value)| format!("{}: {}", name, value.as_text()))
            .collect()
    } else {
        fields
            .iter()
            .filter(|name| !matches!(record.field(name), FieldValue::Missing))
            .map(|name| format!("{}: {}", name, record.text(name)))
            .collect()
    };
    lines.join("\n")
}

/// Render records separated by [`RECORD_SEPARATOR`] lines.
pub fn format_records(records: &[Record], fields: &[&str]) -> String {
    records
        .iter()
        .map(|r| format_record(r, fields))
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", RECORD_SEPARATOR))
}

/// Render a ranked summary listing.
pub fn format_summary(entries: &[SummaryEntry], format: MetricFormat) -> String {
    entries
        .iter()
        .map(|e| {
            let metric = match format {
                MetricFormat::Count => format!("{:.0}", e.metric),
                MetricFormat::Currency => currency(e.metric),
            };
            format!("{}. {}: {}", e.rank, e.key, metric)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The sign goes before the dollar sign. A total that rounds to zero
/// prints unsigned.
fn currency(amount: f64) -> String {
    let cents = format!("{:.2}", amount.abs());
    if amount < 0.0 && cents != "0.00" {
        format!("-${}", cents)
    } else {
        format!("${}", cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_dump_skips_internal_fields() {
        let rec: Record = [
            ("_id", json!(7)),
            ("permitnumber", json!("A123")),
            ("address", json!("100 Main St")),
        ]
        .into_iter()
        .collect();
        assert_eq!(format_record(&rec, &[]), "permitnumber: A123\naddress: 100 Main St");
    }

    #[test]
    fn test_record_dump_with_selected_fields() {
        let rec: Record = [
            ("a", json!("1")),
            ("b", serde_json::Value::Null),
            ("c", json!("3")),
        ]
        .into_iter()
        .collect();
        assert_eq!(format_record(&rec, &["c", "b", "zz"]), "c: 3\nb: ");
    }

    #[test]
    fn test_records_joined_by_separator() {
        let records: Vec<Record> = vec![
            [("a", json!("1"))].into_iter().collect(),
            [("a", json!("2"))].into_iter().collect(),
        ];
        assert_eq!(format_records(&records, &[]), "a: 1\n---\na: 2");
    }

    #[test]
    fn test_summary_listing() {
        let entries = vec![
            SummaryEntry {
                key: "LARCENY".to_string(),
                metric: 12.0,
                rank: 1,
            },
            SummaryEntry {
                key: "VANDALISM".to_string(),
                metric: 3.0,
                rank: 2,
            },
        ];
        assert_eq!(
            format_summary(&entries, MetricFormat::Count),
            "1. LARCENY: 12\n2. VANDALISM: 3"
        );
    }

    #[test]
    fn test_currency_metric() {
        let entries = vec![SummaryEntry {
            key: "ACME".to_string(),
            metric: 1234.5,
            rank: 1,
        }];
        assert_eq!(format_summary(&entries, MetricFormat::Currency), "1. ACME: $1234.50");
    }

    #[test]
    fn test_negative_currency_puts_sign_first() {
        let entries = vec![
            SummaryEntry {
                key: "REFUND CO".to_string(),
                metric: -20.0,
                rank: 1,
            },
            SummaryEntry {
                key: "ROUNDING".to_string(),
                metric: -0.001,
                rank: 2,
            },
        ];
        assert_eq!(
            format_summary(&entries, MetricFormat::Currency),
            "1. REFUND CO: -$20.00\n2. ROUNDING: $0.00"
        );
    }
}
