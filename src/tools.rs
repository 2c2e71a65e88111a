//! Built-in dataset tools.
//!
//! Each tool reads its validated parameters, runs one dataset query from
//! [`crate::datasets`] and renders the outcome as text. Upstream failures
//! become an `Error fetching ...` line and an empty result becomes a
//! `No ... found for ...` line, so callers always get a readable payload.

use anyhow::Result;
use async_trait::async_trait;
use opendata_harness_core::error::RemoteError;
use opendata_harness_core::format::{format_records, format_summary, MetricFormat};
use opendata_harness_core::models::{Record, SummaryEntry};
use serde_json::{json, Value};
use tracing::warn;

use crate::datasets::{self, CrimeQuery, DatasetSpec};
use crate::datasets::{BUILDING_PERMITS, CHECKBOOK, CRIME_INCIDENTS, FOOD_VIOLATIONS, SERVICE_REQUESTS};
use crate::params::{opt_i64, opt_str, req_str, usize_or};
use crate::traits::{Tool, ToolContext};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;
pub const DEFAULT_OFFENSE_TOP_N: usize = 10;
pub const MAX_OFFENSE_TOP_N: usize = 100;
pub const DEFAULT_VENDOR_TOP_N: usize = 25;
pub const MAX_VENDOR_TOP_N: usize = 2000;

fn limit_schema() -> Value {
    json!({
        "type": "integer",
        "description": "Maximum number of records to print",
        "minimum": 1,
        "maximum": MAX_LIMIT,
        "default": DEFAULT_LIMIT
    })
}

fn top_n_schema(max: usize, default: usize) -> Value {
    json!({
        "type": "integer",
        "description": "Number of ranked entries to return",
        "minimum": 1,
        "maximum": max,
        "default": default
    })
}

/// Human-readable description of the query, e.g. `address "1 Main St", status Open`.
fn describe(parts: &[(&str, Option<String>)]) -> String {
    let described: Vec<String> = parts
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{} {}", label, v)))
        .collect();
    if described.is_empty() {
        "all records".to_string()
    } else {
        described.join(", ")
    }
}

fn quoted(value: Option<&str>) -> Option<String> {
    value.map(|v| format!("\"{}\"", v))
}

fn render_records(
    spec: &DatasetSpec,
    thing: &str,
    description: &str,
    outcome: Result<Vec<Record>, RemoteError>,
    limit: usize,
) -> String {
    let records = match outcome {
        Ok(records) => records,
        Err(err) => {
            warn!(dataset = spec.name, error = %err, "datastore query failed");
            return format!("Error fetching {}: {}", thing, err);
        }
    };
    if records.is_empty() {
        return format!("No {} found for {}.", thing, description);
    }

    let shown = records.len().min(limit);
    let mut header = format!("Found {} {} for {}", records.len(), thing, description);
    if shown < records.len() {
        header.push_str(&format!(" (showing first {})", shown));
    }
    format!(
        "{}:\n\n{}",
        header,
        format_records(&records[..shown], spec.display_fields)
    )
}

fn render_summary(
    spec: &DatasetSpec,
    thing: &str,
    ranked: &str,
    description: &str,
    outcome: Result<(usize, Vec<SummaryEntry>), RemoteError>,
    metric: MetricFormat,
) -> String {
    let (total, entries) = match outcome {
        Ok(summary) => summary,
        Err(err) => {
            warn!(dataset = spec.name, error = %err, "datastore query failed");
            return format!("Error fetching {}: {}", thing, err);
        }
    };
    if entries.is_empty() {
        return format!("No {} found for {}.", thing, description);
    }
    format!(
        "Top {} {} for {} ({} {}):\n\n{}",
        entries.len(),
        ranked,
        description,
        total,
        thing,
        format_summary(&entries, metric)
    )
}

// ============ list_datasets ============

/// Configuration status of every known dataset.
pub struct ListDatasetsTool;

#[async_trait]
impl Tool for ListDatasetsTool {
    fn name(&self) -> &str {
        "list_datasets"
    }

    fn description(&self) -> &str {
        "List the open-data tables this server can query and whether each is configured"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<String> {
        let lines: Vec<String> = datasets::get_datasets(ctx.config())
            .into_iter()
            .map(|ds| match ds.resource_id {
                Some(id) => format!("{} ({}): configured, resource {}, {} paging", ds.name, ds.title, id, ds.paging),
                None => format!("{} ({}): not configured", ds.name, ds.title),
            })
            .collect();
        Ok(lines.join("\n"))
    }
}

// ============ Building permits ============

pub struct SearchBuildingPermits;

#[async_trait]
impl Tool for SearchBuildingPermits {
    fn name(&self) -> &str {
        "search_building_permits"
    }

    fn description(&self) -> &str {
        "Find every building permit filed for a street address"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "address": { "type": "string", "description": "Street address, e.g. \"65 Commonwealth Ave\"" },
                "limit": limit_schema()
            },
            "required": ["address"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let address = req_str(&params, "address")?;
        let limit = usize_or(&params, "limit", DEFAULT_LIMIT);
        let adapter = ctx.adapter(&BUILDING_PERMITS)?;

        let outcome = datasets::permits_by_address(&adapter, ctx.datastore(), address).await;
        let description = describe(&[("address", quoted(Some(address)))]);
        Ok(render_records(&BUILDING_PERMITS, "building permits", &description, outcome, limit))
    }
}

// ============ 311 service requests ============

pub struct SearchServiceRequests;

#[async_trait]
impl Tool for SearchServiceRequests {
    fn name(&self) -> &str {
        "search_service_requests"
    }

    fn description(&self) -> &str {
        "Find 311 service requests recorded at an exact street address"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "address": { "type": "string", "description": "Street address, matched exactly after normalization" },
                "case_status": { "type": "string", "enum": ["Open", "Closed"], "description": "Only cases with this status" },
                "limit": limit_schema()
            },
            "required": ["address"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let address = req_str(&params, "address")?;
        let case_status = opt_str(&params, "case_status");
        let limit = usize_or(&params, "limit", DEFAULT_LIMIT);
        let adapter = ctx.adapter(&SERVICE_REQUESTS)?;

        let outcome =
            datasets::service_requests_by_address(&adapter, ctx.datastore(), address, case_status)
                .await;
        let description = describe(&[
            ("address", quoted(Some(address))),
            ("status", case_status.map(str::to_string)),
        ]);
        Ok(render_records(&SERVICE_REQUESTS, "311 service requests", &description, outcome, limit))
    }
}

// ============ Food violations ============

pub struct SearchFoodViolations;

#[async_trait]
impl Tool for SearchFoodViolations {
    fn name(&self) -> &str {
        "search_food_violations"
    }

    fn description(&self) -> &str {
        "Find food-establishment inspection violations for a business"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "business_name": { "type": "string", "description": "Business name, matched loosely" },
                "address": { "type": "string", "description": "Optional street address to narrow results" },
                "violation_status": { "type": "string", "enum": ["Pass", "Fail"], "description": "Only violations with this status" },
                "limit": limit_schema()
            },
            "required": ["business_name"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let business = req_str(&params, "business_name")?;
        let address = opt_str(&params, "address");
        let status = opt_str(&params, "violation_status");
        let limit = usize_or(&params, "limit", DEFAULT_LIMIT);
        let adapter = ctx.adapter(&FOOD_VIOLATIONS)?;

        let outcome =
            datasets::food_violations(&adapter, ctx.datastore(), business, address, status).await;
        let description = describe(&[
            ("business", quoted(Some(business))),
            ("address", quoted(address)),
            ("status", status.map(str::to_string)),
        ]);
        Ok(render_records(&FOOD_VIOLATIONS, "food violations", &description, outcome, limit))
    }
}

// ============ Crime incidents ============

fn crime_query(params: &Value) -> CrimeQuery<'_> {
    CrimeQuery {
        street: opt_str(params, "street"),
        district: opt_str(params, "district"),
        year: opt_i64(params, "year"),
    }
}

fn describe_crime(query: &CrimeQuery<'_>) -> String {
    describe(&[
        ("street", quoted(query.street)),
        ("district", query.district.map(str::to_string)),
        ("year", query.year.map(|y| y.to_string())),
    ])
}

pub struct SearchCrimeIncidents;

#[async_trait]
impl Tool for SearchCrimeIncidents {
    fn name(&self) -> &str {
        "search_crime_incidents"
    }

    fn description(&self) -> &str {
        "Find crime incident reports on a street, optionally by district and year"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "street": { "type": "string", "description": "Street name, e.g. \"Washington St\"" },
                "district": { "type": "string", "description": "Police district code, e.g. \"B2\"" },
                "year": { "type": "integer", "minimum": 2015, "maximum": 2100 },
                "limit": limit_schema()
            },
            "required": ["street"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let query = CrimeQuery {
            street: Some(req_str(&params, "street")?),
            ..crime_query(&params)
        };
        let limit = usize_or(&params, "limit", DEFAULT_LIMIT);
        let adapter = ctx.adapter(&CRIME_INCIDENTS)?;

        let outcome = datasets::crime_incidents(&adapter, ctx.datastore(), &query).await;
        Ok(render_records(
            &CRIME_INCIDENTS,
            "crime incidents",
            &describe_crime(&query),
            outcome,
            limit,
        ))
    }
}

pub struct SummarizeCrimeOffenses;

#[async_trait]
impl Tool for SummarizeCrimeOffenses {
    fn name(&self) -> &str {
        "summarize_crime_offenses"
    }

    fn description(&self) -> &str {
        "Rank offense types by number of incidents, optionally by street, district and year"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "street": { "type": "string", "description": "Street name" },
                "district": { "type": "string", "description": "Police district code" },
                "year": { "type": "integer", "minimum": 2015, "maximum": 2100 },
                "top_n": top_n_schema(MAX_OFFENSE_TOP_N, DEFAULT_OFFENSE_TOP_N)
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let query = crime_query(&params);
        let top_n = usize_or(&params, "top_n", DEFAULT_OFFENSE_TOP_N);
        let adapter = ctx.adapter(&CRIME_INCIDENTS)?;

        let outcome =
            datasets::crime_offense_summary(&adapter, ctx.datastore(), &query, top_n).await;
        Ok(render_summary(
            &CRIME_INCIDENTS,
            "crime incidents",
            "offense types",
            &describe_crime(&query),
            outcome,
            MetricFormat::Count,
        ))
    }
}

// ============ Checkbook ============

pub struct SearchCheckbookVendor;

#[async_trait]
impl Tool for SearchCheckbookVendor {
    fn name(&self) -> &str {
        "search_checkbook_vendor"
    }

    fn description(&self) -> &str {
        "Find city payments made to a vendor"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "vendor_name": { "type": "string", "description": "Vendor name, matched loosely" },
                "fiscal_year": { "type": "integer", "minimum": 2000, "maximum": 2100 },
                "limit": limit_schema()
            },
            "required": ["vendor_name"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let vendor = req_str(&params, "vendor_name")?;
        let fiscal_year = opt_i64(&params, "fiscal_year");
        let limit = usize_or(&params, "limit", DEFAULT_LIMIT);
        let adapter = ctx.adapter(&CHECKBOOK)?;

        let outcome =
            datasets::checkbook_vendor(&adapter, ctx.datastore(), vendor, fiscal_year).await;
        let description = describe(&[
            ("vendor", quoted(Some(vendor))),
            ("fiscal year", fiscal_year.map(|y| y.to_string())),
        ]);
        Ok(render_records(&CHECKBOOK, "checkbook payments", &description, outcome, limit))
    }
}

pub struct SummarizeCheckbookVendors;

#[async_trait]
impl Tool for SummarizeCheckbookVendors {
    fn name(&self) -> &str {
        "summarize_checkbook_vendors"
    }

    fn description(&self) -> &str {
        "Rank vendors by total city spend, optionally by department and fiscal year"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "department": { "type": "string", "description": "Exact department name" },
                "fiscal_year": { "type": "integer", "minimum": 2000, "maximum": 2100 },
                "top_n": top_n_schema(MAX_VENDOR_TOP_N, DEFAULT_VENDOR_TOP_N)
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String> {
        let department = opt_str(&params, "department");
        let fiscal_year = opt_i64(&params, "fiscal_year");
        let top_n = usize_or(&params, "top_n", DEFAULT_VENDOR_TOP_N);
        let adapter = ctx.adapter(&CHECKBOOK)?;

        let outcome = datasets::checkbook_vendor_summary(
            &adapter,
            ctx.datastore(),
            department,
            fiscal_year,
            top_n,
        )
        .await;
        let description = describe(&[
            ("department", quoted(department)),
            ("fiscal year", fiscal_year.map(|y| y.to_string())),
        ]);
        Ok(render_summary(
            &CHECKBOOK,
            "checkbook payments",
            "vendors by spend",
            &description,
            outcome,
            MetricFormat::Currency,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DatasetConfig};
    use crate::params::validate_params;
    use futures::executor::block_on;
    use opendata_harness_core::datastore::memory::InMemoryDatastore;
    use std::sync::Arc;

    fn ctx_with(store: Arc<InMemoryDatastore>) -> ToolContext {
        let mut cfg = Config::minimal();
        for slot in [
            &mut cfg.datasets.building_permits,
            &mut cfg.datasets.service_requests,
            &mut cfg.datasets.crime_incidents,
            &mut cfg.datasets.checkbook,
        ] {
            *slot = Some(DatasetConfig {
                resource_id: "table".to_string(),
                paging: None,
            });
        }
        ToolContext::new(Arc::new(cfg), store)
    }

    fn call(tool: &dyn Tool, ctx: &ToolContext, params: Value) -> Result<String> {
        let params = validate_params(&tool.parameters_schema(), &params)?;
        block_on(tool.execute(params, ctx))
    }

    fn row(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().map(|(k, v)| (*k, json!(v))).collect()
    }

    #[test]
    fn test_service_requests_reconciled_across_two_pages() {
        let store = Arc::new(InMemoryDatastore::new());
        let mut rows = Vec::new();
        for i in 0..180 {
            let id = i.to_string();
            let street = match i {
                150.. => "100 Main Street Rear",
                _ if i % 2 == 0 => "100 Main Street",
                _ => "100 MAIN ST.",
            };
            rows.push(row(&[
                ("case_enquiry_id", id.as_str()),
                ("location_street_name", street),
                ("case_status", "Open"),
            ]));
        }
        store.insert_table("table", rows);
        let ctx = ctx_with(store.clone());

        let text = call(
            &SearchServiceRequests,
            &ctx,
            json!({"address": "100 MAIN ST", "limit": 500}),
        )
        .unwrap();

        assert!(text.starts_with("Found 150 311 service requests for address \"100 MAIN ST\":"));
        // count probe + two pages in one batch
        let requests = store.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].limit, 1);
        assert_eq!(text.matches("\n---\n").count(), 149);
    }

    #[test]
    fn test_limit_truncates_dump_but_header_counts_all() {
        let store = Arc::new(InMemoryDatastore::new());
        store.insert_table(
            "table",
            (0..5)
                .map(|i| {
                    let permit = format!("P{}", i);
                    row(&[("permitnumber", permit.as_str()), ("address", "12 Elm Street")])
                })
                .collect(),
        );
        let ctx = ctx_with(store);

        let text = call(
            &SearchBuildingPermits,
            &ctx,
            json!({"address": "12 Elm St", "limit": 2}),
        )
        .unwrap();
        assert!(text.contains("Found 5 building permits"));
        assert!(text.contains("(showing first 2)"));
        assert!(text.contains("permitnumber: P1"));
        assert!(!text.contains("permitnumber: P2"));
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let store = Arc::new(InMemoryDatastore::new());
        store.insert_table("table", Vec::new());
        let ctx = ctx_with(store);

        let text = call(&SearchBuildingPermits, &ctx, json!({"address": "1 Nowhere Ave"})).unwrap();
        assert_eq!(text, "No building permits found for address \"1 Nowhere Ave\".");
    }

    #[test]
    fn test_remote_error_rendered_as_text() {
        let store = Arc::new(InMemoryDatastore::new());
        store.fail_always(RemoteError::Status {
            status: 503,
            reason: "Service Unavailable".to_string(),
        });
        let ctx = ctx_with(store.clone());

        let text = call(&SearchBuildingPermits, &ctx, json!({"address": "1 Main St"})).unwrap();
        assert_eq!(
            text,
            "Error fetching building permits: HTTP 503: Service Unavailable"
        );
        assert_eq!(store.requests().len(), 1);
    }

    #[test]
    fn test_crime_summary_caps_at_distinct_keys() {
        let store = Arc::new(InMemoryDatastore::new());
        let offenses = ["LARCENY", "ASSAULT", "VANDALISM"];
        store.insert_table(
            "table",
            (0..25)
                .map(|i| row(&[("OFFENSE_DESCRIPTION", offenses[i % 3]), ("STREET", "BOYLSTON ST")]))
                .collect(),
        );
        let ctx = ctx_with(store);

        let text = call(&SummarizeCrimeOffenses, &ctx, json!({"top_n": 10})).unwrap();
        assert!(text.starts_with("Top 3 offense types for all records (25 crime incidents):"));
        assert!(text.ends_with("1. LARCENY: 9\n2. ASSAULT: 8\n3. VANDALISM: 8"));
    }

    #[test]
    fn test_vendor_summary_sums_amounts() {
        let store = Arc::new(InMemoryDatastore::new());
        store.insert_table(
            "table",
            vec![
                row(&[("Vendor Name", "ACME"), ("Monetary Amount", "$10.00")]),
                row(&[("Vendor Name", "Globex"), ("Monetary Amount", "$1,200.50")]),
                row(&[("Vendor Name", "ACME"), ("Monetary Amount", "abc")]),
                row(&[("Vendor Name", "ACME"), ("Monetary Amount", "$5")]),
            ],
        );
        let ctx = ctx_with(store);

        let text = call(&SummarizeCheckbookVendors, &ctx, json!({})).unwrap();
        assert!(text.ends_with("1. Globex: $1200.50\n2. ACME: $15.00"));
    }

    #[test]
    fn test_top_n_out_of_range_rejected() {
        let store = Arc::new(InMemoryDatastore::new());
        let ctx = ctx_with(store);
        assert!(call(&SummarizeCrimeOffenses, &ctx, json!({"top_n": 101})).is_err());
        assert!(call(&SummarizeCheckbookVendors, &ctx, json!({"top_n": 0})).is_err());
        assert!(call(&SummarizeCheckbookVendors, &ctx, json!({"top_n": 2000})).is_ok());
    }

    #[test]
    fn test_unconfigured_dataset_is_an_error() {
        let store = Arc::new(InMemoryDatastore::new());
        let ctx = ctx_with(store);
        let err = call(&SearchFoodViolations, &ctx, json!({"business_name": "Joe's"})).unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn test_list_datasets() {
        let ctx = ctx_with(Arc::new(InMemoryDatastore::new()));
        let text = call(&ListDatasetsTool, &ctx, json!({})).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("food_violations (Food establishment violations): not configured"));
    }
}
