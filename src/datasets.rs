//! Dataset adapters.
//!
//! Each remote table gets a [`DatasetSpec`] (static field knowledge: which
//! column holds the address, which columns to print, which column is the
//! row key) and, when configured, a [`DatasetAdapter`] that adds the
//! resource id and paging settings from `[datastore]` / `[datasets.*]`.
//!
//! The per-tool query functions below are the only place that knows how a
//! caller's parameters map onto `q`, `filters`, a reconciliation policy and
//! an aggregation. Everything else is the generic engine in
//! `opendata_harness_core`.

use anyhow::Result;
use opendata_harness_core::aggregate::{summarize, Metric};
use opendata_harness_core::datastore::Datastore;
use opendata_harness_core::error::RemoteError;
use opendata_harness_core::models::{PagingPolicy, QueryDescriptor, Record, SummaryEntry};
use opendata_harness_core::paginate::fetch_all;
use opendata_harness_core::reconcile::{dedupe_by, reconcile, MatchMode};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::{Config, DatasetConfig};

/// Column names the adapters inspect.
pub mod fields {
    pub const PERMIT_NUMBER: &str = "permitnumber";
    pub const PERMIT_ADDRESS: &str = "address";

    pub const CASE_ID: &str = "case_enquiry_id";
    pub const CASE_STATUS: &str = "case_status";
    pub const CASE_STREET: &str = "location_street_name";

    pub const BUSINESS_NAME: &str = "businessname";
    pub const BUSINESS_ADDRESS: &str = "address";
    pub const VIOLATION_STATUS: &str = "violstatus";

    pub const CRIME_STREET: &str = "STREET";
    pub const CRIME_DISTRICT: &str = "DISTRICT";
    pub const CRIME_YEAR: &str = "YEAR";
    pub const CRIME_OFFENSE: &str = "OFFENSE_DESCRIPTION";

    pub const VENDOR_NAME: &str = "Vendor Name";
    pub const DEPARTMENT: &str = "Department Name";
    pub const FISCAL_YEAR: &str = "Fiscal Year";
    pub const AMOUNT: &str = "Monetary Amount";
}

/// What the adapters know about a remote table independent of config.
#[derive(Debug)]
pub struct DatasetSpec {
    /// Config section name under `[datasets]`.
    pub name: &'static str,
    pub title: &'static str,
    pub default_paging: PagingPolicy,
    /// Columns printed by record-dump tools, in order.
    pub display_fields: &'static [&'static str],
    /// Natural row key used to drop rows repeated across pages.
    pub dedupe_key: Option<&'static str>,
}

pub static BUILDING_PERMITS: DatasetSpec = DatasetSpec {
    name: "building_permits",
    title: "Building permits",
    default_paging: PagingPolicy::CountProbe,
    display_fields: &[
        "permitnumber",
        "worktype",
        "permittypedescr",
        "description",
        "applicant",
        "declared_valuation",
        "issued_date",
        "expiration_date",
        "status",
        "address",
        "city",
        "zip",
    ],
    dedupe_key: Some(fields::PERMIT_NUMBER),
};

pub static SERVICE_REQUESTS: DatasetSpec = DatasetSpec {
    name: "service_requests",
    title: "311 service requests",
    default_paging: PagingPolicy::CountProbe,
    display_fields: &[
        "case_enquiry_id",
        "open_dt",
        "closed_dt",
        "case_status",
        "closure_reason",
        "case_title",
        "subject",
        "reason",
        "type",
        "department",
        "location",
        "location_street_name",
    ],
    dedupe_key: Some(fields::CASE_ID),
};

pub static FOOD_VIOLATIONS: DatasetSpec = DatasetSpec {
    name: "food_violations",
    title: "Food establishment violations",
    default_paging: PagingPolicy::ShortPage,
    display_fields: &[
        "businessname",
        "licenseno",
        "address",
        "city",
        "violdttm",
        "viollevel",
        "violdesc",
        "violstatus",
        "comments",
    ],
    dedupe_key: None,
};

pub static CRIME_INCIDENTS: DatasetSpec = DatasetSpec {
    name: "crime_incidents",
    title: "Crime incident reports",
    default_paging: PagingPolicy::CountProbe,
    display_fields: &[
        "INCIDENT_NUMBER",
        "OFFENSE_CODE",
        "OFFENSE_DESCRIPTION",
        "DISTRICT",
        "REPORTING_AREA",
        "SHOOTING",
        "OCCURRED_ON_DATE",
        "YEAR",
        "STREET",
    ],
    dedupe_key: None,
};

pub static CHECKBOOK: DatasetSpec = DatasetSpec {
    name: "checkbook",
    title: "Checkbook vendor payments",
    default_paging: PagingPolicy::CountProbe,
    display_fields: &[
        "Vendor Name",
        "Department Name",
        "Account Descr",
        "Monetary Amount",
        "Entered",
        "Fiscal Year",
    ],
    dedupe_key: None,
};

/// Every known dataset, in listing order.
pub static ALL: [&DatasetSpec; 5] = [
    &BUILDING_PERMITS,
    &SERVICE_REQUESTS,
    &FOOD_VIOLATIONS,
    &CRIME_INCIDENTS,
    &CHECKBOOK,
];

/// A dataset with its runtime settings resolved.
#[derive(Debug, Clone)]
pub struct DatasetAdapter {
    pub spec: &'static DatasetSpec,
    pub resource_id: String,
    pub page_size: u64,
    pub concurrency: usize,
    pub paging: PagingPolicy,
}

impl DatasetAdapter {
    /// Resolve `spec` against the config. `None` when its section is absent.
    pub fn resolve(config: &Config, spec: &'static DatasetSpec) -> Option<Self> {
        let dataset = dataset_config(config, spec.name)?;
        Some(Self {
            spec,
            resource_id: dataset.resource_id.clone(),
            page_size: config.datastore.page_size,
            concurrency: config.datastore.concurrency,
            paging: dataset.paging.unwrap_or(spec.default_paging),
        })
    }

    /// Whole-table descriptor carrying this dataset's paging settings.
    pub fn descriptor(&self) -> QueryDescriptor {
        QueryDescriptor::new(self.resource_id.clone()).with_paging(
            self.page_size,
            self.concurrency,
            self.paging,
        )
    }

    /// Run `descriptor` to completion and drop rows repeated across pages.
    pub async fn fetch(
        &self,
        store: &dyn Datastore,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<Record>, RemoteError> {
        let records = fetch_all(store, descriptor).await?;
        let fetched = records.len();
        let records = match self.spec.dedupe_key {
            Some(key) => dedupe_by(records, key),
            None => records,
        };
        debug!(
            dataset = self.spec.name,
            fetched,
            kept = records.len(),
            "fetched dataset rows"
        );
        Ok(records)
    }
}

fn dataset_config<'a>(config: &'a Config, name: &str) -> Option<&'a DatasetConfig> {
    config
        .datasets
        .configured()
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| c)
}

// ============ Queries ============

/// Permits at an address: `q = address`, forgiving match on `address`.
#[instrument(skip_all, fields(dataset = "building_permits"))]
pub async fn permits_by_address(
    adapter: &DatasetAdapter,
    store: &dyn Datastore,
    address: &str,
) -> Result<Vec<Record>, RemoteError> {
    let descriptor = adapter.descriptor().with_phrase(address);
    let records = adapter.fetch(store, &descriptor).await?;
    Ok(reconcile(
        records,
        fields::PERMIT_ADDRESS,
        address,
        MatchMode::Bidirectional,
    ))
}

/// 311 cases at an address, optionally restricted to one case status.
#[instrument(skip_all, fields(dataset = "service_requests"))]
pub async fn service_requests_by_address(
    adapter: &DatasetAdapter,
    store: &dyn Datastore,
    address: &str,
    case_status: Option<&str>,
) -> Result<Vec<Record>, RemoteError> {
    let mut descriptor = adapter.descriptor().with_phrase(address);
    if let Some(status) = case_status {
        descriptor = descriptor.with_filter(fields::CASE_STATUS, status);
    }
    let records = adapter.fetch(store, &descriptor).await?;
    Ok(reconcile(
        records,
        fields::CASE_STREET,
        address,
        MatchMode::Exact,
    ))
}

/// Violations for a business, optionally narrowed by address and status.
#[instrument(skip_all, fields(dataset = "food_violations"))]
pub async fn food_violations(
    adapter: &DatasetAdapter,
    store: &dyn Datastore,
    business: &str,
    address: Option<&str>,
    violation_status: Option<&str>,
) -> Result<Vec<Record>, RemoteError> {
    let mut descriptor = adapter.descriptor().with_phrase(business);
    if let Some(address) = address {
        descriptor = descriptor.with_phrase(address);
    }
    if let Some(status) = violation_status {
        descriptor = descriptor.with_filter(fields::VIOLATION_STATUS, status);
    }
    let records = adapter.fetch(store, &descriptor).await?;
    let records = reconcile(
        records,
        fields::BUSINESS_NAME,
        business,
        MatchMode::Bidirectional,
    );
    Ok(match address {
        Some(address) => reconcile(
            records,
            fields::BUSINESS_ADDRESS,
            address,
            MatchMode::Bidirectional,
        ),
        None => records,
    })
}

/// Crime query parameters shared by the search and summary tools.
#[derive(Debug, Clone, Default)]
pub struct CrimeQuery<'a> {
    pub street: Option<&'a str>,
    pub district: Option<&'a str>,
    pub year: Option<i64>,
}

/// Crime incidents by street / district / year.
#[instrument(skip_all, fields(dataset = "crime_incidents"))]
pub async fn crime_incidents(
    adapter: &DatasetAdapter,
    store: &dyn Datastore,
    query: &CrimeQuery<'_>,
) -> Result<Vec<Record>, RemoteError> {
    let mut descriptor = adapter.descriptor();
    if let Some(street) = query.street {
        descriptor = descriptor.with_phrase(street);
    }
    if let Some(district) = query.district {
        descriptor = descriptor.with_filter(fields::CRIME_DISTRICT, district);
    }
    if let Some(year) = query.year {
        descriptor = descriptor.with_filter(fields::CRIME_YEAR, &year.to_string());
    }
    let records = adapter.fetch(store, &descriptor).await?;
    Ok(match query.street {
        Some(street) => reconcile(
            records,
            fields::CRIME_STREET,
            street,
            MatchMode::Bidirectional,
        ),
        None => records,
    })
}

/// Offense types ranked by incident count.
pub async fn crime_offense_summary(
    adapter: &DatasetAdapter,
    store: &dyn Datastore,
    query: &CrimeQuery<'_>,
    top_n: usize,
) -> Result<(usize, Vec<SummaryEntry>), RemoteError> {
    let records = crime_incidents(adapter, store, query).await?;
    let entries = summarize(&records, fields::CRIME_OFFENSE, &Metric::Count, top_n);
    Ok((records.len(), entries))
}

/// Checkbook payments to a vendor, optionally within one fiscal year.
#[instrument(skip_all, fields(dataset = "checkbook"))]
pub async fn checkbook_vendor(
    adapter: &DatasetAdapter,
    store: &dyn Datastore,
    vendor: &str,
    fiscal_year: Option<i64>,
) -> Result<Vec<Record>, RemoteError> {
    let mut descriptor = adapter.descriptor().with_phrase(vendor);
    if let Some(year) = fiscal_year {
        descriptor = descriptor.with_filter(fields::FISCAL_YEAR, &year.to_string());
    }
    let records = adapter.fetch(store, &descriptor).await?;
    Ok(reconcile(
        records,
        fields::VENDOR_NAME,
        vendor,
        MatchMode::Bidirectional,
    ))
}

/// Vendors ranked by total spend. No reconciliation: the filters are exact.
#[instrument(skip_all, fields(dataset = "checkbook"))]
pub async fn checkbook_vendor_summary(
    adapter: &DatasetAdapter,
    store: &dyn Datastore,
    department: Option<&str>,
    fiscal_year: Option<i64>,
    top_n: usize,
) -> Result<(usize, Vec<SummaryEntry>), RemoteError> {
    let mut descriptor = adapter.descriptor();
    if let Some(department) = department {
        descriptor = descriptor.with_filter(fields::DEPARTMENT, department);
    }
    if let Some(year) = fiscal_year {
        descriptor = descriptor.with_filter(fields::FISCAL_YEAR, &year.to_string());
    }
    let records = adapter.fetch(store, &descriptor).await?;
    let entries = summarize(
        &records,
        fields::VENDOR_NAME,
        &Metric::sum(fields::AMOUNT),
        top_n,
    );
    Ok((records.len(), entries))
}

// ============ Status ============

/// Configuration status of one dataset, for `odh datasets` and the
/// `list_datasets` tool.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatus {
    pub name: String,
    pub title: String,
    pub configured: bool,
    pub resource_id: Option<String>,
    pub paging: String,
}

pub fn get_datasets(config: &Config) -> Vec<DatasetStatus> {
    ALL.iter()
        .map(|spec| match DatasetAdapter::resolve(config, spec) {
            Some(adapter) => DatasetStatus {
                name: spec.name.to_string(),
                title: spec.title.to_string(),
                configured: true,
                resource_id: Some(adapter.resource_id),
                paging: adapter.paging.as_str().to_string(),
            },
            None => DatasetStatus {
                name: spec.name.to_string(),
                title: spec.title.to_string(),
                configured: false,
                resource_id: None,
                paging: spec.default_paging.as_str().to_string(),
            },
        })
        .collect()
}

pub fn list_datasets(config: &Config) -> Result<()> {
    println!("{:<18} {:<12} {:<12} RESOURCE", "DATASET", "STATUS", "PAGING");
    for ds in get_datasets(config) {
        let status = if ds.configured { "OK" } else { "NOT CONFIGURED" };
        println!(
            "{:<18} {:<12} {:<12} {}",
            ds.name,
            status,
            ds.paging,
            ds.resource_id.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
