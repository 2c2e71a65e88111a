//! Remote tabular datastore abstraction.
//!
//! The [`Datastore`] trait is the single seam between the engine and the
//! network: one call is one `datastore_search`-style request for a page of
//! rows. The paginator only ever talks to this trait, so it can be driven by
//! the real HTTP client or by [`memory::InMemoryDatastore`] in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::RemoteError;
use crate::models::{QueryDescriptor, Record};

/// A single page request against one remote table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastoreRequest {
    pub resource_id: String,
    /// Full-text term (`q`). `None` or blank means no full-text constraint.
    pub full_text: Option<String>,
    /// Exact-equality filters, applied conjunctively.
    pub filters: BTreeMap<String, String>,
    pub limit: u64,
    pub offset: u64,
}

impl DatastoreRequest {
    /// Build the request for one page of a descriptor's result set.
    pub fn page(descriptor: &QueryDescriptor, limit: u64, offset: u64) -> Self {
        Self {
            resource_id: descriptor.resource_id.clone(),
            full_text: descriptor
                .full_text
                .as_ref()
                .filter(|q| !q.trim().is_empty())
                .cloned(),
            filters: descriptor.filters.clone(),
            limit,
            offset,
        }
    }

    /// Encode the request as URL query parameters.
    ///
    /// Filters are sent as a single JSON object in the `filters` parameter,
    /// which is how CKAN expects them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("resource_id", self.resource_id.clone())];
        if let Some(q) = &self.full_text {
            pairs.push(("q", q.clone()));
        }
        if !self.filters.is_empty() {
            let filters: serde_json::Map<String, Value> = self
                .filters
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            pairs.push(("filters", Value::Object(filters).to_string()));
        }
        pairs.push(("limit", self.limit.to_string()));
        pairs.push(("offset", self.offset.to_string()));
        pairs
    }
}

/// The useful part of a successful datastore response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatastoreResponse {
    pub records: Vec<Record>,
    /// Total matching rows, when the server reports it.
    pub total: Option<u64>,
}

/// Wire envelope: `{ success, result: { records, total? }, error? }`.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub result: Option<EnvelopeResult>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeResult {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl Envelope {
    /// Unwrap the envelope, turning `success: false` into a [`RemoteError`].
    pub fn into_response(self) -> Result<DatastoreResponse, RemoteError> {
        if !self.success {
            return Err(RemoteError::Unsuccessful {
                reason: failure_reason(self.error.as_ref()),
            });
        }
        let result = self
            .result
            .ok_or_else(|| RemoteError::Malformed("envelope has no result".to_string()))?;
        Ok(DatastoreResponse {
            records: result.records,
            total: result.total,
        })
    }
}

/// Extract a readable reason from a CKAN `error` object.
pub fn failure_reason(error: Option<&Value>) -> String {
    match error {
        None | Some(Value::Null) => "success flag was false".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(err) => err
            .get("message")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
            .unwrap_or_else(|| err.to_string()),
    }
}

/// Source of pages for the paginator.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use opendata_harness_core::datastore::{Datastore, DatastoreRequest, DatastoreResponse};
/// use opendata_harness_core::error::RemoteError;
///
/// struct EmptyTable;
///
/// #[async_trait]
/// impl Datastore for EmptyTable {
///     async fn query(&self, _req: &DatastoreRequest) -> Result<DatastoreResponse, RemoteError> {
///         Ok(DatastoreResponse { records: vec![], total: Some(0) })
///     }
/// }
/// ```
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Fetch one page. Non-2xx statuses and `success: false` envelopes are
    /// reported as [`RemoteError`].
    async fn query(&self, request: &DatastoreRequest) -> Result<DatastoreResponse, RemoteError>;
}
