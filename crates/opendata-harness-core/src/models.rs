//! Core data models shared by the paginator, reconciler and aggregator.
//!
//! Records coming back from a datastore have no fixed schema: each table
//! decides its own columns. The engine therefore treats a [`Record`] as an
//! open mapping and only reads the handful of fields an adapter names.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row returned by the remote datastore.
///
/// Field order follows the upstream response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// The value of a single field, as seen through [`Record::field`].
///
/// Absent keys are reported as [`FieldValue::Missing`] rather than an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Missing,
    Null,
    Text(&'a str),
    Number(&'a serde_json::Number),
    Bool(bool),
    /// Arrays and objects. Datastore rows are expected to be flat.
    Nested(&'a Value),
}

impl<'a> FieldValue<'a> {
    fn of(value: Option<&'a Value>) -> Self {
        match value {
            None => FieldValue::Missing,
            Some(Value::Null) => FieldValue::Null,
            Some(Value::String(s)) => FieldValue::Text(s),
            Some(Value::Number(n)) => FieldValue::Number(n),
            Some(Value::Bool(b)) => FieldValue::Bool(*b),
            Some(other) => FieldValue::Nested(other),
        }
    }

    /// Returns `true` for [`FieldValue::Missing`] and [`FieldValue::Null`].
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Missing | FieldValue::Null)
    }

    /// Render the value as text. Missing and null values become `""`.
    pub fn as_text(&self) -> Cow<'a, str> {
        match *self {
            FieldValue::Missing | FieldValue::Null => Cow::Borrowed(""),
            FieldValue::Text(s) => Cow::Borrowed(s),
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
            FieldValue::Bool(b) => Cow::Borrowed(if b { "true" } else { "false" }),
            FieldValue::Nested(v) => Cow::Owned(v.to_string()),
        }
    }
}

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Look up a field. Never fails: absent keys yield [`FieldValue::Missing`].
    pub fn field(&self, name: &str) -> FieldValue<'_> {
        FieldValue::of(self.0.get(name))
    }

    /// Shorthand for `self.field(name).as_text()`.
    pub fn text(&self, name: &str) -> Cow<'_, str> {
        self.field(name).as_text()
    }

    /// Iterate over `(field, value)` pairs in upstream order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldValue<'_>)> {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), FieldValue::of(Some(v))))
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Records fetched at a single offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub offset: u64,
    pub records: Vec<Record>,
}

/// How the paginator walks a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagingPolicy {
    /// Probe the total with a one-row request, then fetch precomputed
    /// offsets in bounded parallel batches.
    #[default]
    CountProbe,
    /// Walk pages sequentially and stop at the first page shorter than the
    /// page size. No count probe; `total` is not needed.
    ShortPage,
}

impl PagingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PagingPolicy::CountProbe => "count_probe",
            PagingPolicy::ShortPage => "short_page",
        }
    }
}

/// Everything the paginator needs to retrieve one result set.
///
/// Built fresh for every tool invocation by a dataset adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    /// Remote table identifier.
    pub resource_id: String,
    /// Space-joined full-text phrases (`q`). `None` matches every row.
    pub full_text: Option<String>,
    /// Field → exact value, applied conjunctively.
    pub filters: BTreeMap<String, String>,
    pub page_size: u64,
    /// Maximum simultaneous page requests.
    pub concurrency: usize,
    pub paging: PagingPolicy,
}

impl QueryDescriptor {
    /// Descriptor for the whole table with page size 100 and concurrency 7.
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            full_text: None,
            filters: BTreeMap::new(),
            page_size: 100,
            concurrency: 7,
            paging: PagingPolicy::CountProbe,
        }
    }

    /// Append a full-text phrase. Blank phrases are ignored.
    pub fn with_phrase(mut self, phrase: &str) -> Self {
        let phrase = phrase.trim();
        if phrase.is_empty() {
            return self;
        }
        self.full_text = Some(match self.full_text.take() {
            Some(existing) => format!("{} {}", existing, phrase),
            None => phrase.to_string(),
        });
        self
    }

    /// Add an exact-equality filter. Blank values are ignored.
    pub fn with_filter(mut self, field: impl Into<String>, value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty() {
            self.filters.insert(field.into(), value.to_string());
        }
        self
    }

    pub fn with_paging(mut self, page_size: u64, concurrency: usize, paging: PagingPolicy) -> Self {
        self.page_size = page_size;
        self.concurrency = concurrency;
        self.paging = paging;
        self
    }
}

/// One ranked line of an aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    /// Grouping value; `"UNKNOWN"` when the field was missing or blank.
    pub key: String,
    /// Count or sum, depending on the metric.
    pub metric: f64,
    /// 1-based position after sorting.
    pub rank: usize,
}
