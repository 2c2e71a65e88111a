//! In-memory [`Datastore`] implementation for tests.
//!
//! Tables are plain `Vec<Record>`s keyed by resource id. Full-text search
//! matches a row when every whitespace-separated term of `q` appears
//! (case-insensitively) in at least one of its fields; filters compare the
//! field text for equality. Every request is logged, and the number of
//! simultaneously pending requests is tracked so tests can assert on the
//! concurrency bound.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::Record;

use super::{Datastore, DatastoreRequest, DatastoreResponse};

/// In-memory datastore with request logging and failure injection.
pub struct InMemoryDatastore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    requests: Mutex<Vec<DatastoreRequest>>,
    failures: Mutex<Vec<Failure>>,
    report_total: bool,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

struct Failure {
    /// `None` fails every request.
    offset: Option<u64>,
    error: RemoteError,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            report_total: true,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Stop reporting `total` in responses, like some CKAN endpoints.
    pub fn without_total(mut self) -> Self {
        self.report_total = false;
        self
    }

    /// Replace the rows of a table.
    pub fn insert_table(&self, resource_id: &str, rows: Vec<Record>) {
        lock(&self.tables).insert(resource_id.to_string(), rows);
    }

    /// Fail every request whose offset equals `offset`.
    pub fn fail_at_offset(&self, offset: u64, error: RemoteError) {
        lock(&self.failures).push(Failure {
            offset: Some(offset),
            error,
        });
    }

    /// Fail every request.
    pub fn fail_always(&self, error: RemoteError) {
        lock(&self.failures).push(Failure {
            offset: None,
            error,
        });
    }

    /// All requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<DatastoreRequest> {
        lock(&self.requests).clone()
    }

    /// Highest number of requests that were pending at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn matching_rows(&self, req: &DatastoreRequest) -> Vec<Record> {
        let tables = lock(&self.tables);
        let Some(rows) = tables.get(&req.resource_id) else {
            return Vec::new();
        };
        let terms: Vec<String> = req
            .full_text
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();

        rows.iter()
            .filter(|row| {
                req.filters
                    .iter()
                    .all(|(field, value)| row.text(field) == value.as_str())
            })
            .filter(|row| {
                let haystack: Vec<String> =
                    row.iter().map(|(_, v)| v.as_text().to_lowercase()).collect();
                terms
                    .iter()
                    .all(|t| haystack.iter().any(|field| field.contains(t.as_str())))
            })
            .cloned()
            .collect()
    }
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn query(&self, request: &DatastoreRequest) -> Result<DatastoreResponse, RemoteError> {
        lock(&self.requests).push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        // Stay pending for one poll so sibling requests in a batch overlap.
        YieldNow(false).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let injected = lock(&self.failures)
            .iter()
            .find(|f| f.offset.map_or(true, |o| o == request.offset))
            .map(|f| f.error.clone());
        if let Some(err) = injected {
            return Err(err);
        }

        let rows = self.matching_rows(request);
        let total = rows.len() as u64;
        let records = rows
            .into_iter()
            .skip(request.offset as usize)
            .take(request.limit as usize)
            .collect();

        Ok(DatastoreResponse {
            records,
            total: self.report_total.then_some(total),
        })
    }
}

/// Returns `Pending` once, then `Ready`.
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
