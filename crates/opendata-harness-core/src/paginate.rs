//! Bounded-concurrency paginator.
//!
//! Retrieves every row matching a [`QueryDescriptor`] from a [`Datastore`]
//! that caps the rows returned per call.
//!
//! # Count-probe protocol ([`PagingPolicy::CountProbe`])
//!
//! 1. Request one row at offset 0 and read `total` from the response.
//! 2. Stop with an empty result if `total == 0`.
//! 3. Precompute offsets `0, page_size, 2*page_size, ...` covering `[0, total)`.
//! 4. Split offsets into batches of at most `concurrency`.
//! 5. Run each batch's requests concurrently; start the next batch only
//!    after the whole batch has completed.
//! 6. Concatenate pages in offset order (not completion order).
//!
//! Any failed request aborts the whole fetch. Nothing is retried, and the
//! remote table is not snapshot-isolated: rows that move between the probe
//! and the page requests may be skipped or repeated.
//!
//! # Short-page protocol ([`PagingPolicy::ShortPage`])
//!
//! Pages are requested one after another and iteration stops at the first
//! page holding fewer than `page_size` rows. No count probe is issued, so
//! datastores that omit `total` are supported.

use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::datastore::{Datastore, DatastoreRequest};
use crate::error::RemoteError;
use crate::models::{Page, PagingPolicy, QueryDescriptor, Record};

/// Fetch every record matching `descriptor`, following its paging policy.
#[instrument(
    name = "fetch_all",
    skip_all,
    fields(resource = %descriptor.resource_id, policy = descriptor.paging.as_str())
)]
pub async fn fetch_all<D>(store: &D, descriptor: &QueryDescriptor) -> Result<Vec<Record>, RemoteError>
where
    D: Datastore + ?Sized,
{
    match descriptor.paging {
        PagingPolicy::CountProbe => {
            let total = count(store, descriptor).await?;
            if total == 0 {
                debug!("count probe reported no rows");
                return Ok(Vec::new());
            }
            let offsets = page_offsets(total, descriptor.page_size);
            let pages = fetch_pages(store, descriptor, &offsets).await?;
            Ok(pages.into_iter().flat_map(|p| p.records).collect())
        }
        PagingPolicy::ShortPage => fetch_until_short_page(store, descriptor).await,
    }
}

/// Issue the count probe (`limit = 1`, `offset = 0`) and return `total`.
///
/// A response without `total` is [`RemoteError::Malformed`].
pub async fn count<D>(store: &D, descriptor: &QueryDescriptor) -> Result<u64, RemoteError>
where
    D: Datastore + ?Sized,
{
    let probe = DatastoreRequest::page(descriptor, 1, 0);
    let response = store.query(&probe).await?;
    let total = response.total.ok_or_else(|| {
        RemoteError::Malformed("count probe response did not include a total".to_string())
    })?;
    debug!(total, "count probe");
    Ok(total)
}

/// Offsets of every page needed to cover `[0, total)`.
///
/// `page_size` of zero is treated as one.
pub fn page_offsets(total: u64, page_size: u64) -> Vec<u64> {
    let page_size = page_size.max(1);
    (0..total.div_ceil(page_size))
        .map(|i| i * page_size)
        .collect()
}

/// Fetch the given offsets in sequential batches of at most
/// `descriptor.concurrency` parallel requests.
///
/// Pages come back in the order of `offsets`. The first failure in a batch
/// fails the call; requests still pending in that batch are dropped.
pub async fn fetch_pages<D>(
    store: &D,
    descriptor: &QueryDescriptor,
    offsets: &[u64],
) -> Result<Vec<Page>, RemoteError>
where
    D: Datastore + ?Sized,
{
    let concurrency = descriptor.concurrency.max(1);
    let mut pages = Vec::with_capacity(offsets.len());

    for (batch_no, batch) in offsets.chunks(concurrency).enumerate() {
        debug!(batch = batch_no, requests = batch.len(), "dispatching batch");
        let requests: Vec<DatastoreRequest> = batch
            .iter()
            .map(|&offset| DatastoreRequest::page(descriptor, descriptor.page_size, offset))
            .collect();

        let responses = try_join_all(requests.iter().map(|req| store.query(req))).await?;

        pages.extend(
            batch
                .iter()
                .zip(responses)
                .map(|(&offset, response)| Page {
                    offset,
                    records: response.records,
                }),
        );
    }

    Ok(pages)
}

/// Walk pages sequentially until one comes back short.
async fn fetch_until_short_page<D>(
    store: &D,
    descriptor: &QueryDescriptor,
) -> Result<Vec<Record>, RemoteError>
where
    D: Datastore + ?Sized,
{
    let page_size = descriptor.page_size.max(1);
    let mut records = Vec::new();
    let mut offset = 0;

    loop {
        let request = DatastoreRequest::page(descriptor, page_size, offset);
        let response = store.query(&request).await?;
        let received = response.records.len() as u64;
        records.extend(response.records);

        if received < page_size {
            debug!(offset, received, "short page, stopping");
            break;
        }
        offset += page_size;
    }

    Ok(records)
}
