//! # Open Data Harness Core
//!
//! Runtime-agnostic engine for Open Data Harness: the record model, address
//! normalizer, datastore trait, bounded-concurrency paginator, local
//! reconciliation, aggregation and text rendering.
//!
//! This crate contains no tokio, reqwest, filesystem I/O, or other
//! native-only dependencies. The HTTP client lives in the application crate
//! and plugs in through [`datastore::Datastore`].

pub mod aggregate;
pub mod datastore;
pub mod error;
pub mod format;
pub mod models;
pub mod normalize;
pub mod paginate;
pub mod reconcile;
