//! # Open Data Harness
//!
//! MCP tools that return complete, locally reconciled answers from large
//! CKAN open-data tables (building permits, 311 requests, food violations,
//! crime incidents, checkbook payments).
//!
//! The engine lives in [`opendata_harness_core`]: count probe, bounded
//! concurrent page fetches, address normalization, reconciliation and
//! ranked summaries. This crate supplies the CKAN HTTP client, the dataset
//! adapters and the tool surfaces.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────────────┐   ┌──────────┐
//! │  Tools   │──▶│   Dataset    │──▶│ Paginator → Reconcile│──▶│   CKAN   │
//! │ HTTP/MCP │   │   Adapters   │   │  → Summarize/Format  │   │ Datastore│
//! └──────────┘   └──────────────┘   └─────────────────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`ckan`] | reqwest-backed `Datastore` for `datastore_search` |
//! | [`datasets`] | Per-table adapters and dataset status |
//! | [`params`] | Schema-driven parameter validation |
//! | [`traits`] | `Tool` trait, context and registry |
//! | [`tools`] | Built-in dataset tools |
//! | [`server`] | HTTP tool API with MCP mounted at `/mcp` |
//! | [`mcp`] | MCP bridge and stdio transport |

pub mod ckan;
pub mod config;
pub mod datasets;
pub mod mcp;
pub mod params;
pub mod server;
pub mod tools;
pub mod traits;
