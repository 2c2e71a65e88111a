//! The tool abstraction shared by every surface.
//!
//! A [`Tool`] is a named operation with a JSON Schema for its parameters
//! and a plain-text result. The HTTP server, the MCP bridge and the CLI all
//! dispatch through the same [`ToolRegistry`], validating parameters with
//! [`crate::params::validate_params`] before calling
//! [`execute`](Tool::execute).
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  list_datasets   search_*   summarize_*  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!   POST /tools/{name} · MCP call_tool · odh call
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use opendata_harness::config::Config;
//! use opendata_harness::traits::ToolRegistry;
//!
//! let tools = ToolRegistry::from_config(&Config::minimal());
//! assert!(tools.find("list_datasets").is_some());
//! ```

use anyhow::Result;
use async_trait::async_trait;
use opendata_harness_core::datastore::Datastore;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::datasets::{DatasetAdapter, DatasetSpec, CHECKBOOK, CRIME_INCIDENTS};
use crate::datasets::{BUILDING_PERMITS, FOOD_VIOLATIONS, SERVICE_REQUESTS};
use crate::tools;

/// A tool that agents can discover and call.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use opendata_harness::traits::{Tool, ToolContext};
///
/// pub struct DatasetCount;
///
/// #[async_trait]
/// impl Tool for DatasetCount {
///     fn name(&self) -> &str { "dataset_count" }
///     fn description(&self) -> &str { "Count configured datasets" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<String> {
///         Ok(ctx.config().datasets.configured().len().to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route path (`POST /tools/{name}`) and MCP tool name.
    fn name(&self) -> &str;

    /// One-line description for agent discovery.
    fn description(&self) -> &str;

    /// JSON Schema (`type: "object"`) for the parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool with validated parameters.
    ///
    /// Upstream failures are part of the returned text. An `Err` means the
    /// call itself was wrong (bad parameters, unconfigured dataset).
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<String>;
}

/// Everything a tool needs at execution time.
///
/// Cheap to clone; built once per server and shared across calls.
#[derive(Clone)]
pub struct ToolContext {
    config: Arc<Config>,
    datastore: Arc<dyn Datastore>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, datastore: Arc<dyn Datastore>) -> Self {
        Self { config, datastore }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn datastore(&self) -> &dyn Datastore {
        self.datastore.as_ref()
    }

    /// The configured adapter for `spec`.
    pub fn adapter(&self, spec: &'static DatasetSpec) -> Result<DatasetAdapter> {
        DatasetAdapter::resolve(&self.config, spec)
            .ok_or_else(|| ToolError::NotConfigured(spec.name).into())
    }
}

/// Caller mistakes a tool can report. Anything else a tool returns is an
/// internal failure.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("dataset '{0}' is not configured")]
    NotConfigured(&'static str),
    #[error("{0}")]
    InvalidParams(String),
}

/// Serializable tool info for `GET /tools/list` and `odh tools list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters_schema(),
        }
    }
}

/// Registry of callable tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// `list_datasets` plus the tools of every configured dataset.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(tools::ListDatasetsTool));

        let configured = |spec: &DatasetSpec| {
            config
                .datasets
                .configured()
                .iter()
                .any(|(name, _)| *name == spec.name)
        };

        if configured(&BUILDING_PERMITS) {
            registry.register(Box::new(tools::SearchBuildingPermits));
        }
        if configured(&SERVICE_REQUESTS) {
            registry.register(Box::new(tools::SearchServiceRequests));
        }
        if configured(&FOOD_VIOLATIONS) {
            registry.register(Box::new(tools::SearchFoodViolations));
        }
        if configured(&CRIME_INCIDENTS) {
            registry.register(Box::new(tools::SearchCrimeIncidents));
            registry.register(Box::new(tools::SummarizeCrimeOffenses));
        }
        if configured(&CHECKBOOK) {
            registry.register(Box::new(tools::SearchCheckbookVendor));
            registry.register(Box::new(tools::SummarizeCheckbookVendors));
        }

        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo::from_tool(t.as_ref()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Print the registered tools for `odh tools list`.
pub fn list_tools(config: &Config) -> Result<()> {
    let registry = ToolRegistry::from_config(config);
    println!("{:<28} DESCRIPTION", "TOOL");
    for t in registry.tools() {
        println!("{:<28} {}", t.name(), t.description());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetConfig;

    fn dataset(id: &str) -> Option<DatasetConfig> {
        Some(DatasetConfig {
            resource_id: id.to_string(),
            paging: None,
        })
    }

    #[test]
    fn test_minimal_registry_has_only_listing() {
        let registry = ToolRegistry::from_config(&Config::minimal());
        assert_eq!(registry.len(), 1);
        assert!(registry.find("list_datasets").is_some());
        assert!(registry.find("search_building_permits").is_none());
    }

    #[test]
    fn test_registry_follows_configured_datasets() {
        let mut cfg = Config::minimal();
        cfg.datasets.crime_incidents = dataset("crime");
        cfg.datasets.checkbook = dataset("cb");
        let registry = ToolRegistry::from_config(&cfg);
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "list_datasets",
                "search_crime_incidents",
                "summarize_crime_offenses",
                "search_checkbook_vendor",
                "summarize_checkbook_vendors",
            ]
        );
    }

    #[test]
    fn test_every_schema_is_an_object() {
        let mut cfg = Config::minimal();
        cfg.datasets.building_permits = dataset("a");
        cfg.datasets.service_requests = dataset("b");
        cfg.datasets.food_violations = dataset("c");
        cfg.datasets.crime_incidents = dataset("d");
        cfg.datasets.checkbook = dataset("e");
        let registry = ToolRegistry::from_config(&cfg);
        assert_eq!(registry.len(), 8);
        for info in registry.infos() {
            assert_eq!(info.parameters["type"], "object", "{}", info.name);
        }
    }
}
