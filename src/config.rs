//! TOML configuration.
//!
//! Loaded once at startup and shared as `Arc<Config>`. Dataset sections are
//! optional: a dataset without a section simply has no tools registered.
//!
//! ```toml
//! [datastore]
//! base_url = "https://data.boston.gov/api/3/action/datastore_search"
//! page_size = 100
//! concurrency = 7
//! timeout_secs = 30
//!
//! [server]
//! bind = "127.0.0.1:7331"
//!
//! [datasets.building_permits]
//! resource_id = "..."
//!
//! [datasets.food_violations]
//! resource_id = "..."
//! paging = "short_page"
//! ```

use anyhow::{Context, Result};
use opendata_harness_core::models::PagingPolicy;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub datastore: DatastoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub datasets: DatasetsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatastoreConfig {
    /// Full URL of the `datastore_search` action.
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_page_size() -> u64 {
    100
}
fn default_concurrency() -> usize {
    7
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatasetsConfig {
    pub building_permits: Option<DatasetConfig>,
    pub service_requests: Option<DatasetConfig>,
    pub food_violations: Option<DatasetConfig>,
    pub crime_incidents: Option<DatasetConfig>,
    pub checkbook: Option<DatasetConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    /// CKAN resource id of the table.
    pub resource_id: String,
    /// Overrides the dataset's default paging policy.
    #[serde(default)]
    pub paging: Option<PagingPolicy>,
}

impl DatasetsConfig {
    /// `(name, config)` for every configured dataset, in a fixed order.
    pub fn configured(&self) -> Vec<(&'static str, &DatasetConfig)> {
        [
            ("building_permits", &self.building_permits),
            ("service_requests", &self.service_requests),
            ("food_violations", &self.food_violations),
            ("crime_incidents", &self.crime_incidents),
            ("checkbook", &self.checkbook),
        ]
        .into_iter()
        .filter_map(|(name, cfg)| cfg.as_ref().map(|c| (name, c)))
        .collect()
    }
}

impl Config {
    /// Datastore defaults and no datasets. Used by commands that can run
    /// without a config file.
    pub fn minimal() -> Self {
        Self {
            datastore: DatastoreConfig {
                base_url: "https://data.boston.gov/api/3/action/datastore_search".to_string(),
                page_size: default_page_size(),
                concurrency: default_concurrency(),
                timeout_secs: default_timeout_secs(),
                user_agent: None,
            },
            server: ServerConfig::default(),
            datasets: DatasetsConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check invariants `serde` cannot express.
pub fn validate(config: &Config) -> Result<()> {
    let ds = &config.datastore;
    if ds.page_size == 0 {
        anyhow::bail!("datastore.page_size must be > 0");
    }
    if ds.concurrency == 0 {
        anyhow::bail!("datastore.concurrency must be > 0");
    }
    if ds.timeout_secs == 0 {
        anyhow::bail!("datastore.timeout_secs must be > 0");
    }
    if !(ds.base_url.starts_with("http://") || ds.base_url.starts_with("https://")) {
        anyhow::bail!(
            "datastore.base_url must be an http(s) URL, got '{}'",
            ds.base_url
        );
    }

    for (name, dataset) in config.datasets.configured() {
        if dataset.resource_id.trim().is_empty() {
            anyhow::bail!("datasets.{}.resource_id must not be empty", name);
        }
    }

    Ok(())
}
