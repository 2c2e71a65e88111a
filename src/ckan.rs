//! HTTP client for CKAN's `datastore_search` action.
//!
//! [`CkanClient`] is the production [`Datastore`]: each call is one GET to
//! `[datastore].base_url` with the request encoded as query parameters.
//! Transport problems, non-2xx statuses and `success: false` envelopes all
//! surface as [`RemoteError`]; nothing is retried here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use opendata_harness_core::datastore::{
    failure_reason, Datastore, DatastoreRequest, DatastoreResponse, Envelope,
};
use opendata_harness_core::error::RemoteError;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

use crate::config::DatastoreConfig;

/// Longest slice of an unparsable error body echoed back in a reason.
const MAX_REASON_LEN: usize = 200;

pub struct CkanClient {
    client: reqwest::Client,
    base_url: Url,
}

impl CkanClient {
    pub fn new(config: &DatastoreConfig) -> Result<Self> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("odh/{}", env!("CARGO_PKG_VERSION")));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid datastore.base_url: {}", config.base_url))?;

        Ok(Self { client, base_url })
    }

    /// Full URL for one page request.
    pub fn request_url(&self, request: &DatastoreRequest) -> Result<Url, RemoteError> {
        Url::parse_with_params(self.base_url.as_str(), request.query_pairs())
            .map_err(|e| RemoteError::Transport(format!("invalid request URL: {}", e)))
    }
}

#[async_trait]
impl Datastore for CkanClient {
    async fn query(&self, request: &DatastoreRequest) -> Result<DatastoreResponse, RemoteError> {
        let url = self.request_url(request)?;
        debug!(
            resource = %request.resource_id,
            limit = request.limit,
            offset = request.offset,
            "datastore request"
        );

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                reason: status_reason(status, &body),
            });
        }

        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|e| RemoteError::Malformed(format!("invalid response body: {}", e)))?;
        envelope.into_response()
    }
}

/// CKAN usually wraps errors in an envelope even on 4xx/5xx; prefer its
/// message, then the body text, then the canonical status text.
fn status_reason(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<Envelope>(body) {
        if envelope.error.is_some() {
            return failure_reason(envelope.error.as_ref());
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.chars().take(MAX_REASON_LEN).collect();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendata_harness_core::models::QueryDescriptor;

    fn client() -> CkanClient {
        CkanClient::new(&DatastoreConfig {
            base_url: "https://data.example.org/api/3/action/datastore_search".to_string(),
            page_size: 100,
            concurrency: 7,
            timeout_secs: 5,
            user_agent: None,
        })
        .unwrap()
    }

    #[test]
    fn test_request_url_encodes_query() {
        let d = QueryDescriptor::new("res-1")
            .with_phrase("100 Main St")
            .with_filter("case_status", "Open");
        let url = client()
            .request_url(&DatastoreRequest::page(&d, 100, 200))
            .unwrap();

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(url.path(), "/api/3/action/datastore_search");
        assert!(pairs.contains(&("resource_id".to_string(), "res-1".to_string())));
        assert!(pairs.contains(&("q".to_string(), "100 Main St".to_string())));
        assert!(pairs.contains(&(
            "filters".to_string(),
            r#"{"case_status":"Open"}"#.to_string()
        )));
        assert!(pairs.contains(&("offset".to_string(), "200".to_string())));
    }

    #[test]
    fn test_status_reason_prefers_envelope_message() {
        let body = r#"{"success": false, "error": {"message": "Resource not found"}}"#;
        assert_eq!(
            status_reason(reqwest::StatusCode::NOT_FOUND, body),
            "Resource not found"
        );
    }

    #[test]
    fn test_status_reason_falls_back_to_canonical() {
        assert_eq!(
            status_reason(reqwest::StatusCode::BAD_GATEWAY, ""),
            "Bad Gateway"
        );
    }

    #[test]
    fn test_rejects_unparsable_base_url() {
        let result = CkanClient::new(&DatastoreConfig {
            base_url: "not a url".to_string(),
            page_size: 100,
            concurrency: 7,
            timeout_secs: 5,
            user_agent: None,
        });
        assert!(result.is_err());
    }
}
