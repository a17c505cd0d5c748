//! Google Custom Search JSON API client.
//!
//! Returns the raw response body so the memo can persist exactly what the
//! provider sent; parsing happens in [`slangmine_core::SearchPage`].

use async_trait::async_trait;
use slangmine_core::{SearchError, SearchProvider};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://customsearch.googleapis.com/customsearch/v1";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}

impl From<ClientError> for SearchError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Http(e) => SearchError::Transport(e.to_string()),
            ClientError::Server { status, body } => SearchError::Status { status, body },
        }
    }
}

/// Client for one programmable search engine.
pub struct GoogleSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl GoogleSearch {
    pub fn new(api_key: String, engine_id: String) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT.into(), api_key, engine_id)
    }

    /// Point the client at a different (compatible) endpoint.
    pub fn with_endpoint(endpoint: String, api_key: String, engine_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            engine_id,
        }
    }

    fn request(&self, query: &str, start: u32) -> reqwest::RequestBuilder {
        let start = start.to_string();
        self.client.get(&self.endpoint).query(&[
            ("key", self.api_key.as_str()),
            ("cx", self.engine_id.as_str()),
            ("q", query),
            ("start", start.as_str()),
        ])
    }

    /// Fetch one page of results starting at 1-based rank `start`.
    pub async fn search(&self, query: &str, start: u32) -> Result<String, ClientError> {
        debug!(query, start, "searching");
        let resp = self.request(query, start).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    async fn fetch_page(&self, query: &str, start: u32) -> Result<String, SearchError> {
        Ok(self.search(query, start).await?)
    }
}
