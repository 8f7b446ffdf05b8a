use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::error::ApiError;

#[derive(Serialize, Debug)]
struct SearchRequest<'a> {
    query: &'a str,
}

/// A funding opportunity as returned by the search API.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Grant {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub eligibility: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub link: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    grants: Option<Vec<Grant>>,
    #[serde(default)]
    pub is_help: bool,
}

impl SearchResponse {
    #[cfg(test)]
    pub fn new(success: bool, message: &str, grants: Vec<Grant>, is_help: bool) -> Self {
        Self {
            success,
            message: Some(message.to_string()),
            grants: Some(grants),
            is_help,
        }
    }

    /// Grants in response order; `null` or a missing field reads as empty.
    pub fn grants(&self) -> &[Grant] {
        self.grants.as_deref().unwrap_or(&[])
    }

    pub fn into_grants(self) -> Vec<Grant> {
        self.grants.unwrap_or_default()
    }
}

#[derive(Deserialize, Debug)]
struct GrantsResponse {
    #[allow(dead_code)]
    success: bool,
    #[serde(default)]
    grants: Vec<Grant>,
}

#[derive(Deserialize, Debug)]
struct CategoriesResponse {
    #[allow(dead_code)]
    success: bool,
    #[serde(default)]
    categories: Vec<String>,
}

/// Empty strings and `null` both mean "not provided".
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Anything that can answer a search query. The TUI holds one of these behind
/// an `Arc` so tests can swap the HTTP client for a canned backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, ApiError>;
}

#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    base_url: String,
}

impl SearchClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// List every grant the server knows about.
    pub async fn list_grants(&self) -> Result<Vec<Grant>, ApiError> {
        let response = self.client.get(self.url("grants")).send().await?;
        let body: GrantsResponse = decode(response).await?;
        Ok(body.grants)
    }

    pub async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let response = self.client.get(self.url("categories")).send().await?;
        let body: CategoriesResponse = decode(response).await?;
        Ok(body.categories)
    }
}

#[async_trait]
impl SearchBackend for SearchClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, ApiError> {
        let url = self.url("search");
        info!(%url, query, "sending search request");

        let response = self
            .client
            .post(&url)
            .json(&SearchRequest { query })
            .send()
            .await?;

        let body: SearchResponse = decode(response).await?;
        info!(
            success = body.success,
            grants = body.grants().len(),
            is_help = body.is_help,
            "search response received"
        );
        Ok(body)
    }
}

/// Decode a JSON body whatever the status: the API reports its own failures
/// as `success: false` payloads on 4xx/5xx responses.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        warn!(%status, "search API returned a non-success status");
    }

    let text = response.text().await?;
    debug!(bytes = text.len(), "response body read");
    serde_json::from_str(&text).map_err(|source| ApiError::Decode { status, source })
}
