//! API client for communicating with the mixing backend.

mod gateway;
mod inputs;
mod library;
mod mixers;
mod outputs;
mod players;
mod playlists;

pub use gateway::{DeleteTarget, SeedSource, WriteGateway};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, trace};

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// API client errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Network error
    #[error("Network error: {0}")]
    Network(String),
    /// HTTP error with status code
    #[error("HTTP {0} error: {1}")]
    Http(u16, String),
    /// Deserialization error
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether the backend reported the addressed entity as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Http(404, _))
    }
}

/// Client for the backend REST API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    /// Optional auth token for Bearer authentication
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::new_with_auth(base_url, None)
    }

    /// Create a new API client with authentication token.
    pub fn new_with_auth(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            auth_token,
        }
    }

    /// Helper to add auth header to a request builder
    pub(super) fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref token) = self.auth_token {
            builder.header("Authorization", format!("Bearer {}", token))
        } else {
            builder
        }
    }

    /// Get the base URL for the API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and map transport and status failures.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> ApiResult<reqwest::Response> {
        let response = self.with_auth(builder).send().await.map_err(|e| {
            error!("Network error {}: {}", what, e);
            ApiError::Network(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            error!("HTTP error {} {}: {}", status, what, text);
            return Err(ApiError::Http(status, text));
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> ApiResult<T> {
        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse response {}: {}", what, e);
            ApiError::Decode(e.to_string())
        })
    }

    pub(super) async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> ApiResult<T> {
        let url = self.url(path);
        trace!("GET {}", url);
        let response = self.send(self.client.get(&url), what).await?;
        Self::decode(response, what).await
    }

    pub(super) async fn post_json<B, T>(&self, path: &str, body: &B, what: &str) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        trace!("POST {}", url);
        let response = self.send(self.client.post(&url).json(body), what).await?;
        Self::decode(response, what).await
    }

    /// POST without a body, decoding the response.
    pub(super) async fn post_empty<T: DeserializeOwned>(&self, path: &str, what: &str) -> ApiResult<T> {
        let url = self.url(path);
        trace!("POST {}", url);
        let response = self.send(self.client.post(&url), what).await?;
        Self::decode(response, what).await
    }

    pub(super) async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> ApiResult<()> {
        let url = self.url(path);
        trace!("PUT {}", url);
        self.send(self.client.put(&url).json(body), what).await?;
        Ok(())
    }

    pub(super) async fn delete_path(&self, path: &str, what: &str) -> ApiResult<()> {
        let url = self.url(path);
        trace!("DELETE {}", url);
        self.send(self.client.delete(&url), what).await?;
        Ok(())
    }

    /// DELETE carrying a JSON body, for endpoints keyed by body fields.
    pub(super) async fn delete_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        what: &str,
    ) -> ApiResult<()> {
        let url = self.url(path);
        trace!("DELETE {}", url);
        self.send(self.client.delete(&url).json(body), what).await?;
        Ok(())
    }
}
