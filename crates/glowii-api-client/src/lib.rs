//! HTTP client for the Glowii enhancement service.
//!
//! Provides a minimal client with generic GET/POST/DELETE helpers and the domain methods
//! (upload, enhance, describe, search, background generation, health, cleanup). The workflow
//! crate talks to the service through the [`EnhancementService`] trait, which [`ApiClient`]
//! implements.

pub mod api;
pub mod service;

use anyhow::{Context, Result};
use glowii_core::ClientConfig;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client for the enhancement service
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.api_base_url.clone(), config.request_timeout())
    }

    /// Create client from environment: GLOWII_API_URL (or API_URL), GLOWII_REQUEST_TIMEOUT_SECS.
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env().context("Failed to load client configuration")?;
        Self::from_config(&config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.build_url(path);
        let mut request = self.client.get(&url);

        if !query.is_empty() {
            request = request.query(query);
        }

        let response = request.send().await.context("Failed to send request")?;
        parse_json(ensure_success(response).await?).await
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        parse_json(ensure_success(response).await?).await
    }

    /// POST without a body; parameters travel in the query string.
    pub async fn post_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.build_url(path);
        let response = self
            .client
            .post(&url)
            .query(query)
            .send()
            .await
            .context("Failed to send request")?;

        parse_json(ensure_success(response).await?).await
    }

    /// POST multipart form and deserialize response.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T> {
        let url = self.build_url(path);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Failed to send request")?;

        parse_json(ensure_success(response).await?).await
    }

    /// DELETE request. Returns Ok(()) on success.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let url = self.build_url(path);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .context("Failed to send request")?;

        ensure_success(response).await?;
        Ok(())
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow::anyhow!(
            "API request failed with status {}: {}",
            status,
            error_text
        ));
    }
    Ok(response)
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .context("Failed to parse response as JSON")
}

// Re-export domain response types for convenience.
pub use api::{
    DescribeResponse, EnhanceRequest, EnhanceResponse, GeneratedBackground, HealthStatus,
    ProductCopy, SearchResponse, SearchResult, UploadResponse,
};
pub use service::EnhancementService;
