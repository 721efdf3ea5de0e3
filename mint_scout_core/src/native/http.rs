// Native HTTP client implementation using reqwest

use crate::error::CoreError;
use crate::metadata::{HttpClient, MetadataResult};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::time::Duration;

/// Native HTTP client using reqwest
pub struct NativeHttpClient {
    client: Client,
}

impl NativeHttpClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Build a client with a per-request timeout. Metadata hosts can be
    /// arbitrarily slow; the caller decides how long to wait.
    pub fn with_timeout(timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Init(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Default for NativeHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for NativeHttpClient {
    async fn fetch_text(&self, url: &str) -> MetadataResult<String> {
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::Rpc(format!("HTTP request failed: {}", e)))?;

        let text = response
            .text()
            .await
            .map_err(|e| CoreError::Rpc(format!("Failed to read response body: {}", e)))?;

        Ok(text)
    }
}
