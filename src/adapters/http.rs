//! Provider HTTP Fetcher - Shared REST Client for Source Adapters
//!
//! Wraps reqwest with a per-request timeout, a browser-like user
//! agent and uniform error mapping. Every source adapter goes through
//! this client, so transport failures always surface as
//! `SourceUnavailable` and undecodable bodies as `ParseFailure`.
//! No retries here: retrying is the resolver's job, by moving on to
//! the next source.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::ReportError;

/// Shared HTTP client for all providers.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// Underlying HTTP client.
    http: Client,
}

impl HttpFetcher {
    /// Build a client with the given timeout and user agent.
    ///
    /// # Errors
    /// Fails only when the TLS backend cannot be initialized.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http })
    }

    /// GET `url` and decode the body as JSON.
    ///
    /// # Errors
    /// `SourceUnavailable` on transport or status errors, `ParseFailure`
    /// when the body is not the expected JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        source: &str,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<T, ReportError> {
        let body = self.get_text(source, url, headers).await?;
        decode(source, &body)
    }

    /// GET `url` and return the body as text.
    ///
    /// # Errors
    /// `SourceUnavailable` on transport or status errors.
    pub async fn get_text(
        &self,
        source: &str,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<String, ReportError> {
        let mut request = self.http.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        self.execute(source, request).await
    }

    /// POST a JSON body to `url` and decode the JSON response.
    ///
    /// # Errors
    /// Same mapping as `get_json`.
    pub async fn post_json<B, T>(&self, source: &str, url: &str, body: &B) -> Result<T, ReportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(url).json(body);
        let text = self.execute(source, request).await?;
        decode(source, &text)
    }

    /// Send and read the body. Errors drop the URL, which may carry a key.
    async fn execute(&self, source: &str, request: RequestBuilder) -> Result<String, ReportError> {
        let response = request
            .send()
            .await
            .map_err(|e| ReportError::unavailable(source, e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::unavailable(source, format!("HTTP {status}")));
        }

        let text = response.text().await.map_err(|e| {
            ReportError::unavailable(source, format!("body read failed: {}", e.without_url()))
        })?;

        debug!(source, status = status.as_u16(), bytes = text.len(), "Provider response");
        Ok(text)
    }
}

/// Decode JSON text, mapping failures to `ParseFailure`.
///
/// # Errors
/// `ParseFailure` naming `source`.
pub fn decode<T: DeserializeOwned>(source: &str, body: &str) -> Result<T, ReportError> {
    serde_json::from_str(body).map_err(|e| ReportError::parse(source, e.to_string()))
}
