//! Real Engineer/Analyst adapters: thin `reqwest` wrappers posting the
//! request struct as JSON and parsing the response struct back out, the
//! same "typed async wrapper over a remote contract" shape `api-client`'s
//! `BinanceClient` uses for the exchange — one layer further out, since
//! these two services are black boxes entirely out of this repository's
//! scope.
//!
//! Both bodies are deliberately identical in shape: a POST to a configured
//! base URL, a bounded per-call timeout, transport/deserialize failures
//! mapped into `StageError`. Neither retries — retrying (Engineer's own
//! internal retry budget, the orchestrator's `MAX_VALIDATION_RETRIES`) is
//! the caller's responsibility.

use std::time::Duration;

use async_trait::async_trait;

use crate::analyst::{Analyst, AnalystRequest, AnalystResponse};
use crate::engineer::{Engineer, EngineerRequest, EngineerResponse};
use crate::error::StageError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Calls an external Engineer service's `/generate` endpoint.
pub struct HttpEngineer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEngineer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to build reqwest client for HttpEngineer"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Engineer for HttpEngineer {
    async fn generate(&self, request: EngineerRequest) -> Result<EngineerResponse, StageError> {
        let url = format!("{}/generate", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| StageError::Engineer(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StageError::Engineer(format!("engineer service returned {status}: {body}")));
        }

        resp.json::<EngineerResponse>()
            .await
            .map_err(|e| StageError::Engineer(format!("malformed engineer response: {e}")))
    }
}

/// Calls an external Analyst service's `/analyze` endpoint.
pub struct HttpAnalyst {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalyst {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to build reqwest client for HttpAnalyst"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Analyst for HttpAnalyst {
    async fn analyze(&self, request: AnalystRequest) -> Result<AnalystResponse, StageError> {
        let url = format!("{}/analyze", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| StageError::Analyst(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StageError::Analyst(format!("analyst service returned {status}: {body}")));
        }

        resp.json::<AnalystResponse>()
            .await
            .map_err(|e| StageError::Analyst(format!("malformed analyst response: {e}")))
    }
}
