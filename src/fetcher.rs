//! HTTP fetcher: one bounded GET, parsed JSON or a typed failure.
//!
//! Adapters never see a `reqwest` error or a panic: every outcome is
//! either a decoded JSON body or a [`FetchError`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a fetch did not yield a JSON body.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("response body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Source of JSON documents addressed by URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError>;
}

/// The production fetcher, backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("infrawatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(FetchError::from_reqwest)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// In-memory fetcher for tests: canned bodies per URL, every call recorded.
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct ScriptedFetcher {
        bodies: HashMap<String, Value>,
        statuses: HashMap<String, u16>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_body(mut self, url: &str, body: Value) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }

        pub fn with_status(mut self, url: &str, status: u16) -> Self {
            self.statuses.insert(url.to_string(), status);
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            if let Some(status) = self.statuses.get(url) {
                return Err(FetchError::Status(*status));
            }
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Transport(format!("connection refused: {url}")))
        }
    }
}
