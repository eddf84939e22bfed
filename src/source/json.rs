use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::{FetchError, ReadingSource};
use crate::config::{LocalJsonConfig, RemoteJsonConfig};
use crate::reading::{JsonLayout, Reading};

/// JSON document fetched over HTTP on every cycle.
pub struct RemoteJsonSource {
    http: Client,
    url: String,
    layout: JsonLayout,
}

impl RemoteJsonSource {
    pub fn new(config: &RemoteJsonConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            url: config.url.clone(),
            layout: config.layout.clone(),
        })
    }
}

#[async_trait]
impl ReadingSource for RemoteJsonSource {
    fn describe(&self) -> String {
        format!("json:{}", self.url)
    }

    async fn fetch(&mut self) -> Result<Reading, FetchError> {
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        debug!(bytes = body.len(), url = %self.url, "Fetched JSON document");
        self.layout.parse_str(&body)
    }
}

/// JSON document re-read from disk on every cycle.
pub struct LocalJsonSource {
    path: PathBuf,
    layout: JsonLayout,
}

impl LocalJsonSource {
    pub fn new(config: &LocalJsonConfig) -> Self {
        Self {
            path: config.path.clone(),
            layout: config.layout.clone(),
        }
    }
}

#[async_trait]
impl ReadingSource for LocalJsonSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn fetch(&mut self) -> Result<Reading, FetchError> {
        let body = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FetchError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.layout.parse_str(&body)
    }
}
