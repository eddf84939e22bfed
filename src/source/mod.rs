pub mod json;
pub mod page;

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config::SourceConfig;
use crate::reading::Reading;
use json::{LocalJsonSource, RemoteJsonSource};
use page::PageSource;

/// Why a cycle produced no reading. Always recoverable: the cycle is skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GET {url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed document: {0}")]
    Parse(String),
    #[error("field `{0}` missing from document")]
    MissingField(String),
    #[error("field `{field}` holds no usable number: {found}")]
    InvalidValue { field: String, found: String },
    #[error("{what} timed out after {after:?}")]
    Timeout { what: &'static str, after: Duration },
    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),
}

/// Anything that can produce the current risk reading.
#[async_trait]
pub trait ReadingSource: Send {
    /// Short human-readable label used in logs.
    fn describe(&self) -> String;

    async fn fetch(&mut self) -> Result<Reading, FetchError>;

    /// Release held resources (browser process, etc). Called once on shutdown.
    async fn close(&mut self) {}
}

/// The configured data source.
pub enum DataSource {
    Page(PageSource),
    RemoteJson(RemoteJsonSource),
    LocalJson(LocalJsonSource),
}

impl DataSource {
    pub async fn from_config(config: &SourceConfig) -> Result<Self> {
        Ok(match config {
            SourceConfig::Page(c) => DataSource::Page(PageSource::launch(c).await?),
            SourceConfig::RemoteJson(c) => DataSource::RemoteJson(RemoteJsonSource::new(c)?),
            SourceConfig::LocalJson(c) => DataSource::LocalJson(LocalJsonSource::new(c)),
        })
    }
}

#[async_trait]
impl ReadingSource for DataSource {
    fn describe(&self) -> String {
        match self {
            DataSource::Page(s) => s.describe(),
            DataSource::RemoteJson(s) => s.describe(),
            DataSource::LocalJson(s) => s.describe(),
        }
    }

    async fn fetch(&mut self) -> Result<Reading, FetchError> {
        match self {
            DataSource::Page(s) => s.fetch().await,
            DataSource::RemoteJson(s) => s.fetch().await,
            DataSource::LocalJson(s) => s.fetch().await,
        }
    }

    async fn close(&mut self) {
        match self {
            DataSource::Page(s) => s.close().await,
            DataSource::RemoteJson(s) => s.close().await,
            DataSource::LocalJson(s) => s.close().await,
        }
    }
}
