use anyhow::Context;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::types::*;

/// Must exceed the getUpdates long-poll timeout.
const REQUEST_TIMEOUT_SECS: u64 = 50;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} request failed: {source}")]
    Transport {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} rejected ({code}): {description}")]
    Rejected {
        method: &'static str,
        code: i64,
        description: String,
    },
    #[error("{method} returned ok without a result")]
    MissingResult { method: &'static str },
}

/// Thin Bot API client. `base_url` already carries the `/bot<token>` segment.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, token: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    pub fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &'static str,
        body: &B,
    ) -> Result<T, ApiError> {
        let transport = |source: reqwest::Error| ApiError::Transport { method, source };

        // Error statuses still carry the JSON envelope with a description.
        let resp = self
            .http
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        let envelope: ApiResponse<T> = resp.json().await.map_err(transport)?;

        if !envelope.ok {
            return Err(ApiError::Rejected {
                method,
                code: envelope.error_code.unwrap_or(status.as_u16() as i64),
                description: envelope.description.unwrap_or_default(),
            });
        }
        debug!(method, "Telegram call succeeded");
        envelope.result.ok_or(ApiError::MissingResult { method })
    }

    /// Verify the token; returns the bot's own account.
    pub async fn get_me(&self) -> Result<User, ApiError> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<Message, ApiError> {
        let req = SendMessageRequest {
            chat_id,
            text,
            parse_mode,
        };
        self.call("sendMessage", &req).await
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ApiError> {
        let req = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
        };
        self.call("getUpdates", &req).await
    }
}
