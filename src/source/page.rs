use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::{FetchError, ReadingSource};
use crate::config::PageConfig;
use crate::reading::{extract_digits, Reading};

/// How often the selector is re-read while it still shows the placeholder.
const VALUE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Reads the gauge text from a JS-rendered page in headless Chromium.
/// The browser is launched once; every fetch runs in its own incognito
/// context so no cookies, cache or storage survive between checks.
pub struct PageSource {
    browser: Browser,
    handler: JoinHandle<()>,
    config: PageConfig,
}

impl PageSource {
    pub async fn launch(config: &PageConfig) -> Result<Self> {
        let browser_config = BrowserConfig::builder()
            .build()
            .map_err(|e| anyhow!("Invalid browser config: {}", e))?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch headless browser")?;

        // The CDP connection only makes progress while its handler is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler error");
                }
            }
        });

        info!(url = %config.url, selector = %config.selector, "Headless browser launched");
        Ok(Self {
            browser,
            handler,
            config: config.clone(),
        })
    }

    async fn scrape(&mut self) -> Result<String, FetchError> {
        let context_id = self
            .browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await?;

        let result = match self
            .browser
            .new_page(blank_page_in(context_id.clone()))
            .await
        {
            Ok(page) => {
                let result = self.read_gauge(&page).await;
                if let Err(e) = page.close().await {
                    warn!(error = %e, "Failed to close page");
                }
                result
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = self.browser.dispose_browser_context(context_id).await {
            warn!(error = %e, "Failed to dispose incognito context");
        }
        result
    }

    async fn read_gauge(&self, page: &Page) -> Result<String, FetchError> {
        page.set_user_agent(user_agent_override(&self.config.user_agent))
            .await?;

        let nav_timeout = Duration::from_secs(self.config.navigation_timeout_secs);
        timeout(nav_timeout, async {
            page.goto(self.config.url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<_, FetchError>(())
        })
        .await
        .map_err(|_| FetchError::Timeout {
            what: "page navigation",
            after: nav_timeout,
        })??;

        let value_timeout = Duration::from_secs(self.config.value_timeout_secs);
        timeout(value_timeout, self.wait_for_value(page))
            .await
            .map_err(|_| FetchError::Timeout {
                what: "gauge value",
                after: value_timeout,
            })
    }

    /// Poll the selector until its text differs from the placeholder. Only
    /// the surrounding timeout ends the wait.
    async fn wait_for_value(&self, page: &Page) -> String {
        loop {
            // The element may not exist yet, or be detached by a re-render.
            if let Ok(element) = page.find_element(self.config.selector.as_str()).await {
                if let Some(text) = settled_text(element.inner_text().await, &self.config.placeholder) {
                    return text;
                }
            }
            sleep(VALUE_POLL_INTERVAL).await;
        }
    }
}

fn blank_page_in(context_id: BrowserContextId) -> CreateTargetParams {
    let mut params = CreateTargetParams::new("about:blank");
    params.browser_context_id = Some(context_id);
    params
}

fn user_agent_override(user_agent: &str) -> SetUserAgentOverrideParams {
    SetUserAgentOverrideParams::new(user_agent.to_string())
}

/// The trimmed text once it holds a real value; None keeps polling.
fn settled_text<E>(read: Result<Option<String>, E>, placeholder: &str) -> Option<String> {
    let text = read.ok()??;
    let text = text.trim();
    if text.is_empty() || text == placeholder {
        None
    } else {
        Some(text.to_string())
    }
}

#[async_trait]
impl ReadingSource for PageSource {
    fn describe(&self) -> String {
        format!("page:{}{}", self.config.url, self.config.selector)
    }

    async fn fetch(&mut self) -> Result<Reading, FetchError> {
        let raw = self.scrape().await?;
        debug!(raw = %raw, "Scraped gauge text");
        extract_digits(&raw)
            .map(Reading::new)
            .ok_or_else(|| FetchError::InvalidValue {
                field: self.config.selector.clone(),
                found: raw,
            })
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Failed to close browser");
        }
        self.handler.abort();
        info!("Headless browser closed");
    }
}
