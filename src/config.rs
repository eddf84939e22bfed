use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::reading::JsonLayout;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36";

#[derive(Debug)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub chat_id: String,
    pub monitor: MonitorConfig,
    pub source: SourceConfig,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_first_delay_secs")]
    pub first_delay_secs: u64,
}

fn default_interval_secs() -> u64 { 30 }
fn default_first_delay_secs() -> u64 { 1 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            first_delay_secs: default_first_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Page(PageConfig),
    RemoteJson(RemoteJsonConfig),
    LocalJson(LocalJsonConfig),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_page_url")]
    pub url: String,
    #[serde(default = "default_selector")]
    pub selector: String,
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
    #[serde(default = "default_value_timeout_secs")]
    pub value_timeout_secs: u64,
}

fn default_page_url() -> String { "https://usstrikeradar.com/".to_string() }
fn default_selector() -> String { "#gaugeValue".to_string() }
fn default_placeholder() -> String { "--".to_string() }
fn default_user_agent() -> String { DESKTOP_USER_AGENT.to_string() }
fn default_navigation_timeout_secs() -> u64 { 30 }
fn default_value_timeout_secs() -> u64 { 20 }

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            url: default_page_url(),
            selector: default_selector(),
            placeholder: default_placeholder(),
            user_agent: default_user_agent(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            value_timeout_secs: default_value_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteJsonConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub layout: JsonLayout,
}

fn default_http_timeout_secs() -> u64 { 15 }

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LocalJsonConfig {
    #[serde(default)]
    pub path: PathBuf,
    #[serde(flatten)]
    pub layout: JsonLayout,
}

/// Shape of the optional TOML file.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    monitor: MonitorConfig,
    source: Option<SourceConfig>,
}

impl Config {
    /// Load `.env`, the optional TOML file, then apply environment overrides.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let path = std::env::var("RISK_WATCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let file = read_optional(&path)?;
        Self::resolve(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build the config from TOML text (if any) and an environment lookup.
    pub fn resolve(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let file: FileConfig = match file {
            Some(text) => toml::from_str(text).context("Failed to parse config file")?,
            None => FileConfig::default(),
        };

        let telegram = TelegramConfig::resolve(&env)?;
        let chat_id = env("CHAT_ID").context("CHAT_ID not set in environment or .env")?;

        let mut monitor = file.monitor;
        if let Some(raw) = env("CHECK_INTERVAL") {
            monitor.interval_secs = raw
                .parse()
                .with_context(|| format!("CHECK_INTERVAL is not a whole number of seconds: {:?}", raw))?;
        }
        if monitor.interval_secs == 0 {
            bail!("poll interval must be at least 1 second");
        }

        let mut source = file
            .source
            .unwrap_or_else(|| SourceConfig::Page(PageConfig::default()));
        if let Some(kind) = env("DATA_SOURCE") {
            source = source.switch_kind(&kind)?;
        }
        if let Some(url) = env("DATA_URL") {
            match &mut source {
                SourceConfig::Page(c) => c.url = url,
                SourceConfig::RemoteJson(c) => c.url = url,
                SourceConfig::LocalJson(_) => bail!("DATA_URL has no meaning for a local_json source"),
            }
        }
        if let Some(path) = env("DATA_FILE") {
            match &mut source {
                SourceConfig::LocalJson(c) => c.path = PathBuf::from(path),
                _ => bail!("DATA_FILE is only used by a local_json source"),
            }
        }
        source.validate()?;

        Ok(Self {
            telegram,
            chat_id,
            monitor,
            source,
        })
    }
}

impl TelegramConfig {
    /// Bot credentials only; used by tools that have no destination chat.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::resolve(&|key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
    }

    fn resolve(env: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = env("BOT_TOKEN").context("BOT_TOKEN not set in environment or .env")?;
        let api_base = env("API_LOCAL_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self { token, api_base })
    }
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Page(_) => "page",
            SourceConfig::RemoteJson(_) => "remote_json",
            SourceConfig::LocalJson(_) => "local_json",
        }
    }

    /// Keep the current settings when the kind is unchanged, else start from defaults.
    fn switch_kind(self, kind: &str) -> Result<Self> {
        let kind = kind.to_ascii_lowercase();
        if kind == self.kind() {
            return Ok(self);
        }
        Ok(match kind.as_str() {
            "page" => SourceConfig::Page(PageConfig::default()),
            "remote_json" => SourceConfig::RemoteJson(RemoteJsonConfig {
                timeout_secs: default_http_timeout_secs(),
                ..Default::default()
            }),
            "local_json" => SourceConfig::LocalJson(LocalJsonConfig::default()),
            other => bail!(
                "Unknown DATA_SOURCE {:?} (expected page, remote_json or local_json)",
                other
            ),
        })
    }

    fn validate(&self) -> Result<()> {
        match self {
            SourceConfig::Page(c) => {
                if c.url.is_empty() || c.selector.is_empty() {
                    bail!("page source needs both a url and a selector");
                }
            }
            SourceConfig::RemoteJson(c) => {
                if c.url.is_empty() {
                    bail!("remote_json source needs DATA_URL or source.url");
                }
                if c.timeout_secs == 0 {
                    bail!("remote_json timeout must be at least 1 second");
                }
            }
            SourceConfig::LocalJson(c) => {
                if c.path.as_os_str().is_empty() {
                    bail!("local_json source needs DATA_FILE or source.path");
                }
            }
        }
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}
