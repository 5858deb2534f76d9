use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NotifierError, Result};
use crate::types::ChannelId;
use crate::{DEFAULT_SLACK_CHANNEL, SLACK_API_BASE, YOUTUBE_API_BASE};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable holding the Slack bot token.
pub const SLACK_TOKEN_VAR: &str = "SLACK_API_TOKEN";

/// Environment variable holding the YouTube Data API key.
pub const YOUTUBE_KEY_VAR: &str = "YOUTUBE_API_KEY";

/// Ceiling for `units_per_call`; no Data API v3 method costs more.
const MAX_UNITS_PER_CALL: u64 = 1_600;

/// Optional override for the destination chat channel.
pub const SLACK_CHANNEL_VAR: &str = "SLACK_CHANNEL";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub watch: WatchConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// What to watch and where to announce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Channels polled in this order on every sweep.
    pub channel_ids: Vec<ChannelId>,
    #[serde(default = "default_slack_channel")]
    pub slack_channel: String,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Pause after each channel's search, in seconds.
    #[serde(default = "default_short_delay")]
    pub channel_delay_secs: u64,
    /// Pause before each detail lookup, in seconds.
    #[serde(default = "default_short_delay")]
    pub detail_delay_secs: u64,
    /// Pause between sweeps, in seconds. Ignored when `quota_daily_units` is set.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Daily API unit budget; when present the sweep pause is derived from it.
    #[serde(default)]
    pub quota_daily_units: Option<u64>,
    #[serde(default = "default_units_per_call")]
    pub units_per_call: u64,
    /// Append-only file of announced event ids. In-memory only when absent.
    #[serde(default)]
    pub seen_store: Option<PathBuf>,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_youtube_api_base")]
    pub youtube_api_base: String,
    #[serde(default = "default_slack_api_base")]
    pub slack_api_base: String,
}

fn default_slack_channel() -> String {
    DEFAULT_SLACK_CHANNEL.to_string()
}

fn default_short_delay() -> u64 {
    1
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_units_per_call() -> u64 {
    3
}

fn default_http_timeout() -> u64 {
    30
}

fn default_youtube_api_base() -> String {
    YOUTUBE_API_BASE.to_string()
}

fn default_slack_api_base() -> String {
    SLACK_API_BASE.to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            channel_delay_secs: default_short_delay(),
            detail_delay_secs: default_short_delay(),
            sweep_interval_secs: default_sweep_interval(),
            quota_daily_units: None,
            units_per_call: default_units_per_call(),
            seen_store: None,
            http_timeout_secs: default_http_timeout(),
            youtube_api_base: default_youtube_api_base(),
            slack_api_base: default_slack_api_base(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NotifierError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&contents).map_err(|e| match e {
            NotifierError::Config(msg) => {
                NotifierError::config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parse and validate config text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| NotifierError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.watch.channel_ids.is_empty() {
            return Err(NotifierError::config("watch.channel_ids must not be empty"));
        }
        if self.watch.channel_ids.iter().any(|c| c.as_str().trim().is_empty()) {
            return Err(NotifierError::config("watch.channel_ids contains a blank id"));
        }
        if self.settings.quota_daily_units == Some(0) {
            return Err(NotifierError::config("settings.quota_daily_units must be positive"));
        }
        if !(1..=MAX_UNITS_PER_CALL).contains(&self.settings.units_per_call) {
            return Err(NotifierError::config(format!(
                "settings.units_per_call must be between 1 and {MAX_UNITS_PER_CALL}"
            )));
        }
        Ok(())
    }

    /// Destination channel, with `SLACK_CHANNEL` taking precedence over the file.
    pub fn slack_channel(&self) -> String {
        self.slack_channel_with(|k| std::env::var(k).ok())
    }

    fn slack_channel_with(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        lookup(SLACK_CHANNEL_VAR)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| self.watch.slack_channel.clone())
    }
}

/// Secrets read from the environment once at startup.
#[derive(Clone)]
pub struct Credentials {
    pub slack_token: String,
    pub youtube_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("slack_token", &"<redacted>")
            .field("youtube_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read both credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Read both credentials through `lookup`. A missing or blank value is a
    /// config error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| NotifierError::config(format!("{name} must be set")))
        };
        Ok(Self {
            slack_token: require(SLACK_TOKEN_VAR)?,
            youtube_api_key: require(YOUTUBE_KEY_VAR)?,
        })
    }
}
