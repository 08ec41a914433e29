//! Configuration types for chatterm.
//!
//! This module defines the configuration schema: which endpoint the chat
//! transport talks to and how the terminal widget sizes its input box.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configured endpoint.
pub const ENDPOINT_ENV: &str = "CHATTERM_ENDPOINT";

/// Main configuration for chatterm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Scheme and host of the chat server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the streaming chat endpoint.
    #[serde(default = "default_api")]
    pub api: String,

    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Connect timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Widget settings.
    #[serde(default)]
    pub ui: UiConfig,
}

fn default_base_url() -> String {
    "http://localhost:3000".into()
}

fn default_api() -> String {
    "/api/chat".into()
}

fn default_request_timeout() -> u64 {
    30
}

/// Settings for the terminal widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Rows the input box never shrinks below.
    #[serde(default = "default_min_input_rows")]
    pub min_input_rows: u16,

    /// Rows the input box never grows beyond; longer drafts scroll inside it.
    #[serde(default = "default_max_input_rows")]
    pub max_input_rows: u16,

    /// Event loop tick in milliseconds (drives smooth scrolling).
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,

    /// Placeholder shown in the empty input box.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Color palette.
    #[serde(default)]
    pub theme: ThemeName,
}

/// Named color palettes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeName {
    /// Catppuccin Mocha (dark).
    #[default]
    Mocha,
    /// Catppuccin Latte (light).
    Latte,
    /// Plain high-contrast colors.
    HighContrast,
}

fn default_min_input_rows() -> u16 {
    2
}

fn default_max_input_rows() -> u16 {
    10
}

fn default_tick_rate_ms() -> u64 {
    50
}

fn default_placeholder() -> String {
    "Type your message...".into()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            min_input_rows: default_min_input_rows(),
            max_input_rows: default_max_input_rows(),
            tick_rate_ms: default_tick_rate_ms(),
            placeholder: default_placeholder(),
            theme: ThemeName::default(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api: default_api(),
            headers: BTreeMap::new(),
            request_timeout_secs: default_request_timeout(),
            ui: UiConfig::default(),
        }
    }
}

impl ChatConfig {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: Self = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        std::fs::write(path, content).map_err(ConfigError::Io)
    }

    /// Default config file location (`<config dir>/chatterm/config.json`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatterm").join("config.json"))
    }

    /// Apply an endpoint override of the form `http://host[:port][/path][?query]`.
    ///
    /// The origin always replaces `base_url`. A non-root path replaces `api`;
    /// a query string is kept on `api`.
    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<(), ConfigError> {
        let url = parse_http_url(endpoint.trim())?;
        self.base_url = url.origin().ascii_serialization();

        let path = url.path().trim_end_matches('/');
        let path = if path.is_empty() {
            self.api.split('?').next().unwrap_or_default().to_string()
        } else {
            path.to_string()
        };
        self.api = match url.query() {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };
        Ok(())
    }

    /// Apply overrides from the environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        match std::env::var(ENDPOINT_ENV) {
            Ok(endpoint) if !endpoint.trim().is_empty() => self.set_endpoint(&endpoint),
            _ => Ok(()),
        }
    }

    /// Full URL of the chat endpoint.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.api.starts_with('/') {
            format!("{base}{}", self.api)
        } else {
            format!("{base}/{}", self.api)
        }
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_http_url(&self.endpoint())?;
        if self.ui.min_input_rows == 0 {
            return Err(ConfigError::Invalid("ui.min_input_rows must be at least 1".into()));
        }
        if self.ui.max_input_rows < self.ui.min_input_rows {
            return Err(ConfigError::Invalid(
                "ui.max_input_rows must not be smaller than ui.min_input_rows".into(),
            ));
        }
        if self.ui.tick_rate_ms == 0 {
            return Err(ConfigError::Invalid("ui.tick_rate_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Parse an absolute `http`/`https` URL.
fn parse_http_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid(format!("endpoint {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "endpoint {raw:?}: scheme must be http or https"
        )));
    }
    Ok(url)
}

/// Errors that can occur when working with configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading or writing config.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing config JSON.
    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    /// Error serializing config to JSON.
    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}
