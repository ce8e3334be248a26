//! Configuration management
//!
//! Configuration is loaded from a config.yml file, with environment
//! variables overriding file settings. Missing optional values are filled
//! with sensible defaults; platform and LLM credentials have no defaults
//! and are checked by [`Config::validate`] before a publish attempt.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Official Account platform credentials and endpoint
    #[serde(default)]
    pub wechat: WeChatConfig,
    /// Chat-completion backend used for article and alt-text generation
    #[serde(default)]
    pub llm: LlmConfig,
    /// Rendering configuration
    #[serde(default)]
    pub render: RenderConfig,
    /// Publish/polling configuration
    #[serde(default)]
    pub publish: PublishConfig,
}

/// Platform API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeChatConfig {
    /// Official Account app id
    #[serde(default)]
    pub app_id: String,
    /// Official Account app secret
    #[serde(default)]
    pub app_secret: String,
    /// API base URL
    #[serde(default = "default_wechat_base_url")]
    pub base_url: String,
}

impl Default for WeChatConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            base_url: default_wechat_base_url(),
        }
    }
}

fn default_wechat_base_url() -> String {
    "https://api.weixin.qq.com/cgi-bin".to_string()
}

/// Chat-completion backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL
    #[serde(default)]
    pub api_base: String,
    /// API key
    #[serde(default)]
    pub api_key: String,
    /// Model used for article generation
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Model used for code alt-text captions
    #[serde(default = "default_alt_text_model")]
    pub alt_text_model: String,
    /// Completion token budget per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: default_llm_model(),
            alt_text_model: default_alt_text_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_llm_model() -> String {
    "deepseek-chat".to_string()
}

fn default_alt_text_model() -> String {
    "claude-3-5-sonnet-20240620".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

/// Rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Path to a theme YAML file; the built-in theme is used when unset
    #[serde(default)]
    pub theme_file: Option<PathBuf>,
    /// Font stack folded into the theme base rules
    #[serde(default = "default_fonts")]
    pub fonts: String,
    /// Base font size folded into the theme base rules
    #[serde(default = "default_font_size")]
    pub font_size: String,
    /// Syntax-highlighting theme for code blocks
    #[serde(default = "default_code_theme")]
    pub code_theme: String,
    /// Column width code is wrapped to before image rendering
    #[serde(default = "default_code_max_width")]
    pub code_max_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            theme_file: None,
            fonts: default_fonts(),
            font_size: default_font_size(),
            code_theme: default_code_theme(),
            code_max_width: default_code_max_width(),
        }
    }
}

fn default_fonts() -> String {
    "Helvetica, Arial, sans-serif".to_string()
}

fn default_font_size() -> String {
    "16px".to_string()
}

fn default_code_theme() -> String {
    "InspiredGitHub".to_string()
}

fn default_code_max_width() -> usize {
    80
}

/// Publish/polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Seconds between publish-status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Status polls before the outcome is reported as unknown
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    /// Timeout for platform API calls
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Timeout for LLM completion calls
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            poll_max_attempts: default_poll_max_attempts(),
            http_timeout_secs: default_http_timeout_secs(),
            llm_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_poll_max_attempts() -> u32 {
    10
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_llm_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides.
    ///
    /// Environment variables follow the pattern:
    /// - INKPRESS_WECHAT_APP_ID
    /// - INKPRESS_WECHAT_APP_SECRET
    /// - INKPRESS_WECHAT_BASE_URL
    /// - INKPRESS_LLM_API_BASE
    /// - INKPRESS_LLM_API_KEY
    /// - INKPRESS_LLM_MODEL
    /// - INKPRESS_POLL_INTERVAL_SECS
    /// - INKPRESS_POLL_MAX_ATTEMPTS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(app_id) = std::env::var("INKPRESS_WECHAT_APP_ID") {
            self.wechat.app_id = app_id;
        }
        if let Ok(app_secret) = std::env::var("INKPRESS_WECHAT_APP_SECRET") {
            self.wechat.app_secret = app_secret;
        }
        if let Ok(base_url) = std::env::var("INKPRESS_WECHAT_BASE_URL") {
            self.wechat.base_url = base_url;
        }

        if let Ok(api_base) = std::env::var("INKPRESS_LLM_API_BASE") {
            self.llm.api_base = api_base;
        }
        if let Ok(api_key) = std::env::var("INKPRESS_LLM_API_KEY") {
            self.llm.api_key = api_key;
        }
        if let Ok(model) = std::env::var("INKPRESS_LLM_MODEL") {
            self.llm.model = model;
        }

        if let Ok(interval) = std::env::var("INKPRESS_POLL_INTERVAL_SECS") {
            if let Ok(interval) = interval.parse::<u64>() {
                self.publish.poll_interval_secs = interval;
            }
        }
        if let Ok(attempts) = std::env::var("INKPRESS_POLL_MAX_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse::<u32>() {
                self.publish.poll_max_attempts = attempts;
            }
        }
    }

    /// Check that the configuration can carry a publish attempt.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wechat.app_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "wechat.app_id must not be empty".to_string(),
            ));
        }
        if self.wechat.app_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "wechat.app_secret must not be empty".to_string(),
            ));
        }
        if self.publish.poll_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "publish.poll_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
