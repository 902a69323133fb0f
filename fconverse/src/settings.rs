//! Layered settings: an optional TOML file, then `FCONVERSE__*` environment
//! variables (`__` separates nested keys, e.g.
//! `FCONVERSE__DEFAULTS__TEMPERATURE=0.4`).
//!
//! ```rust
//! use fconverse::Settings;
//!
//! let settings = Settings::from_toml(
//!     r#"
//!     [defaults]
//!     model = "openai/gpt-4o-mini"
//!     max_tokens = 256
//!     "#,
//! )
//! .expect("settings parse");
//!
//! let defaults = settings.chat_defaults();
//! assert_eq!(defaults.model, "openai/gpt-4o-mini");
//! assert_eq!(defaults.max_tokens, 256);
//! assert_eq!(defaults.temperature, 0.0);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use fchat::{
    ChatDefaults, DEFAULT_BLANK_RETRY_ATTEMPTS, DEFAULT_HISTORY_MAX_TOKENS, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
use fmemory::HistoryStoreConfig;
use fprovider::{RetryPolicy, SecretString};
use serde::Deserialize;

use crate::error::SetupError;

pub const ENV_PREFIX: &str = "FCONVERSE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub defaults: DefaultsSettings,
    pub openrouter: EndpointSettings,
    pub openai: EndpointSettings,
    pub history: HistorySettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DefaultsSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history_max_tokens: i64,
    pub blank_retry_attempts: u32,
    pub max_function_rounds: Option<u32>,
}

impl Default for DefaultsSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            history_max_tokens: DEFAULT_HISTORY_MAX_TOKENS,
            blank_retry_attempts: DEFAULT_BLANK_RETRY_ATTEMPTS,
            max_function_rounds: None,
        }
    }
}

/// Connection details for one backend binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Attribution sent to routed backends.
    pub app_name: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl EndpointSettings {
    /// Configured key, else the conventional environment variable.
    pub fn api_key_or_env(&self, env_name: &str) -> Option<SecretString> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::new)
            .or_else(|| SecretString::from_env(env_name))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(90))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub backend: HistoryBackend,
    /// Overrides the default sqlite location.
    pub sqlite_path: Option<PathBuf>,
}

impl HistorySettings {
    pub fn store_config(&self) -> HistoryStoreConfig {
        match (self.backend, &self.sqlite_path) {
            (HistoryBackend::Memory, _) => HistoryStoreConfig::InMemory,
            (HistoryBackend::Sqlite, Some(path)) => {
                HistoryStoreConfig::Sqlite { path: path.clone() }
            }
            (HistoryBackend::Sqlite, None) => HistoryStoreConfig::default(),
        }
    }
}

impl Settings {
    /// Loads `path` when given (missing files are skipped), then applies
    /// `FCONVERSE__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SetupError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn from_toml(text: &str) -> Result<Self, SetupError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn chat_defaults(&self) -> ChatDefaults {
        let defaults = &self.defaults;
        let mut chat_defaults = ChatDefaults::default()
            .with_model(defaults.model.clone())
            .with_temperature(defaults.temperature)
            .with_max_tokens(defaults.max_tokens)
            .with_history_max_tokens(defaults.history_max_tokens)
            .with_blank_retry(RetryPolicy::linear(
                defaults.blank_retry_attempts.max(1),
                Duration::from_secs(1),
            ));
        if let Some(rounds) = defaults.max_function_rounds {
            chat_defaults = chat_defaults.with_max_function_rounds(rounds);
        }
        chat_defaults
    }
}
