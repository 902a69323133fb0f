//! Process-wide completion defaults.
//!
//! ```rust
//! use fchat::{ChatDefaults, DEFAULT_MODEL};
//!
//! let defaults = ChatDefaults::default();
//! let params = defaults.parameters();
//! assert_eq!(params.model.as_deref(), Some(DEFAULT_MODEL));
//! assert_eq!(params.temperature, Some(0.0));
//! assert_eq!(params.max_tokens, Some(1000));
//! ```

use std::time::Duration;

use fcommon::RequestParameters;
use fprovider::RetryPolicy;

pub const DEFAULT_MODEL: &str = "meta-llama/llama-3-8b-instruct:free";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_HISTORY_MAX_TOKENS: i64 = 8000;

/// Attempts made when a structured completion comes back blank.
pub const DEFAULT_BLANK_RETRY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatDefaults {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Token budget for seeding a transcript from persisted history.
    pub history_max_tokens: i64,
    pub blank_retry: RetryPolicy,
    /// Cap on function-call rounds per completion. `None` is unbounded.
    pub max_function_rounds: Option<u32>,
}

impl Default for ChatDefaults {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            history_max_tokens: DEFAULT_HISTORY_MAX_TOKENS,
            blank_retry: RetryPolicy::linear(DEFAULT_BLANK_RETRY_ATTEMPTS, Duration::from_secs(1)),
            max_function_rounds: None,
        }
    }
}

impl ChatDefaults {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_history_max_tokens(mut self, history_max_tokens: i64) -> Self {
        self.history_max_tokens = history_max_tokens;
        self
    }

    pub fn with_blank_retry(mut self, blank_retry: RetryPolicy) -> Self {
        self.blank_retry = blank_retry;
        self
    }

    pub fn with_max_function_rounds(mut self, rounds: u32) -> Self {
        self.max_function_rounds = Some(rounds);
        self
    }

    /// The bottom parameter layer.
    pub fn parameters(&self) -> RequestParameters {
        RequestParameters::default()
            .with_model(self.model.clone())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_constants() {
        let defaults = ChatDefaults::default();
        assert_eq!(defaults.model, DEFAULT_MODEL);
        assert_eq!(defaults.history_max_tokens, 8000);
        assert_eq!(defaults.blank_retry.max_attempts, 3);
        assert_eq!(defaults.max_function_rounds, None);
    }

    #[test]
    fn builder_overrides_flow_into_parameters() {
        let params = ChatDefaults::default()
            .with_model("openai/gpt-4o-mini")
            .with_temperature(0.7)
            .with_max_tokens(64)
            .parameters();

        assert_eq!(params.model.as_deref(), Some("openai/gpt-4o-mini"));
        assert_eq!(params.temperature, Some(0.7));
        assert_eq!(params.max_tokens, Some(64));
    }
}
