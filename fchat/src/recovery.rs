//! Repair strategies for structured output that failed to parse.
//!
//! ```rust
//! use fchat::{FenceStrippingRecovery, JsonRecovery};
//!
//! let content = "```json\n{\"ok\": true}\n```";
//! let error = serde_json::from_str::<serde_json::Value>(content).unwrap_err();
//! let value = FenceStrippingRecovery.recover(content, &error).expect("recovered");
//! assert_eq!(value["ok"], true);
//! ```

use serde_json::Value;

use crate::ChatError;

pub trait JsonRecovery: Send + Sync {
    fn recover(&self, content: &str, error: &serde_json::Error) -> Result<Value, ChatError>;
}

/// Strips markdown fences, then falls back to the outermost `{...}` or `[...]` span.
#[derive(Debug, Default, Clone, Copy)]
pub struct FenceStrippingRecovery;

impl JsonRecovery for FenceStrippingRecovery {
    fn recover(&self, content: &str, error: &serde_json::Error) -> Result<Value, ChatError> {
        let unfenced = strip_fences(content);
        if let Ok(value) = serde_json::from_str(unfenced) {
            return Ok(value);
        }

        if let Some(span) = outer_json_span(unfenced)
            && let Ok(value) = serde_json::from_str(span)
        {
            return Ok(value);
        }

        Err(ChatError::malformed_structured_response(format!(
            "could not recover JSON: {error}"
        )))
    }
}

/// Never repairs anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictJsonRecovery;

impl JsonRecovery for StrictJsonRecovery {
    fn recover(&self, _content: &str, error: &serde_json::Error) -> Result<Value, ChatError> {
        Err(ChatError::malformed_structured_response(error.to_string()))
    }
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn outer_json_span(content: &str) -> Option<&str> {
    let start = content.find(['{', '['])?;
    let close = if content[start..].starts_with('{') { '}' } else { ']' };
    let end = content.rfind(close)?;
    (end > start).then(|| &content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatErrorKind;

    fn parse_error(content: &str) -> serde_json::Error {
        serde_json::from_str::<Value>(content).expect_err("content should not parse")
    }

    #[test]
    fn strips_fences_without_language_tag() {
        let content = "```\n[1, 2]\n```";
        let value = FenceStrippingRecovery
            .recover(content, &parse_error(content))
            .expect("recovered");
        assert_eq!(value, serde_json::json!([1, 2]));
    }

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let content = "Sure! Here it is: {\"answer\": 42} Hope that helps.";
        let value = FenceStrippingRecovery
            .recover(content, &parse_error(content))
            .expect("recovered");
        assert_eq!(value["answer"], 42);
    }

    #[test]
    fn unrecoverable_content_is_malformed() {
        let content = "no json here";
        let error = FenceStrippingRecovery
            .recover(content, &parse_error(content))
            .expect_err("must fail");
        assert_eq!(error.kind, ChatErrorKind::MalformedStructuredResponse);
    }

    #[test]
    fn strict_recovery_always_fails() {
        let content = "```json\n{}\n```";
        let error = StrictJsonRecovery
            .recover(content, &parse_error(content))
            .expect_err("strict never repairs");
        assert_eq!(error.kind, ChatErrorKind::MalformedStructuredResponse);
    }
}
