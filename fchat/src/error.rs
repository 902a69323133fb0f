//! Orchestration errors and classification.

use std::error::Error;
use std::fmt::{Display, Formatter};

use fprovider::ProviderError;
use ftooling::{ToolError, ToolErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// A completion was requested with no turns to send.
    EmptyTranscript,
    NoPromptsDefined,
    /// The backend asked for a function but the session declares none.
    NoFunctionsDefined,
    UnknownFunction,
    /// Retryable backend failure that outlasted the retry policy.
    TransientBackend,
    BlankStructuredResponse,
    MalformedStructuredResponse,
    /// Non-retryable backend failure.
    BackendRequest,
    InvalidRequest,
    Tooling,
    Store,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    /// HTTP status of the underlying backend failure, when known.
    pub status: Option<u16>,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn empty_transcript() -> Self {
        Self::new(
            ChatErrorKind::EmptyTranscript,
            "cannot complete an empty transcript",
        )
    }

    pub fn no_prompts_defined() -> Self {
        Self::new(ChatErrorKind::NoPromptsDefined, "no prompts defined")
    }

    pub fn no_functions_defined(name: &str) -> Self {
        Self::new(
            ChatErrorKind::NoFunctionsDefined,
            format!("backend requested function '{name}' but no functions are defined"),
        )
    }

    pub fn unknown_function(name: &str) -> Self {
        Self::new(
            ChatErrorKind::UnknownFunction,
            format!("function '{name}' is not declared"),
        )
    }

    pub fn blank_structured_response(attempts: u32) -> Self {
        Self::new(
            ChatErrorKind::BlankStructuredResponse,
            format!("structured response was blank after {attempts} attempts"),
        )
    }

    pub fn malformed_structured_response(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::MalformedStructuredResponse, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn tooling(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Tooling, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Store, message)
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ChatError {}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        let kind = if value.retryable {
            ChatErrorKind::TransientBackend
        } else {
            ChatErrorKind::BackendRequest
        };

        ChatError::new(kind, value.to_string()).with_status(value.status)
    }
}

impl From<ToolError> for ChatError {
    fn from(value: ToolError) -> Self {
        let kind = match value.kind {
            ToolErrorKind::NotFound => ChatErrorKind::UnknownFunction,
            _ => ChatErrorKind::Tooling,
        };

        ChatError::new(kind, value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_split_on_retryability() {
        let transient = ChatError::from(ProviderError::server(503, "overloaded"));
        assert_eq!(transient.kind, ChatErrorKind::TransientBackend);
        assert_eq!(transient.status, Some(503));

        let fatal = ChatError::from(ProviderError::invalid_request("bad key").with_status(400));
        assert_eq!(fatal.kind, ChatErrorKind::BackendRequest);
        assert_eq!(fatal.status, Some(400));
    }

    #[test]
    fn tool_not_found_maps_to_unknown_function() {
        let error = ChatError::from(ToolError::not_found("missing"));
        assert_eq!(error.kind, ChatErrorKind::UnknownFunction);

        let error = ChatError::from(ToolError::execution("boom"));
        assert_eq!(error.kind, ChatErrorKind::Tooling);
    }
}
