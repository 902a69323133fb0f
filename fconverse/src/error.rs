//! Errors raised while assembling a runtime from settings.

use std::error::Error;
use std::fmt::{Display, Formatter};

use fmemory::MemoryError;
use fprovider::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupErrorKind {
    /// Settings could not be read or deserialized.
    Configuration,
    Provider,
    History,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupError {
    pub kind: SetupErrorKind,
    pub message: String,
}

impl SetupError {
    pub fn new(kind: SetupErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(SetupErrorKind::Configuration, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(SetupErrorKind::Provider, message)
    }

    pub fn history(message: impl Into<String>) -> Self {
        Self::new(SetupErrorKind::History, message)
    }
}

impl Display for SetupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for SetupError {}

impl From<config::ConfigError> for SetupError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}

impl From<ProviderError> for SetupError {
    fn from(error: ProviderError) -> Self {
        Self::provider(error.to_string())
    }
}

impl From<MemoryError> for SetupError {
    fn from(error: MemoryError) -> Self {
        Self::history(error.to_string())
    }
}
