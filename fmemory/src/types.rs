//! Persisted history records.

use std::time::SystemTime;

use fchat::Turn;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Roles a persisted message may carry. Function-call turns stay in the
/// live transcript and are never written to history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRole {
    System,
    User,
    Assistant,
}

impl HistoryRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Result<Self, MemoryError> {
        match value {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(MemoryError::storage(format!(
                "unknown history role value '{value}'"
            ))),
        }
    }

    /// Role of a text turn, `None` for function-call turns.
    pub fn of_turn(turn: &Turn) -> Option<Self> {
        match turn {
            Turn::System { .. } => Some(Self::System),
            Turn::User { .. } => Some(Self::User),
            Turn::Assistant { .. } => Some(Self::Assistant),
            Turn::ToolCall { .. } | Turn::ToolResult { .. } => None,
        }
    }
}

/// One stored message belonging to an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub role: HistoryRole,
    pub content: String,
    /// Tokens the content costs under the store's tokenizer.
    pub token_cost: i64,
    pub created_at: SystemTime,
    /// Insertion order, used to break `created_at` ties.
    pub sequence: u64,
}

impl PersistedMessage {
    pub fn new(
        role: HistoryRole,
        content: impl Into<String>,
        token_cost: i64,
        created_at: SystemTime,
        sequence: u64,
    ) -> Self {
        Self {
            role,
            content: content.into(),
            token_cost,
            created_at,
            sequence,
        }
    }

    pub fn to_turn(&self) -> Turn {
        match self.role {
            HistoryRole::System => Turn::system(self.content.clone()),
            HistoryRole::User => Turn::user(self.content.clone()),
            HistoryRole::Assistant => Turn::assistant(self.content.clone()),
        }
    }
}
