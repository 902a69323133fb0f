//! Conversation turns and the append-only transcript that owns them.
//!
//! ```rust
//! use fchat::{Transcript, Turn};
//!
//! let mut transcript = Transcript::new();
//! transcript.push(Turn::system("You are a pumpkin")).expect("system turn");
//! transcript.push(Turn::user("Hey what time is it?")).expect("user turn");
//!
//! let call = Turn::tool_call("check_time", "{}");
//! let call_id = call.call_id().expect("tool calls carry an id").to_string();
//! transcript.push(call).expect("tool call");
//! transcript
//!     .push(Turn::tool_result(call_id, "check_time", "midnight"))
//!     .expect("paired result");
//!
//! assert_eq!(transcript.len(), 4);
//! ```

use std::collections::HashSet;

use fcommon::new_call_id;
use fprovider::{Message, Role, ToolCall};
use serde::{Deserialize, Serialize};

use crate::ChatError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    ToolCall {
        name: String,
        arguments_json: String,
        call_id: String,
    },
    ToolResult {
        call_id: String,
        name: String,
        content: String,
    },
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    /// Tool call with a freshly generated call id.
    pub fn tool_call(name: impl Into<String>, arguments_json: impl Into<String>) -> Self {
        Self::ToolCall {
            name: name.into(),
            arguments_json: arguments_json.into(),
            call_id: new_call_id(),
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } | Self::ToolCall { .. } => Role::Assistant,
            Self::ToolResult { .. } => Role::Tool,
        }
    }

    /// Text body of the turn. Tool calls have none.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content }
            | Self::ToolResult { content, .. } => Some(content),
            Self::ToolCall { .. } => None,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        match self {
            Self::ToolCall { call_id, .. } | Self::ToolResult { call_id, .. } => Some(call_id),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Self::System { .. } | Self::User { .. } | Self::Assistant { .. }
        )
    }

    /// Wire form of the turn.
    pub fn to_message(&self) -> Message {
        match self {
            Self::System { content } => Message::system(content.clone()),
            Self::User { content } => Message::user(content.clone()),
            Self::Assistant { content } => Message::assistant(content.clone()),
            Self::ToolCall {
                name,
                arguments_json,
                call_id,
            } => Message::tool_call(ToolCall::new(
                call_id.clone(),
                name.clone(),
                arguments_json.clone(),
            )),
            Self::ToolResult {
                call_id,
                name,
                content,
            } => Message::tool_result(call_id.clone(), name.clone(), content.clone()),
        }
    }
}

/// Ordered, append-only turn list.
///
/// Every `ToolResult` must answer exactly one earlier `ToolCall` with the same
/// call id; `push` rejects anything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
    open_calls: HashSet<String>,
    answered_calls: HashSet<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a transcript from existing turns, validating pairing as it goes.
    pub fn from_turns(turns: impl IntoIterator<Item = Turn>) -> Result<Self, ChatError> {
        let mut transcript = Self::new();
        for turn in turns {
            transcript.push(turn)?;
        }
        Ok(transcript)
    }

    pub fn push(&mut self, turn: Turn) -> Result<(), ChatError> {
        match &turn {
            Turn::ToolCall { call_id, .. } => {
                if self.open_calls.contains(call_id) || self.answered_calls.contains(call_id) {
                    return Err(ChatError::invalid_request(format!(
                        "tool call id '{call_id}' is already in the transcript"
                    )));
                }
                self.open_calls.insert(call_id.clone());
            }
            Turn::ToolResult { call_id, .. } => {
                if !self.open_calls.remove(call_id) {
                    return Err(ChatError::invalid_request(format!(
                        "tool result '{call_id}' does not answer an open tool call"
                    )));
                }
                self.answered_calls.insert(call_id.clone());
            }
            _ => {}
        }

        self.turns.push(turn);
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn to_messages(&self) -> Vec<Message> {
        self.turns.iter().map(Turn::to_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatErrorKind;

    #[test]
    fn appends_preserve_order() {
        let mut transcript = Transcript::new();
        transcript.push(Turn::user("one")).expect("push");
        transcript.push(Turn::assistant("two")).expect("push");
        transcript.push(Turn::user("three")).expect("push");

        let contents = transcript
            .iter()
            .filter_map(Turn::content)
            .collect::<Vec<_>>();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn tool_result_without_call_is_rejected() {
        let mut transcript = Transcript::new();
        let error = transcript
            .push(Turn::tool_result("call_x", "f", "out"))
            .expect_err("orphan result must fail");

        assert_eq!(error.kind, ChatErrorKind::InvalidRequest);
        assert!(transcript.is_empty());
    }

    #[test]
    fn each_call_is_answered_at_most_once() {
        let mut transcript = Transcript::new();
        transcript
            .push(Turn::ToolCall {
                name: "f".to_string(),
                arguments_json: "{}".to_string(),
                call_id: "call_1".to_string(),
            })
            .expect("call");
        transcript
            .push(Turn::tool_result("call_1", "f", "first"))
            .expect("first answer");

        assert!(transcript.push(Turn::tool_result("call_1", "f", "again")).is_err());
        assert!(
            transcript
                .push(Turn::ToolCall {
                    name: "f".to_string(),
                    arguments_json: "{}".to_string(),
                    call_id: "call_1".to_string(),
                })
                .is_err()
        );
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn turns_convert_to_wire_messages() {
        let call = Turn::ToolCall {
            name: "check_weather".to_string(),
            arguments_json: "{\"location\":\"Paris\"}".to_string(),
            call_id: "call_9".to_string(),
        };
        let message = call.to_message();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.tool_calls[0].id, "call_9");

        let result = Turn::tool_result("call_9", "check_weather", "sunny").to_message();
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("call_9"));
    }

    #[test]
    fn from_turns_validates_pairing() {
        let turns = vec![Turn::user("hi"), Turn::tool_result("nope", "f", "x")];
        assert!(Transcript::from_turns(turns).is_err());
    }

    #[test]
    fn turns_serialize_with_role_tag() {
        let rendered = serde_json::to_value(Turn::user("hello")).expect("serialize");
        assert_eq!(rendered, serde_json::json!({"role": "user", "content": "hello"}));
    }
}
