//! Backend-agnostic request, response, and wire message model types.
//!
//! ```rust
//! use fprovider::{Message, ModelRequest, ProviderErrorKind};
//!
//! let ok = ModelRequest::builder("openai/gpt-4o")
//!     .message(Message::user("Summarize this diff"))
//!     .build();
//! assert!(ok.is_ok());
//!
//! let err = ModelRequest::builder("openai/gpt-4o")
//!     .build()
//!     .err()
//!     .expect("a request without messages should fail");
//! assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
//! ```

use std::fmt::{Display, Formatter};

use fcommon::{MetadataMap, RequestParameters};
use serde_json::{Map, Value, json};

use crate::ProviderError;

/// Identifies one of the two completion backend bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProviderId {
    /// Routed backend used unless a call selects otherwise.
    #[default]
    OpenRouter,
    /// Direct backend that talks to the model vendor without routing.
    OpenAi,
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let id = match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
        };

        f.write_str(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// One message in the shape the backend consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub name: Option<String>,
    pub tool_call_id: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Assistant message that carries a structured tool invocation instead of text.
    pub fn tool_call(call: ToolCall) -> Self {
        Self {
            tool_calls: vec![call],
            ..Self::new(Role::Assistant, "")
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }
}

/// Tool declaration advertised to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Renders the `{type: "function", function: {...}}` declaration.
    pub fn to_declaration(&self) -> Value {
        let mut function = Map::new();
        function.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(description) = self.description.as_ref().filter(|text| !text.is_empty()) {
            function.insert(
                "description".to_string(),
                Value::String(description.clone()),
            );
        }
        function.insert("parameters".to_string(), self.parameters.clone());

        json!({
            "type": "function",
            "function": Value::Object(function),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputItem {
    Message(Message),
    ToolCall(ToolCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    Cancelled,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub provider: ProviderId,
    pub model: String,
    pub output: Vec<OutputItem>,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
    /// Full decoded payload as received from the backend.
    pub raw: Option<Value>,
}

impl ModelResponse {
    /// Concatenated assistant text across all message items.
    pub fn text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message(message) if message.role == Role::Assistant => {
                    Some(message.content.as_str())
                }
                _ => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.output.iter().filter_map(|item| match item {
            OutputItem::ToolCall(call) => Some(call),
            OutputItem::Message(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    /// Resolved sampling knobs. `parameters.model` is ignored in favour of `model`.
    pub parameters: RequestParameters,
    pub metadata: MetadataMap,
}

impl ModelRequest {
    pub fn builder(model: impl Into<String>) -> ModelRequestBuilder {
        ModelRequestBuilder::new(model)
    }

    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            parameters: RequestParameters::default(),
            metadata: MetadataMap::new(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.parameters.stream.unwrap_or(false)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.model.trim().is_empty() {
            return Err(ProviderError::invalid_request("model must not be empty"));
        }

        if self.messages.is_empty() {
            return Err(ProviderError::invalid_request(
                "at least one message is required",
            ));
        }

        if let Some(max_tokens) = self.parameters.max_tokens
            && max_tokens == 0
        {
            return Err(ProviderError::invalid_request(
                "max_tokens must be greater than zero",
            ));
        }

        if let Some(temperature) = self.parameters.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ProviderError::invalid_request(
                "temperature must be in the inclusive range 0.0..=2.0",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequestBuilder {
    model: String,
    messages: Vec<Message>,
    tools: Vec<ToolDefinition>,
    parameters: RequestParameters,
    metadata: MetadataMap,
}

impl ModelRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            tools: Vec::new(),
            parameters: RequestParameters::default(),
            metadata: MetadataMap::new(),
        }
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(mut self, messages: impl IntoIterator<Item = Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn parameters(mut self, parameters: RequestParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<ModelRequest, ProviderError> {
        let request = ModelRequest {
            model: self.model,
            messages: self.messages,
            tools: self.tools,
            parameters: self.parameters,
            metadata: self.metadata,
        };
        request.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorKind;

    #[test]
    fn provider_id_display_is_stable() {
        assert_eq!(ProviderId::OpenRouter.to_string(), "openrouter");
        assert_eq!(ProviderId::OpenAi.to_string(), "openai");
        assert_eq!(ProviderId::default(), ProviderId::OpenRouter);
    }

    #[test]
    fn validate_enforces_request_contract() {
        let empty_model = ModelRequest::new("   ", vec![Message::user("hi")]);
        let err = empty_model.validate().expect_err("empty model must fail");
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);

        let empty_messages = ModelRequest::new("gpt", Vec::new());
        assert!(empty_messages.validate().is_err());

        let bad_temperature = ModelRequest::builder("gpt")
            .message(Message::user("hi"))
            .parameters(RequestParameters::default().with_temperature(2.5))
            .build();
        assert!(bad_temperature.is_err());

        let bad_max_tokens = ModelRequest::builder("gpt")
            .message(Message::user("hi"))
            .parameters(RequestParameters::default().with_max_tokens(0))
            .build();
        assert!(bad_max_tokens.is_err());

        let valid = ModelRequest::builder("gpt")
            .message(Message::user("hi"))
            .parameters(
                RequestParameters::default()
                    .with_temperature(0.4)
                    .enable_streaming(),
            )
            .metadata("session_id", "abc")
            .build()
            .expect("valid request");
        assert!(valid.is_streaming());
        assert_eq!(valid.metadata.get("session_id"), Some(&"abc".to_string()));
    }

    #[test]
    fn tool_messages_carry_linkage_fields() {
        let call = Message::tool_call(ToolCall::new("call_1", "lookup", "{}"));
        assert_eq!(call.role, Role::Assistant);
        assert_eq!(call.tool_calls.len(), 1);
        assert!(call.content.is_empty());

        let result = Message::tool_result("call_1", "lookup", "42");
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(result.name.as_deref(), Some("lookup"));
    }

    #[test]
    fn tool_definition_renders_function_declaration() {
        let definition = ToolDefinition {
            name: "check_weather".to_string(),
            description: None,
            parameters: json!({"type": "object", "properties": {}}),
        };

        assert_eq!(
            definition.to_declaration(),
            json!({
                "type": "function",
                "function": {
                    "name": "check_weather",
                    "parameters": {"type": "object", "properties": {}}
                }
            })
        );
    }

    #[test]
    fn response_text_joins_assistant_messages_and_lists_tool_calls() {
        let response = ModelResponse {
            provider: ProviderId::OpenRouter,
            model: "m".to_string(),
            output: vec![
                OutputItem::Message(Message::assistant("hello ")),
                OutputItem::ToolCall(ToolCall::new("c1", "lookup", "{}")),
                OutputItem::Message(Message::assistant("world")),
            ],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
            raw: None,
        };

        assert_eq!(response.text(), "hello world");
        assert_eq!(response.tool_calls().count(), 1);
    }
}
