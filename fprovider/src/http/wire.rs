//! Chat-completions wire payloads and conversions to the backend-agnostic model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use fcommon::RequestParameters;

use crate::{
    Message, ModelRequest, ModelResponse, OutputItem, ProviderError, ProviderId, Role, StopReason,
    TokenUsage, ToolCall,
};

#[derive(Debug, Serialize)]
pub(crate) struct ApiRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(flatten)]
    pub parameters: RequestParameters,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiMessage {
    pub role: &'static str,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ApiToolCall>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiToolCall {
    pub id: String,
    pub r#type: &'static str,
    pub function: ApiFunctionCall,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiFunctionCall {
    pub name: String,
    pub arguments: String,
}

impl From<&Message> for ApiMessage {
    fn from(message: &Message) -> Self {
        let content = if message.content.is_empty() && !message.tool_calls.is_empty() {
            None
        } else {
            Some(message.content.clone())
        };

        Self {
            role: message.role.as_str(),
            content,
            name: message.name.clone(),
            tool_call_id: message.tool_call_id.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| ApiToolCall {
                    id: call.id.clone(),
                    r#type: "function",
                    function: ApiFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect(),
        }
    }
}

/// Knobs only the routed backend understands.
fn strip_routing_parameters(parameters: &mut RequestParameters) {
    parameters.provider = None;
    parameters.transforms = None;
    parameters.route = None;
    parameters.top_k = None;
    parameters.min_p = None;
    parameters.top_a = None;
    parameters.repetition_penalty = None;
}

pub(crate) fn build_api_request(
    provider: ProviderId,
    request: &ModelRequest,
    stream: bool,
) -> ApiRequest {
    let mut parameters = request.parameters.clone().without_blanks();
    parameters.model = None;
    parameters.stream = None;
    if provider == ProviderId::OpenAi {
        strip_routing_parameters(&mut parameters);
    }

    ApiRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(ApiMessage::from).collect(),
        tools: request
            .tools
            .iter()
            .map(|tool| tool.to_declaration())
            .collect(),
        parameters,
        stream,
    }
}

pub(crate) fn encode_request(
    provider: ProviderId,
    request: &ModelRequest,
    stream: bool,
) -> Result<Value, ProviderError> {
    serde_json::to_value(build_api_request(provider, request, stream))
        .map_err(|err| ProviderError::invalid_request(format!("failed to encode request: {err}")))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ApiChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiChoice {
    #[serde(default)]
    pub message: Option<ApiResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ApiResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponseToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub function: ApiResponseFunction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponseFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiStreamResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ApiStreamChoice>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiStreamChoice {
    #[serde(default)]
    pub delta: Option<ApiDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ApiDeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDeltaToolCall {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<ApiDeltaFunction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDeltaFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

pub(crate) fn parse_finish_reason(value: Option<&str>) -> StopReason {
    match value {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls") | Some("function_call") => StopReason::ToolUse,
        Some("cancelled") => StopReason::Cancelled,
        _ => StopReason::Other,
    }
}

fn arguments_to_string(arguments: Option<Value>) -> String {
    match arguments {
        Some(Value::String(text)) => text,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn error_status(error: &ApiError) -> u16 {
    match &error.code {
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .unwrap_or(500),
        Some(Value::String(text)) => text.parse().unwrap_or(500),
        _ => 500,
    }
}

/// Decodes a successful body. An embedded `error` object is reported as a
/// failure even when the transport status was 200.
pub(crate) fn decode_response(
    provider: ProviderId,
    fallback_model: &str,
    raw: Value,
) -> Result<ModelResponse, ProviderError> {
    let parsed: ApiResponse = serde_json::from_value(raw.clone())
        .map_err(|err| ProviderError::transport(format!("malformed response body: {err}")))?;

    if let Some(error) = parsed.error.as_ref() {
        return Err(classify_status(error_status(error), &raw.to_string()));
    }

    let mut output = Vec::new();
    let mut stop_reason = StopReason::Other;

    if let Some(choice) = parsed.choices.into_iter().next() {
        stop_reason = parse_finish_reason(choice.finish_reason.as_deref());
        if let Some(message) = choice.message {
            if let Some(content) = message.content.filter(|text| !text.is_empty()) {
                output.push(OutputItem::Message(Message::new(Role::Assistant, content)));
            }
            for call in message.tool_calls.unwrap_or_default() {
                output.push(OutputItem::ToolCall(ToolCall::new(
                    call.id.unwrap_or_default(),
                    call.function.name,
                    arguments_to_string(call.function.arguments),
                )));
            }
        }
    }

    let usage = parsed
        .usage
        .map(|usage| TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })
        .unwrap_or_default();

    Ok(ModelResponse {
        provider,
        model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
        output,
        stop_reason,
        usage,
        raw: Some(raw),
    })
}

pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message).filter(|message| !message.is_empty())
}

/// Maps a failed status and body to an error. 5xx and 429 are retryable,
/// other 4xx are not unless the body asks for a retry.
pub fn classify_status(status: u16, body: &str) -> ProviderError {
    let message = extract_error_message(body)
        .unwrap_or_else(|| format!("backend request failed with status {status}"));

    let error = match status {
        401 | 403 => ProviderError::authentication(message),
        429 => ProviderError::rate_limited(message),
        408 | 504 => ProviderError::timeout(message),
        502 | 503 => ProviderError::unavailable(message),
        500..=599 => ProviderError::server(status, message),
        400..=499 => ProviderError::invalid_request(message),
        _ => ProviderError::other(message),
    };

    error.with_status(status).with_body(body).honor_retry_hint()
}
