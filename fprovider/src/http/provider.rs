//! `ModelProvider` implementation over any OpenAI-compatible chat-completions endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::Client;

use crate::{
    BoxedEventStream, Message, ModelProvider, ModelRequest, ModelResponse, ProviderError,
    ProviderFuture, ProviderId, SecretString, StreamAccumulator, StreamEvent, ToolCall,
};

use super::transport::{CompletionTransport, HttpTransport, OPEN_AI_BASE_URL, OPEN_ROUTER_BASE_URL};
use super::wire::{
    ApiStreamResponse, classify_status, decode_response, encode_request, parse_finish_reason,
};

#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    id: ProviderId,
    transport: Arc<dyn CompletionTransport>,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: ProviderId, transport: Arc<dyn CompletionTransport>) -> Self {
        Self { id, transport }
    }

    /// Routed backend. `app_name` is sent as the `X-Title` attribution header.
    pub fn open_router(api_key: SecretString, app_name: Option<&str>) -> Self {
        let mut transport =
            HttpTransport::new(Client::new(), OPEN_ROUTER_BASE_URL).with_api_key(api_key);
        if let Some(app_name) = app_name.filter(|name| !name.trim().is_empty()) {
            transport = transport.with_header("X-Title", app_name);
        }

        Self::new(ProviderId::OpenRouter, Arc::new(transport))
    }

    /// Direct backend.
    pub fn open_ai(api_key: SecretString) -> Self {
        let transport = HttpTransport::new(Client::new(), OPEN_AI_BASE_URL).with_api_key(api_key);
        Self::new(ProviderId::OpenAi, Arc::new(transport))
    }
}

impl ModelProvider for OpenAiCompatibleProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelResponse, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let payload = encode_request(self.id, &request, false)?;
            tracing::debug!(
                provider = %self.id,
                model = %request.model,
                messages = request.messages.len(),
                tools = request.tools.len(),
                "posting completion request"
            );

            let raw = self.transport.post(payload).await?;
            decode_response(self.id, &request.model, raw)
        })
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let payload = encode_request(self.id, &request, true)?;
            let mut payloads = self.transport.post_stream(payload).await?;
            let provider = self.id;
            let fallback_model = request.model;

            let stream = try_stream! {
                let mut buffer = StreamAccumulator::new(provider, fallback_model.clone());
                let mut tool_calls: BTreeMap<u32, ToolCall> = BTreeMap::new();
                let mut content = String::new();
                let mut model = None::<String>;
                let mut stop_reason = None;

                while let Some(payload) = payloads.next().await {
                    let payload = payload?;
                    let chunk: ApiStreamResponse = serde_json::from_value(payload.clone())
                        .map_err(|err| {
                            ProviderError::transport(format!("malformed stream chunk: {err}"))
                        })?;

                    if let Some(error) = chunk.error {
                        let status = error
                            .code
                            .as_ref()
                            .and_then(|code| code.as_u64())
                            .and_then(|code| u16::try_from(code).ok())
                            .unwrap_or(500);
                        Err::<(), _>(classify_status(status, &payload.to_string()))?;
                    }

                    if model.is_none() {
                        model = chunk.model;
                    }

                    let Some(choice) = chunk.choices.into_iter().next() else {
                        continue;
                    };

                    if let Some(delta) = choice.delta {
                        if let Some(text) = delta.content.filter(|text| !text.is_empty()) {
                            content.push_str(&text);
                            let event = StreamEvent::TextDelta(text);
                            buffer.push(&event);
                            yield event;
                        }

                        for delta_call in delta.tool_calls.unwrap_or_default() {
                            let index = delta_call.index.unwrap_or(0);
                            let entry = tool_calls
                                .entry(index)
                                .or_insert_with(|| {
                                    ToolCall::new(format!("tool_call_{index}"), "", "")
                                });
                            if let Some(id) = delta_call.id {
                                entry.id = id;
                            }
                            if let Some(function) = delta_call.function {
                                if let Some(name) = function.name {
                                    entry.name = name;
                                }
                                if let Some(arguments) = function.arguments {
                                    entry.arguments.push_str(&arguments);
                                }
                            }

                            let event = StreamEvent::ToolCallDelta(entry.clone());
                            buffer.push(&event);
                            yield event;
                        }
                    }

                    if choice.finish_reason.is_some() {
                        stop_reason = Some(parse_finish_reason(choice.finish_reason.as_deref()));
                    }
                }

                let message = Message {
                    tool_calls: tool_calls.into_values().collect(),
                    ..Message::assistant(content)
                };
                let complete = StreamEvent::MessageComplete(message);
                buffer.push(&complete);
                yield complete;

                let mut response = buffer.finish();
                if let Some(model) = model {
                    response.model = model;
                }
                if let Some(stop_reason) = stop_reason {
                    response.stop_reason = stop_reason;
                }
                yield StreamEvent::ResponseComplete(response);
            };

            Ok(Box::pin(stream) as BoxedEventStream<'a>)
        })
    }
}
