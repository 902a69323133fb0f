//! Sends assembled requests to a backend binding and classifies the reply.
//!
//! Transient backend failures are retried under the provider's
//! [`RetryPolicy`]; blank structured replies are retried under the
//! dispatcher's own blank policy.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use fcommon::{BoxFuture, RequestParameters};
use fprovider::{
    ModelProvider, ModelRequest, ModelResponse, NoopOperationHooks, ProviderError, ProviderId,
    ProviderOperationHooks, ProviderRegistry, RetryPolicy, StreamAccumulator, StreamEvent,
    ToolCall, execute_with_retry,
};
use futures_timer::Delay;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{ChatDefaults, ChatError, FenceStrippingRecovery, JsonRecovery, ResponseMode};

/// Awaited between attempts. Swapped out in tests to observe backoff.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TimerSleeper;

impl Sleeper for TimerSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(Delay::new(duration))
    }
}

/// Receives text deltas as they stream in.
pub type TextSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-call knobs for one completion.
#[derive(Clone, Default)]
pub struct CompletionOptions {
    pub provider: ProviderId,
    pub mode: ResponseMode,
    /// Return the full backend response instead of extracted content.
    pub raw: bool,
    /// Re-request after each function call until the backend answers with text.
    pub loop_until_text: bool,
    /// Overrides `ChatDefaults::max_function_rounds` when set.
    pub max_function_rounds: Option<u32>,
    /// Call-site parameter layer.
    pub params: RequestParameters,
    pub stream: Option<TextSink>,
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: ProviderId) -> Self {
        self.provider = provider;
        self
    }

    pub fn json(mut self) -> Self {
        self.mode = ResponseMode::Json;
        self
    }

    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    pub fn loop_until_text(mut self, enabled: bool) -> Self {
        self.loop_until_text = enabled;
        self
    }

    pub fn with_max_function_rounds(mut self, rounds: u32) -> Self {
        self.max_function_rounds = Some(rounds);
        self
    }

    pub fn with_params(mut self, params: RequestParameters) -> Self {
        self.params = params;
        self
    }

    pub fn with_stream<F>(mut self, sink: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.stream = Some(Arc::new(sink));
        self
    }
}

impl Debug for CompletionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionOptions")
            .field("provider", &self.provider)
            .field("mode", &self.mode)
            .field("raw", &self.raw)
            .field("loop_until_text", &self.loop_until_text)
            .field("max_function_rounds", &self.max_function_rounds)
            .field("params", &self.params)
            .field("stream", &self.stream.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionResult {
    Text(String),
    Json(Value),
    ToolCall(ToolCall),
    /// Streaming finished without buffering any content.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub result: CompletionResult,
    pub response: Option<ModelResponse>,
}

impl Completion {
    fn new(result: CompletionResult, response: Option<ModelResponse>) -> Self {
        Self { result, response }
    }
}

pub struct CompletionDispatcher {
    providers: Arc<ProviderRegistry>,
    hooks: Arc<dyn ProviderOperationHooks>,
    sleeper: Arc<dyn Sleeper>,
    recovery: Arc<dyn JsonRecovery>,
    blank_retry: RetryPolicy,
}

impl CompletionDispatcher {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self {
            providers,
            hooks: Arc::new(NoopOperationHooks),
            sleeper: Arc::new(TimerSleeper),
            recovery: Arc::new(FenceStrippingRecovery),
            blank_retry: ChatDefaults::default().blank_retry,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_recovery(mut self, recovery: Arc<dyn JsonRecovery>) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_blank_retry(mut self, blank_retry: RetryPolicy) -> Self {
        self.blank_retry = blank_retry;
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub async fn send(
        &self,
        request: ModelRequest,
        options: &CompletionOptions,
    ) -> Result<Completion, ChatError> {
        let provider = self.providers.get(options.provider).ok_or_else(|| {
            ChatError::invalid_request(format!(
                "no backend registered for '{}'",
                options.provider
            ))
        })?;

        let mut blank_attempt = 1;
        loop {
            let Some(response) = self.fetch(&provider, &request, options).await? else {
                return Ok(Completion::new(CompletionResult::Empty, None));
            };

            let (first_call, ignored) = {
                let mut tool_calls = response.tool_calls();
                (tool_calls.next().cloned(), tool_calls.count())
            };
            if let Some(call) = first_call {
                if ignored > 0 {
                    debug!(
                        function = %call.name,
                        ignored,
                        "only the first tool call is dispatched"
                    );
                }
                return Ok(Completion::new(
                    CompletionResult::ToolCall(call),
                    Some(response),
                ));
            }

            let content = response.text();
            if options.mode == ResponseMode::Text {
                return Ok(Completion::new(
                    CompletionResult::Text(content),
                    Some(response),
                ));
            }

            if content.trim().is_empty() {
                if blank_attempt < self.blank_retry.max_attempts {
                    let delay = self.blank_retry.backoff_for_attempt(blank_attempt);
                    warn!(
                        provider = %options.provider,
                        attempt = blank_attempt,
                        delay_ms = delay.as_millis() as u64,
                        "structured response was blank; retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    blank_attempt += 1;
                    continue;
                }

                return Err(ChatError::blank_structured_response(blank_attempt));
            }

            let value = match serde_json::from_str(&content) {
                Ok(value) => value,
                Err(parse_error) => {
                    debug!(error = %parse_error, "structured response did not parse; recovering");
                    self.recovery.recover(&content, &parse_error)?
                }
            };

            return Ok(Completion::new(CompletionResult::Json(value), Some(response)));
        }
    }

    async fn fetch(
        &self,
        provider: &Arc<dyn ModelProvider>,
        request: &ModelRequest,
        options: &CompletionOptions,
    ) -> Result<Option<ModelResponse>, ChatError> {
        let provider_id = options.provider;
        let policy = self.providers.policy_for(provider_id);
        let operation = if options.stream.is_some() {
            "stream"
        } else {
            "complete"
        };

        debug!(
            provider = %provider_id,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            operation,
            "dispatching completion request"
        );

        let sleeper = Arc::clone(&self.sleeper);
        let result = execute_with_retry(
            provider_id,
            operation,
            &policy,
            self.hooks.as_ref(),
            |_attempt| {
                let provider = Arc::clone(provider);
                let request = request.clone();
                let sink = options.stream.clone();
                async move {
                    match sink {
                        Some(sink) => stream_once(provider.as_ref(), request, &sink).await,
                        None => provider.complete(request).await.map(Some),
                    }
                }
            },
            |delay| sleeper.sleep(delay),
        )
        .await;

        match result {
            Ok(response) => {
                debug!(
                    provider = %provider_id,
                    buffered = response.is_some(),
                    "completion response received"
                );
                Ok(response)
            }
            Err(failure) if failure.retryable => {
                warn!(
                    provider = %provider_id,
                    status = ?failure.status,
                    attempts = policy.max_attempts,
                    error = %failure,
                    "backend kept failing after retries"
                );
                Err(ChatError::from(failure))
            }
            Err(failure) => {
                error!(
                    provider = %provider_id,
                    status = ?failure.status,
                    body = failure.body.as_deref().unwrap_or_default(),
                    error = %failure,
                    "backend request failed"
                );
                Err(ChatError::from(failure))
            }
        }
    }
}

async fn stream_once(
    provider: &dyn ModelProvider,
    mut request: ModelRequest,
    sink: &TextSink,
) -> Result<Option<ModelResponse>, ProviderError> {
    request.parameters.stream = Some(true);
    let mut accumulator = StreamAccumulator::new(provider.id(), request.model.clone());
    let mut events = provider.stream(request).await?;

    while let Some(event) = events.next().await {
        let event = event?;
        if let StreamEvent::TextDelta(delta) = &event {
            sink(delta);
        }
        accumulator.push(&event);
    }

    if accumulator.is_empty() {
        return Ok(None);
    }

    Ok(Some(accumulator.finish()))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use fprovider::{
        BoxedEventStream, Message, OutputItem, ProviderFuture, StopReason, TokenUsage,
        VecEventStream,
    };
    use serde_json::json;

    use super::*;
    use crate::{ChatErrorKind, StrictJsonRecovery};

    struct ScriptedProvider {
        id: ProviderId,
        replies: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(id: ProviderId, replies: Vec<Result<ModelResponse, ProviderError>>) -> Self {
            Self {
                id,
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }
    }

    impl ModelProvider for ScriptedProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn complete<'a>(
            &'a self,
            _request: ModelRequest,
        ) -> ProviderFuture<'a, Result<ModelResponse, ProviderError>> {
            Box::pin(async move {
                *self.calls.lock().expect("calls lock") += 1;
                self.replies
                    .lock()
                    .expect("replies lock")
                    .pop_front()
                    .unwrap_or_else(|| Err(ProviderError::other("script exhausted")))
            })
        }

        fn stream<'a>(
            &'a self,
            _request: ModelRequest,
        ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
            Box::pin(async move {
                let stream: BoxedEventStream<'a> = Box::pin(VecEventStream::new(vec![
                    Ok(StreamEvent::TextDelta("hel".to_string())),
                    Ok(StreamEvent::TextDelta("lo".to_string())),
                ]));
                Ok(stream)
            })
        }
    }

    struct SilentStreamProvider;

    impl ModelProvider for SilentStreamProvider {
        fn id(&self) -> ProviderId {
            ProviderId::OpenRouter
        }

        fn complete<'a>(
            &'a self,
            _request: ModelRequest,
        ) -> ProviderFuture<'a, Result<ModelResponse, ProviderError>> {
            Box::pin(async move { Err(ProviderError::other("not used")) })
        }

        fn stream<'a>(
            &'a self,
            _request: ModelRequest,
        ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
            Box::pin(async move {
                let stream: BoxedEventStream<'a> = Box::pin(VecEventStream::new(Vec::new()));
                Ok(stream)
            })
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
            self.delays.lock().expect("delays lock").push(duration);
            Box::pin(async {})
        }
    }

    fn text_response(text: &str) -> ModelResponse {
        ModelResponse {
            provider: ProviderId::OpenRouter,
            model: "test-model".to_string(),
            output: vec![OutputItem::Message(Message::assistant(text))],
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
            raw: None,
        }
    }

    fn request() -> ModelRequest {
        ModelRequest::new("test-model", vec![Message::user("hi")])
    }

    fn dispatcher(provider: ScriptedProvider) -> (CompletionDispatcher, Arc<RecordingSleeper>) {
        let mut providers = ProviderRegistry::new();
        providers.register(provider);
        let sleeper = Arc::new(RecordingSleeper::default());
        let dispatcher = CompletionDispatcher::new(Arc::new(providers))
            .with_sleeper(Arc::clone(&sleeper) as Arc<dyn Sleeper>);
        (dispatcher, sleeper)
    }

    #[tokio::test]
    async fn text_reply_is_returned_with_response() {
        let (dispatcher, _) = dispatcher(ScriptedProvider::new(
            ProviderId::OpenRouter,
            vec![Ok(text_response("hello"))],
        ));

        let completion = dispatcher
            .send(request(), &CompletionOptions::new())
            .await
            .expect("completion");

        assert_eq!(completion.result, CompletionResult::Text("hello".to_string()));
        assert!(completion.response.is_some());
    }

    #[tokio::test]
    async fn first_tool_call_wins() {
        let mut response = text_response("");
        response.output = vec![
            OutputItem::ToolCall(ToolCall::new("a", "first", "{}")),
            OutputItem::ToolCall(ToolCall::new("b", "second", "{}")),
        ];
        let (dispatcher, _) =
            dispatcher(ScriptedProvider::new(ProviderId::OpenRouter, vec![Ok(response)]));

        let completion = dispatcher
            .send(request(), &CompletionOptions::new())
            .await
            .expect("completion");

        match completion.result {
            CompletionResult::ToolCall(call) => assert_eq!(call.name, "first"),
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn direct_backend_does_not_retry_by_default() {
        let (dispatcher, sleeper) = dispatcher(ScriptedProvider::new(
            ProviderId::OpenAi,
            vec![
                Err(ProviderError::server(503, "unavailable")),
                Ok(text_response("late")),
            ],
        ));

        let error = dispatcher
            .send(
                request(),
                &CompletionOptions::new().with_provider(ProviderId::OpenAi),
            )
            .await
            .expect_err("single attempt must fail");

        assert_eq!(error.kind, ChatErrorKind::TransientBackend);
        assert!(sleeper.delays.lock().expect("delays lock").is_empty());
    }

    #[tokio::test]
    async fn non_retryable_failure_surfaces_immediately() {
        let (dispatcher, sleeper) = dispatcher(ScriptedProvider::new(
            ProviderId::OpenRouter,
            vec![Err(ProviderError::invalid_request("bad model")
                .with_status(400)
                .with_body("{\"error\":\"bad model\"}"))],
        ));

        let error = dispatcher
            .send(request(), &CompletionOptions::new())
            .await
            .expect_err("must fail");

        assert_eq!(error.kind, ChatErrorKind::BackendRequest);
        assert_eq!(error.status, Some(400));
        assert!(sleeper.delays.lock().expect("delays lock").is_empty());
    }

    #[tokio::test]
    async fn blank_structured_reply_retries_then_fails() {
        let (dispatcher, sleeper) = dispatcher(ScriptedProvider::new(
            ProviderId::OpenRouter,
            vec![
                Ok(text_response("")),
                Ok(text_response("  ")),
                Ok(text_response("")),
            ],
        ));

        let error = dispatcher
            .send(request(), &CompletionOptions::new().json())
            .await
            .expect_err("blank must fail");

        assert_eq!(error.kind, ChatErrorKind::BlankStructuredResponse);
        assert_eq!(
            *sleeper.delays.lock().expect("delays lock"),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn blank_structured_reply_recovers_on_later_attempt() {
        let (dispatcher, _) = dispatcher(ScriptedProvider::new(
            ProviderId::OpenRouter,
            vec![Ok(text_response("")), Ok(text_response("{\"ok\":true}"))],
        ));

        let completion = dispatcher
            .send(request(), &CompletionOptions::new().json())
            .await
            .expect("completion");

        assert_eq!(completion.result, CompletionResult::Json(json!({"ok": true})));
    }

    #[tokio::test]
    async fn malformed_json_goes_through_recovery_without_retry() {
        let provider = ScriptedProvider::new(
            ProviderId::OpenRouter,
            vec![Ok(text_response("```json\n{\"ok\":1}\n```"))],
        );
        let (dispatcher, sleeper) = dispatcher(provider);

        let completion = dispatcher
            .send(request(), &CompletionOptions::new().json())
            .await
            .expect("recovered");
        assert_eq!(completion.result, CompletionResult::Json(json!({"ok": 1})));
        assert!(sleeper.delays.lock().expect("delays lock").is_empty());

        let (strict, _) = dispatcher_with_strict(text_response("not json"));
        let error = strict
            .send(request(), &CompletionOptions::new().json())
            .await
            .expect_err("strict recovery fails");
        assert_eq!(error.kind, ChatErrorKind::MalformedStructuredResponse);
    }

    fn dispatcher_with_strict(
        response: ModelResponse,
    ) -> (CompletionDispatcher, Arc<RecordingSleeper>) {
        let (dispatcher, sleeper) = dispatcher(ScriptedProvider::new(
            ProviderId::OpenRouter,
            vec![Ok(response)],
        ));
        (dispatcher.with_recovery(Arc::new(StrictJsonRecovery)), sleeper)
    }

    #[tokio::test]
    async fn streaming_forwards_deltas_and_buffers_text() {
        let (dispatcher, _) = dispatcher(ScriptedProvider::new(ProviderId::OpenRouter, Vec::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);

        let completion = dispatcher
            .send(
                request(),
                &CompletionOptions::new().with_stream(move |delta| {
                    sink_seen.lock().expect("seen lock").push(delta.to_string());
                }),
            )
            .await
            .expect("completion");

        assert_eq!(completion.result, CompletionResult::Text("hello".to_string()));
        assert_eq!(*seen.lock().expect("seen lock"), vec!["hel", "lo"]);
    }

    #[tokio::test]
    async fn streaming_without_content_is_empty() {
        let mut providers = ProviderRegistry::new();
        providers.register(SilentStreamProvider);
        let dispatcher = CompletionDispatcher::new(Arc::new(providers));

        let completion = dispatcher
            .send(request(), &CompletionOptions::new().with_stream(|_| {}))
            .await
            .expect("completion");

        assert_eq!(completion.result, CompletionResult::Empty);
        assert!(completion.response.is_none());
    }

    #[tokio::test]
    async fn missing_binding_is_invalid_request() {
        let dispatcher = CompletionDispatcher::new(Arc::new(ProviderRegistry::new()));
        let error = dispatcher
            .send(request(), &CompletionOptions::new())
            .await
            .expect_err("no provider");
        assert_eq!(error.kind, ChatErrorKind::InvalidRequest);
    }
}
