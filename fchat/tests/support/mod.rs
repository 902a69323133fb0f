#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fchat::{CompletionDispatcher, Sleeper};
use fcommon::BoxFuture;
use fprovider::{
    BoxedEventStream, Message, ModelProvider, ModelRequest, ModelResponse, OutputItem,
    ProviderError, ProviderFuture, ProviderId, ProviderRegistry, StopReason, TokenUsage, ToolCall,
    VecEventStream, default_policy,
};

/// Replays canned replies in order and records every request it receives.
pub struct ScriptedProvider {
    id: ProviderId,
    replies: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Result<ModelResponse, ProviderError>>) -> Arc<Self> {
        Self::with_id(ProviderId::OpenRouter, replies)
    }

    pub fn with_id(
        id: ProviderId,
        replies: Vec<Result<ModelResponse, ProviderError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl ModelProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelResponse, ProviderError>> {
        Box::pin(async move {
            self.requests.lock().expect("requests lock").push(request);
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::other("no scripted reply left")))
        })
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            self.requests.lock().expect("requests lock").push(request);
            let stream: BoxedEventStream<'a> = Box::pin(VecEventStream::new(Vec::new()));
            Ok(stream)
        })
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().expect("delays lock").clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.delays.lock().expect("delays lock").push(duration);
        Box::pin(async {})
    }
}

pub fn dispatcher(
    provider: &Arc<ScriptedProvider>,
) -> (Arc<CompletionDispatcher>, Arc<RecordingSleeper>) {
    let mut providers = ProviderRegistry::new();
    let id = provider.id();
    providers.register_shared(
        Arc::clone(provider) as Arc<dyn ModelProvider>,
        default_policy(id),
    );

    let sleeper = Arc::new(RecordingSleeper::default());
    let dispatcher = CompletionDispatcher::new(Arc::new(providers))
        .with_sleeper(Arc::clone(&sleeper) as Arc<dyn Sleeper>);
    (Arc::new(dispatcher), sleeper)
}

pub fn text(content: &str) -> ModelResponse {
    ModelResponse {
        provider: ProviderId::OpenRouter,
        model: "test-model".to_string(),
        output: vec![OutputItem::Message(Message::assistant(content))],
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage::default(),
        raw: None,
    }
}

pub fn tool_call(name: &str, arguments: &str) -> ModelResponse {
    ModelResponse {
        provider: ProviderId::OpenRouter,
        model: "test-model".to_string(),
        output: vec![OutputItem::ToolCall(ToolCall::new(
            "backend-id", name, arguments,
        ))],
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage::default(),
        raw: None,
    }
}
