//! Conversation sessions and the function dispatch loop.

use std::sync::Arc;

use fcommon::{BoxFuture, RequestParameters, SessionId, new_call_id};
use fprovider::{ModelResponse, ToolCall};
use ftooling::{FunctionContext, FunctionOutcome, FunctionRuntime, LoopControl, coerce_output};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    ChatDefaults, ChatError, Completion, CompletionDispatcher, CompletionOptions,
    CompletionResult, ConversationDriver, ParameterLayers, Transcript, Turn, assemble_request,
};

/// Dispatch loop states, traced at debug level on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Requesting,
    TextReady,
    ToolCallReceived,
    Executing,
    Appended,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutput {
    Text(String),
    Json(Value),
    Raw(ModelResponse),
    /// A function ran and the loop did not re-request.
    Function {
        name: String,
        call_id: String,
        output: Value,
    },
    /// Streaming finished with nothing buffered.
    Empty,
}

impl ChatOutput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Text form used when the output is written back into a transcript.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Json(value) => Some(value.to_string()),
            Self::Raw(response) => Some(response.text()),
            Self::Function { output, .. } => Some(coerce_output(output)),
            Self::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// One conversation: its transcript plus everything needed to extend it.
///
/// A session is driven by one caller at a time; every operation that touches
/// the transcript takes `&mut self`.
pub struct ChatSession {
    id: SessionId,
    transcript: Transcript,
    dispatcher: Arc<CompletionDispatcher>,
    runtime: Option<Arc<dyn FunctionRuntime>>,
    defaults: Arc<ChatDefaults>,
    parameters: RequestParameters,
    system_prompt: Option<String>,
    loop_control: LoopControl,
    current_function: Option<String>,
    last_response: Option<ModelResponse>,
    persisted_len: usize,
}

impl ChatSession {
    pub fn builder(dispatcher: Arc<CompletionDispatcher>) -> ChatSessionBuilder {
        ChatSessionBuilder::new(dispatcher)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn push(&mut self, turn: Turn) -> Result<(), ChatError> {
        self.transcript.push(turn)
    }

    pub fn parameters(&self) -> &RequestParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: RequestParameters) {
        self.parameters = parameters;
    }

    pub fn defaults(&self) -> &ChatDefaults {
        &self.defaults
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Most recent full backend response.
    pub fn last_response(&self) -> Option<&ModelResponse> {
        self.last_response.as_ref()
    }

    /// Name of the last function the backend asked for.
    pub fn current_function(&self) -> Option<&str> {
        self.current_function.as_deref()
    }

    /// Turns appended since the session was built or last marked persisted.
    pub fn unpersisted_turns(&self) -> &[Turn] {
        &self.transcript.turns()[self.persisted_len..]
    }

    pub fn mark_persisted(&mut self) {
        self.persisted_len = self.transcript.len();
    }

    /// Marks the first `len` turns persisted. The watermark never moves back.
    pub fn mark_persisted_through(&mut self, len: usize) {
        self.persisted_len = len.clamp(self.persisted_len, self.transcript.len());
    }

    pub async fn chat_completion(
        &mut self,
        options: CompletionOptions,
    ) -> Result<ChatOutput, ChatError> {
        self.run(&RequestParameters::default(), options).await
    }

    /// Feeds `result` back as the output of the current function and re-requests.
    pub async fn continue_with(
        &mut self,
        result: Value,
        options: CompletionOptions,
    ) -> Result<ChatOutput, ChatError> {
        let name = self
            .current_function
            .clone()
            .ok_or_else(|| ChatError::invalid_request("no function call to continue"))?;

        let call_id = new_call_id();
        self.transcript.push(Turn::ToolCall {
            name: name.clone(),
            arguments_json: "{}".to_string(),
            call_id: call_id.clone(),
        })?;
        self.transcript
            .push(Turn::tool_result(call_id, name, coerce_output(&result)))?;

        self.chat_completion(options).await
    }

    async fn run(
        &mut self,
        step: &RequestParameters,
        options: CompletionOptions,
    ) -> Result<ChatOutput, ChatError> {
        self.loop_control.set(options.loop_until_text);
        let round_cap = options
            .max_function_rounds
            .or(self.defaults.max_function_rounds);
        let mut rounds = 0_u32;
        self.enter(DispatchState::Idle);

        loop {
            self.enter(DispatchState::Requesting);
            let Completion { result, response } = self.request(step, &options).await?;
            if let Some(response) = &response {
                self.last_response = Some(response.clone());
            }

            let call = match result {
                CompletionResult::ToolCall(call) => call,
                CompletionResult::Text(text) => {
                    return Ok(self.text_ready(ChatOutput::Text(text), response, options.raw));
                }
                CompletionResult::Json(value) => {
                    return Ok(self.text_ready(ChatOutput::Json(value), response, options.raw));
                }
                CompletionResult::Empty => {
                    return Ok(self.text_ready(ChatOutput::Empty, None, options.raw));
                }
            };

            self.enter(DispatchState::ToolCallReceived);
            let outcome = self.execute(call).await?;
            self.enter(DispatchState::Appended);

            rounds += 1;
            if round_cap.is_some_and(|cap| rounds >= cap) && self.loop_control.is_enabled() {
                debug!(session_id = %self.id, rounds, "function round cap reached");
                self.loop_control.stop();
            }

            if self.loop_control.is_enabled() {
                continue;
            }

            self.enter(DispatchState::Done);
            return Ok(ChatOutput::Function {
                name: outcome.name,
                call_id: outcome.call_id,
                output: outcome.output,
            });
        }
    }

    async fn request(
        &self,
        step: &RequestParameters,
        options: &CompletionOptions,
    ) -> Result<Completion, ChatError> {
        let layers = ParameterLayers::new(self.defaults.parameters())
            .session(self.parameters.clone())
            .step(step.clone())
            .call(options.params.clone());
        let registry = self.runtime.as_ref().map(|runtime| runtime.registry());

        let request =
            assemble_request(&self.transcript, registry.as_deref(), &layers, options.mode)?;
        self.dispatcher.send(request, options).await
    }

    async fn execute(&mut self, call: ToolCall) -> Result<FunctionOutcome, ChatError> {
        let runtime = self
            .runtime
            .clone()
            .filter(|runtime| !runtime.registry().is_empty())
            .ok_or_else(|| ChatError::no_functions_defined(&call.name))?;
        if !runtime.registry().contains(&call.name) {
            return Err(ChatError::unknown_function(&call.name));
        }

        let call_id = new_call_id();
        self.transcript.push(Turn::ToolCall {
            name: call.name.clone(),
            arguments_json: call.arguments.clone(),
            call_id: call_id.clone(),
        })?;
        self.current_function = Some(call.name.clone());

        self.enter(DispatchState::Executing);
        info!(
            session_id = %self.id,
            function = %call.name,
            call_id = %call_id,
            "executing function"
        );

        let context =
            FunctionContext::new(self.id.clone()).with_loop_control(self.loop_control.clone());
        let outcome = match runtime
            .execute(
                ToolCall::new(call_id.clone(), call.name.clone(), call.arguments),
                context,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    session_id = %self.id,
                    function = %call.name,
                    call_id = %call_id,
                    error = %error,
                    "function failed"
                );
                self.transcript.push(Turn::tool_result(
                    call_id,
                    call.name,
                    format!("error: {error}"),
                ))?;
                return Err(error.into());
            }
        };

        self.transcript.push(Turn::tool_result(
            outcome.call_id.clone(),
            outcome.name.clone(),
            outcome.output_text(),
        ))?;

        Ok(outcome)
    }

    fn text_ready(
        &self,
        output: ChatOutput,
        response: Option<ModelResponse>,
        raw: bool,
    ) -> ChatOutput {
        self.enter(DispatchState::TextReady);
        let output = match response {
            Some(response) if raw => ChatOutput::Raw(response),
            _ => output,
        };
        self.enter(DispatchState::Done);
        output
    }

    fn enter(&self, state: DispatchState) {
        debug!(session_id = %self.id, state = ?state, "dispatch state");
    }
}

impl ConversationDriver for ChatSession {
    fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn push_turn(&mut self, turn: Turn) -> Result<(), ChatError> {
        self.transcript.push(turn)
    }

    fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    fn session_parameters(&self) -> RequestParameters {
        self.parameters.or(&self.defaults.parameters())
    }

    fn complete<'a>(
        &'a mut self,
        step: RequestParameters,
        options: CompletionOptions,
    ) -> BoxFuture<'a, Result<ChatOutput, ChatError>> {
        Box::pin(async move { self.run(&step, options).await })
    }
}

pub struct ChatSessionBuilder {
    dispatcher: Arc<CompletionDispatcher>,
    id: Option<SessionId>,
    transcript: Transcript,
    runtime: Option<Arc<dyn FunctionRuntime>>,
    defaults: Arc<ChatDefaults>,
    parameters: RequestParameters,
    system_prompt: Option<String>,
}

impl std::fmt::Debug for ChatSessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSessionBuilder")
            .field("id", &self.id)
            .field("turns", &self.transcript.len())
            .field("system_prompt", &self.system_prompt)
            .finish_non_exhaustive()
    }
}

impl ChatSessionBuilder {
    pub fn new(dispatcher: Arc<CompletionDispatcher>) -> Self {
        Self {
            dispatcher,
            id: None,
            transcript: Transcript::new(),
            runtime: None,
            defaults: Arc::new(ChatDefaults::default()),
            parameters: RequestParameters::default(),
            system_prompt: None,
        }
    }

    pub fn id(mut self, id: impl Into<SessionId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Seeds the session. Seeded turns count as already persisted.
    pub fn transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn runtime(mut self, runtime: Arc<dyn FunctionRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn defaults(mut self, defaults: Arc<ChatDefaults>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn parameters(mut self, parameters: RequestParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn chat_defaults(&self) -> &ChatDefaults {
        &self.defaults
    }

    pub fn build(self) -> ChatSession {
        let persisted_len = self.transcript.len();

        ChatSession {
            id: self.id.unwrap_or_else(SessionId::generate),
            transcript: self.transcript,
            dispatcher: self.dispatcher,
            runtime: self.runtime,
            defaults: self.defaults,
            parameters: self.parameters,
            system_prompt: self.system_prompt,
            loop_control: LoopControl::new(false),
            current_function: None,
            last_response: None,
            persisted_len,
        }
    }
}
