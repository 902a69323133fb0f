//! Completion orchestration: transcripts, request assembly, dispatch with
//! retries, the function-call loop, and declared prompt chains.
//!
//! ```rust
//! use std::sync::Arc;
//! use fchat::prelude::*;
//! use fprovider::ProviderRegistry;
//!
//! let dispatcher = Arc::new(CompletionDispatcher::new(Arc::new(ProviderRegistry::new())));
//! let mut session = ChatSession::builder(dispatcher).id("docs").build();
//! session.push(Turn::user("What is the weather in Paris?")).expect("append");
//! assert_eq!(session.transcript().len(), 1);
//! ```

mod assembler;
mod config;
mod dispatcher;
mod error;
mod hooks;
mod params;
mod prompts;
mod recovery;
mod session;
mod transcript;

pub mod prelude {
    pub use crate::{
        ChatDefaults, ChatError, ChatErrorKind, ChatOutput, ChatSession, ChatSessionBuilder,
        CompletionDispatcher, CompletionOptions, ConversationDriver, ParameterLayers,
        PromptChainExecutor, PromptDeclarations, PromptSpec, ResponseMode, Transcript, Turn,
    };
    pub use fcommon::{RequestParameters, SessionId};
    pub use ftooling::{DefaultFunctionRuntime, FunctionContext, FunctionRegistry, FunctionSpec};
}

pub use assembler::{ResponseMode, assemble_request};
pub use config::{
    ChatDefaults, DEFAULT_BLANK_RETRY_ATTEMPTS, DEFAULT_HISTORY_MAX_TOKENS, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
pub use dispatcher::{
    Completion, CompletionDispatcher, CompletionOptions, CompletionResult, Sleeper, TextSink,
    TimerSleeper,
};
pub use error::{ChatError, ChatErrorKind};
pub use hooks::{NoopPromptChainHooks, PromptChainHooks};
pub use params::ParameterLayers;
pub use prompts::{
    ConversationDriver, PromptChainExecutor, PromptContext, PromptDeclarations, PromptGenerator,
    PromptSpec, SuccessHandler,
};
pub use recovery::{FenceStrippingRecovery, JsonRecovery, StrictJsonRecovery};
pub use session::{ChatOutput, ChatSession, ChatSessionBuilder, DispatchState};
pub use transcript::{Transcript, Turn};
