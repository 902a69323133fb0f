//! Unified facade over the fconverse workspace crates.
//!
//! This crate is the single dependency for most applications. It re-exports
//! the core crates, loads layered settings, and wires dispatchers, history
//! stores and function runtimes together with observability hooks attached.

mod error;
mod macros;

pub mod prelude;
pub mod providers;
pub mod runtime;
pub mod settings;

pub use fchat;
pub use fcommon;
pub use fmemory;
pub use fobserve;
pub use fprovider;
pub use ftooling;

pub use error::{SetupError, SetupErrorKind};
pub use fchat::{
    ChatDefaults, ChatError, ChatErrorKind, ChatOutput, ChatSession, ChatSessionBuilder,
    CompletionDispatcher, CompletionOptions, PromptChainExecutor, PromptDeclarations, PromptSpec,
    Transcript, Turn,
};
pub use fcommon::{BoxFuture, RequestParameters, SessionId};
pub use fmemory::{HistoryStore, HistoryWindow, MemoryError, PersistHistory, SeedFromHistory};
pub use fprovider::{ModelProvider, ProviderError, ProviderId, ProviderRegistry, SecretString};
pub use ftooling::{FunctionContext, FunctionRegistry, FunctionSpec, ToolError};

pub use providers::{build_provider, build_provider_registry, parse_provider_id};
pub use runtime::{
    RuntimeBundle, build_runtime, build_runtime_with, default_tokenizer, function_runtime,
    observed_dispatcher,
};
pub use settings::Settings;
