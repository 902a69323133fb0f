//! Runtime wiring: dispatcher, defaults, history store, and function runtime
//! bundled so sessions and chains come out preconfigured.

use std::sync::Arc;

use fchat::{
    ChatDefaults, ChatError, ChatSession, ChatSessionBuilder, CompletionDispatcher,
    PromptChainExecutor, PromptChainHooks, PromptDeclarations,
};
use fmemory::{HistoryStore, HistoryWindow, SeedFromHistory, TiktokenTokenizer, Tokenizer};
use fobserve::{SafeChainHooks, SafeProviderHooks, SafeToolHooks, TracingObservabilityHooks};
use fprovider::{ProviderOperationHooks, ProviderRegistry};
use ftooling::{DefaultFunctionRuntime, FunctionRegistry, FunctionRuntime, ToolRuntimeHooks};

use crate::error::SetupError;
use crate::providers::build_provider_registry;
use crate::settings::Settings;

#[derive(Clone)]
pub struct RuntimeBundle {
    pub dispatcher: Arc<CompletionDispatcher>,
    pub defaults: Arc<ChatDefaults>,
    pub history: Arc<dyn HistoryStore>,
    pub functions: Option<Arc<dyn FunctionRuntime>>,
}

impl RuntimeBundle {
    /// Attaches declared functions, executed with tracing hooks.
    pub fn with_functions(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.functions = Some(function_runtime(registry));
        self
    }

    pub fn session(&self) -> ChatSessionBuilder {
        let builder = ChatSession::builder(Arc::clone(&self.dispatcher))
            .defaults(Arc::clone(&self.defaults));
        match &self.functions {
            Some(functions) => builder.runtime(Arc::clone(functions)),
            None => builder,
        }
    }

    /// A session builder seeded with the windowed tail of `owner`'s history.
    pub async fn session_from_history(
        &self,
        owner: &str,
        window: HistoryWindow,
    ) -> Result<ChatSessionBuilder, ChatError> {
        self.session()
            .from_history(self.history.as_ref(), owner, window)
            .await
    }

    pub fn chain(&self, declarations: Arc<PromptDeclarations>) -> PromptChainExecutor {
        let hooks: Arc<dyn PromptChainHooks> =
            Arc::new(SafeChainHooks::new(TracingObservabilityHooks));
        PromptChainExecutor::new(declarations).with_hooks(hooks)
    }
}

impl std::fmt::Debug for RuntimeBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBundle")
            .field("defaults", &self.defaults)
            .field("functions", &self.functions.is_some())
            .finish_non_exhaustive()
    }
}

pub fn observed_dispatcher(
    providers: ProviderRegistry,
    defaults: &ChatDefaults,
) -> CompletionDispatcher {
    let hooks: Arc<dyn ProviderOperationHooks> =
        Arc::new(SafeProviderHooks::new(TracingObservabilityHooks));
    CompletionDispatcher::new(Arc::new(providers))
        .with_hooks(hooks)
        .with_blank_retry(defaults.blank_retry.clone())
}

pub fn function_runtime(registry: Arc<FunctionRegistry>) -> Arc<dyn FunctionRuntime> {
    let hooks: Arc<dyn ToolRuntimeHooks> = Arc::new(SafeToolHooks::new(TracingObservabilityHooks));
    Arc::new(DefaultFunctionRuntime::new(registry).with_hooks(hooks))
}

pub fn default_tokenizer() -> Result<Arc<dyn Tokenizer>, SetupError> {
    Ok(Arc::new(TiktokenTokenizer::cl100k()?))
}

/// Builds backends, defaults and the history store from settings.
pub fn build_runtime(settings: &Settings) -> Result<RuntimeBundle, SetupError> {
    let providers = build_provider_registry(settings)?;
    let history =
        fmemory::create_history_store(settings.history.store_config(), default_tokenizer()?)?;

    Ok(build_runtime_with(
        providers,
        settings.chat_defaults(),
        history,
    ))
}

pub fn build_runtime_with(
    providers: ProviderRegistry,
    defaults: ChatDefaults,
    history: Arc<dyn HistoryStore>,
) -> RuntimeBundle {
    let dispatcher = observed_dispatcher(providers, &defaults);
    tracing::debug!(
        model = %defaults.model,
        history_max_tokens = defaults.history_max_tokens,
        "runtime assembled"
    );

    RuntimeBundle {
        dispatcher: Arc::new(dispatcher),
        defaults: Arc::new(defaults),
        history,
        functions: None,
    }
}
