//! Common `fprovider` imports for downstream crates.

pub use crate::{
    BoxedEventStream, Message, ModelEventStream, ModelProvider, ModelRequest, ModelRequestBuilder,
    ModelResponse, NoopOperationHooks, OutputItem, ProviderError, ProviderErrorKind,
    ProviderFuture, ProviderId, ProviderOperationHooks, ProviderRegistry, RetryPolicy, Role,
    SecretString, StopReason, StreamAccumulator, StreamEvent, TokenUsage, ToolCall,
    ToolDefinition, execute_with_retry,
};
pub use fcommon::{BoxFuture, MetadataMap, RequestParameters, ResponseFormat};

#[cfg(feature = "http")]
pub use crate::http::OpenAiCompatibleProvider;
