//! Completion backend abstraction: wire model, provider trait, retry policy,
//! streaming contracts, and the OpenAI-compatible HTTP adapter.
//!
//! ```rust
//! use fprovider::{Message, ModelRequest, ProviderId, RetryPolicy};
//!
//! let request = ModelRequest::builder("meta-llama/llama-3-8b-instruct:free")
//!     .message(Message::user("Hello"))
//!     .build()
//!     .expect("request should be valid");
//!
//! assert_eq!(request.messages.len(), 1);
//! assert_eq!(ProviderId::default(), ProviderId::OpenRouter);
//! assert_eq!(RetryPolicy::default().max_attempts, 5);
//! ```

pub mod credentials;
pub mod error;
pub mod model;
pub mod prelude;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod stream;

#[cfg(feature = "http")]
pub mod http;

pub use credentials::SecretString;
pub use error::{ProviderError, ProviderErrorKind};
pub use model::{
    Message, ModelRequest, ModelRequestBuilder, ModelResponse, OutputItem, ProviderId, Role,
    StopReason, TokenUsage, ToolCall, ToolDefinition,
};
pub use provider::{ModelProvider, ProviderFuture};
pub use registry::{ProviderRegistry, default_policy};
pub use resilience::{
    NoopOperationHooks, ProviderOperationHooks, RetryPolicy, execute_with_retry,
};
pub use stream::{
    BoxedEventStream, ModelEventStream, StreamAccumulator, StreamEvent, VecEventStream,
};
