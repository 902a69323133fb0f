//! Function declaration, registration, and dispatch for completion tool calls.
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use ftooling::{DefaultFunctionRuntime, FunctionRegistry, FunctionSpec};
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register_sync(
//!     FunctionSpec::new("check_weather").with_property("location", json!({"type": "string"})),
//!     |_args, _ctx| Ok(json!("The weather is sunny")),
//! );
//!
//! let runtime = DefaultFunctionRuntime::new(Arc::new(registry));
//! # let _ = runtime;
//! ```

mod args;
mod error;
mod function;
mod hooks;
mod registry;
mod runtime;
mod types;

pub mod prelude {
    pub use crate::{
        DefaultFunctionRuntime, FunctionArguments, FunctionContext, FunctionHandler,
        FunctionOutcome, FunctionRegistry, FunctionRuntime, FunctionSpec, FunctionTool,
        LoopControl, ToolError, ToolErrorKind, ToolRuntimeHooks,
    };
}

pub use args::{coerce_output, parse_arguments, parse_json_object, required_string};
pub use error::{ToolError, ToolErrorKind};
pub use function::{FunctionArguments, FunctionFuture, FunctionHandler, FunctionSpec, FunctionTool};
pub use hooks::{NoopToolRuntimeHooks, ToolRuntimeHooks};
pub use registry::FunctionRegistry;
pub use runtime::{DefaultFunctionRuntime, FunctionRuntime};
pub use types::{FunctionContext, FunctionOutcome, LoopControl};
