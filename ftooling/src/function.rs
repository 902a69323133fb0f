//! Function declarations and the handler contract.
//!
//! ```rust
//! use serde_json::json;
//! use ftooling::{FunctionSpec, FunctionTool};
//!
//! let spec = FunctionSpec::new("check_weather")
//!     .with_description("Check the weather for a location")
//!     .with_property("location", json!({"type": "string"}));
//!
//! let tool = FunctionTool::new(spec, |args, _ctx| async move {
//!     Ok(json!(format!("sunny in {}", args["location"])))
//! });
//!
//! assert_eq!(tool.spec().name, "check_weather");
//! ```

use std::future::Future;
use std::sync::Arc;

use fcommon::BoxFuture;
use fprovider::ToolDefinition;
use serde_json::{Map, Value, json};

use crate::{FunctionContext, ToolError};

pub type FunctionFuture<'a, T> = BoxFuture<'a, T>;

pub type FunctionArguments = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionSpec {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema `properties` of the arguments object.
    pub properties: Map<String, Value>,
}

impl FunctionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn to_tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": Value::Object(self.properties.clone()),
            }),
        }
    }
}

pub trait FunctionHandler: Send + Sync {
    fn call<'a>(
        &'a self,
        arguments: FunctionArguments,
        context: &'a FunctionContext,
    ) -> FunctionFuture<'a, Result<Value, ToolError>>;
}

type BoxedHandler =
    dyn Fn(FunctionArguments, FunctionContext) -> FunctionFuture<'static, Result<Value, ToolError>>
        + Send
        + Sync;

/// A declaration paired with the closure that implements it.
#[derive(Clone)]
pub struct FunctionTool {
    spec: FunctionSpec,
    handler: Arc<BoxedHandler>,
}

impl FunctionTool {
    pub fn new<F, Fut>(spec: FunctionSpec, handler: F) -> Self
    where
        F: Fn(FunctionArguments, FunctionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let handler: Arc<BoxedHandler> =
            Arc::new(move |arguments, context| Box::pin(handler(arguments, context)));

        Self { spec, handler }
    }

    pub fn spec(&self) -> &FunctionSpec {
        &self.spec
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl FunctionHandler for FunctionTool {
    fn call<'a>(
        &'a self,
        arguments: FunctionArguments,
        context: &'a FunctionContext,
    ) -> FunctionFuture<'a, Result<Value, ToolError>> {
        (self.handler)(arguments, context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_wraps_properties_in_object_schema() {
        let spec = FunctionSpec::new("check_weather")
            .with_property("location", json!({"type": "string"}));

        let definition = spec.to_tool_definition();
        assert_eq!(definition.description, None);
        assert_eq!(
            definition.to_declaration(),
            json!({
                "type": "function",
                "function": {
                    "name": "check_weather",
                    "parameters": {
                        "type": "object",
                        "properties": {"location": {"type": "string"}}
                    }
                }
            })
        );
    }

    #[tokio::test]
    async fn closure_handler_receives_arguments_and_context() {
        let tool = FunctionTool::new(FunctionSpec::new("echo"), |args, context| async move {
            Ok(json!(format!("{}:{}", context.session_id, args["word"])))
        });

        let mut arguments = FunctionArguments::new();
        arguments.insert("word".to_string(), json!("hi"));
        let context = FunctionContext::new("s1");

        let output = tool.call(arguments, &context).await.expect("handler should succeed");
        assert_eq!(output, json!("s1:\"hi\""));
    }
}
