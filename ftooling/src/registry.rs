//! Name-keyed function table, kept in declaration order.
//!
//! ```rust
//! use serde_json::json;
//! use ftooling::{FunctionRegistry, FunctionSpec};
//!
//! let mut registry = FunctionRegistry::new();
//! registry.register_sync(FunctionSpec::new("first"), |_args, _ctx| Ok(json!(1)));
//! registry.register_sync(FunctionSpec::new("second"), |_args, _ctx| Ok(json!(2)));
//!
//! assert_eq!(registry.names().collect::<Vec<_>>(), vec!["first", "second"]);
//! assert_eq!(registry.definitions().len(), 2);
//! ```

use std::future::Future;
use std::sync::Arc;

use fcommon::Registry;
use fprovider::ToolDefinition;
use serde_json::Value;

use crate::{
    FunctionArguments, FunctionContext, FunctionHandler, FunctionSpec, FunctionTool, ToolError,
};

struct Entry {
    spec: FunctionSpec,
    handler: Arc<dyn FunctionHandler>,
}

#[derive(Default)]
pub struct FunctionRegistry {
    functions: Registry<String, Entry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under `spec.name`, replacing any earlier entry with that name.
    pub fn register_handler<H>(&mut self, spec: FunctionSpec, handler: H)
    where
        H: FunctionHandler + 'static,
    {
        let name = spec.name.clone();
        let handler: Arc<dyn FunctionHandler> = Arc::new(handler);
        self.functions.insert(name, Entry { spec, handler });
    }

    pub fn register<F, Fut>(&mut self, spec: FunctionSpec, handler: F)
    where
        F: Fn(FunctionArguments, FunctionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        let tool = FunctionTool::new(spec.clone(), handler);
        self.register_handler(spec, tool);
    }

    pub fn register_sync<F>(&mut self, spec: FunctionSpec, handler: F)
    where
        F: Fn(FunctionArguments, FunctionContext) -> Result<Value, ToolError>
            + Send
            + Sync
            + 'static,
    {
        self.register(spec, move |arguments, context| {
            let output = handler(arguments, context);
            async move { output }
        });
    }

    pub fn handler(&self, name: &str) -> Option<Arc<dyn FunctionHandler>> {
        self.functions
            .get(name)
            .map(|entry| Arc::clone(&entry.handler))
    }

    pub fn spec(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name).map(|entry| &entry.spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FunctionSpec> {
        self.functions.remove(name).map(|entry| entry.spec)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Tool declarations in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.functions
            .values()
            .map(|entry| entry.spec.to_tool_definition())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
