//! Registry-backed function executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use fprovider::ToolCall;
use futures_timer::Delay;
use futures_util::future::{Either, select};

use crate::{
    FunctionContext, FunctionFuture, FunctionOutcome, FunctionRegistry, NoopToolRuntimeHooks,
    ToolError, ToolRuntimeHooks, parse_arguments,
};

pub trait FunctionRuntime: Send + Sync {
    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        context: FunctionContext,
    ) -> FunctionFuture<'a, Result<FunctionOutcome, ToolError>>;

    fn registry(&self) -> Arc<FunctionRegistry>;
}

#[derive(Clone)]
pub struct DefaultFunctionRuntime {
    registry: Arc<FunctionRegistry>,
    hooks: Arc<dyn ToolRuntimeHooks>,
    timeout: Option<Duration>,
}

impl Default for DefaultFunctionRuntime {
    fn default() -> Self {
        Self::new(Arc::new(FunctionRegistry::new()))
    }
}

impl DefaultFunctionRuntime {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            hooks: Arc::new(NoopToolRuntimeHooks),
            timeout: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Fails a handler with `ToolErrorKind::Timeout` once `timeout` elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run(
        &self,
        tool_call: &ToolCall,
        context: &FunctionContext,
    ) -> Result<FunctionOutcome, ToolError> {
        let handler = self.registry.handler(&tool_call.name).ok_or_else(|| {
            ToolError::not_found(format!("function '{}' is not declared", tool_call.name))
        })?;

        let arguments = parse_arguments(&tool_call.arguments);
        let call = handler.call(arguments, context);

        let output = match self.timeout {
            None => call.await?,
            Some(timeout) => match select(call, Delay::new(timeout)).await {
                Either::Left((result, _)) => result?,
                Either::Right(_) => {
                    return Err(ToolError::timeout(format!(
                        "function did not finish within {}ms",
                        timeout.as_millis()
                    )));
                }
            },
        };

        Ok(FunctionOutcome::new(
            tool_call.id.clone(),
            tool_call.name.clone(),
            output,
        ))
    }
}

impl FunctionRuntime for DefaultFunctionRuntime {
    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        context: FunctionContext,
    ) -> FunctionFuture<'a, Result<FunctionOutcome, ToolError>> {
        Box::pin(async move {
            let context = context.for_call(tool_call.name.clone(), tool_call.id.clone());
            self.hooks.on_execution_start(&tool_call, &context);
            let started = Instant::now();

            match self.run(&tool_call, &context).await {
                Ok(outcome) => {
                    self.hooks
                        .on_execution_success(&tool_call, &context, &outcome, started.elapsed());
                    Ok(outcome)
                }
                Err(error) => {
                    let error = error
                        .with_tool_name(tool_call.name.clone())
                        .with_tool_call_id(tool_call.id.clone());
                    self.hooks
                        .on_execution_failure(&tool_call, &context, &error, started.elapsed());
                    Err(error)
                }
            }
        })
    }

    fn registry(&self) -> Arc<FunctionRegistry> {
        Arc::clone(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use super::*;
    use crate::{FunctionSpec, LoopControl, ToolErrorKind};

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall::new("call_1", name, arguments)
    }

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<String>>,
    }

    impl ToolRuntimeHooks for RecordingHooks {
        fn on_execution_start(&self, tool_call: &ToolCall, _context: &FunctionContext) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("start:{}", tool_call.name));
        }

        fn on_execution_success(
            &self,
            tool_call: &ToolCall,
            _context: &FunctionContext,
            outcome: &FunctionOutcome,
            _elapsed: Duration,
        ) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("success:{}:{}", tool_call.name, outcome.output_text()));
        }

        fn on_execution_failure(
            &self,
            tool_call: &ToolCall,
            _context: &FunctionContext,
            error: &ToolError,
            _elapsed: Duration,
        ) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("failure:{}:{:?}", tool_call.name, error.kind));
        }
    }

    fn weather_registry() -> Arc<FunctionRegistry> {
        let mut registry = FunctionRegistry::new();
        registry.register_sync(
            FunctionSpec::new("check_weather").with_property("location", json!({"type": "string"})),
            |args, _| {
                let location = args.get("location").and_then(Value::as_str).unwrap_or("nowhere");
                Ok(json!(format!("sunny in {location}")))
            },
        );
        registry.register_sync(FunctionSpec::new("give_up"), |_, context| {
            context.stop_looping();
            Ok(json!({"stopped": true}))
        });
        registry.register_sync(FunctionSpec::new("broken"), |_, _| {
            Err(ToolError::execution("exploded"))
        });
        Arc::new(registry)
    }

    #[tokio::test]
    async fn executes_declared_function_with_parsed_arguments() {
        let hooks = Arc::new(RecordingHooks::default());
        let runtime = DefaultFunctionRuntime::new(weather_registry()).with_hooks(hooks.clone());

        let outcome = runtime
            .execute(
                call("check_weather", "{\"location\":\"Zipolite\"}"),
                FunctionContext::new("s1"),
            )
            .await
            .expect("execution should succeed");

        assert_eq!(outcome.call_id, "call_1");
        assert_eq!(outcome.output_text(), "sunny in Zipolite");
        assert_eq!(
            *hooks.events.lock().expect("events lock"),
            vec![
                "start:check_weather".to_string(),
                "success:check_weather:sunny in Zipolite".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn malformed_arguments_become_an_empty_object() {
        let runtime = DefaultFunctionRuntime::new(weather_registry());

        let outcome = runtime
            .execute(call("check_weather", "{not json"), FunctionContext::new("s1"))
            .await
            .expect("execution should succeed");

        assert_eq!(outcome.output_text(), "sunny in nowhere");
    }

    #[tokio::test]
    async fn unknown_function_is_not_found() {
        let runtime = DefaultFunctionRuntime::new(weather_registry());

        let error = runtime
            .execute(call("missing", "{}"), FunctionContext::new("s1"))
            .await
            .expect_err("execution should fail");

        assert_eq!(error.kind, ToolErrorKind::NotFound);
        assert_eq!(error.tool_name.as_deref(), Some("missing"));
    }

    #[tokio::test]
    async fn handler_errors_are_tagged_and_reported() {
        let hooks = Arc::new(RecordingHooks::default());
        let runtime = DefaultFunctionRuntime::new(weather_registry()).with_hooks(hooks.clone());

        let error = runtime
            .execute(call("broken", "{}"), FunctionContext::new("s1"))
            .await
            .expect_err("execution should fail");

        assert_eq!(error.kind, ToolErrorKind::Execution);
        assert_eq!(error.tool_call_id.as_deref(), Some("call_1"));
        assert!(
            hooks
                .events
                .lock()
                .expect("events lock")
                .contains(&"failure:broken:Execution".to_string())
        );
    }

    #[tokio::test]
    async fn handler_can_clear_the_loop_flag() {
        let runtime = DefaultFunctionRuntime::new(weather_registry());
        let control = LoopControl::new(true);

        runtime
            .execute(
                call("give_up", "{}"),
                FunctionContext::new("s1").with_loop_control(control.clone()),
            )
            .await
            .expect("execution should succeed");

        assert!(!control.is_enabled());
    }

    #[tokio::test]
    async fn slow_handlers_time_out() {
        let mut registry = FunctionRegistry::new();
        registry.register(FunctionSpec::new("slow"), |_, _| async move {
            Delay::new(Duration::from_secs(5)).await;
            Ok(json!("late"))
        });
        let runtime =
            DefaultFunctionRuntime::new(Arc::new(registry)).with_timeout(Duration::from_millis(10));

        let error = runtime
            .execute(call("slow", "{}"), FunctionContext::new("s1"))
            .await
            .expect_err("execution should time out");

        assert_eq!(error.kind, ToolErrorKind::Timeout);
    }
}
