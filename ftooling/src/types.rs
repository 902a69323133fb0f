//! Execution context handed to function handlers and the outcome they produce.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fcommon::{MetadataMap, SessionId};
use serde_json::Value;

use crate::coerce_output;

/// Shared flag deciding whether the dispatch loop re-requests after a function call.
#[derive(Debug, Clone, Default)]
pub struct LoopControl {
    enabled: Arc<AtomicBool>,
}

impl LoopControl {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.set(false);
    }
}

#[derive(Debug, Clone)]
pub struct FunctionContext {
    pub session_id: SessionId,
    pub call_id: String,
    pub function_name: String,
    pub metadata: MetadataMap,
    loop_control: LoopControl,
}

impl FunctionContext {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            call_id: String::new(),
            function_name: String::new(),
            metadata: MetadataMap::new(),
            loop_control: LoopControl::default(),
        }
    }

    pub fn for_call(
        mut self,
        function_name: impl Into<String>,
        call_id: impl Into<String>,
    ) -> Self {
        self.function_name = function_name.into();
        self.call_id = call_id.into();
        self
    }

    pub fn with_loop_control(mut self, loop_control: LoopControl) -> Self {
        self.loop_control = loop_control;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Asks the dispatch loop not to re-request after this call returns.
    pub fn stop_looping(&self) {
        self.loop_control.stop();
    }

    pub fn is_looping(&self) -> bool {
        self.loop_control.is_enabled()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionOutcome {
    pub call_id: String,
    pub name: String,
    pub output: Value,
}

impl FunctionOutcome {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, output: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            output,
        }
    }

    pub fn output_text(&self) -> String {
        coerce_output(&self.output)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn stop_looping_is_visible_through_shared_control() {
        let control = LoopControl::new(true);
        let context = FunctionContext::new("session-1")
            .for_call("check_weather", "call_1")
            .with_loop_control(control.clone());

        assert!(context.is_looping());
        context.stop_looping();
        assert!(!control.is_enabled());
    }

    #[test]
    fn outcome_text_uses_coerced_output() {
        let outcome = FunctionOutcome::new("call_1", "f", json!({"ok": true}));
        assert_eq!(outcome.output_text(), "{\"ok\":true}");
    }
}
