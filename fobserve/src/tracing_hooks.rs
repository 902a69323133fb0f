//! Tracing-based observability hooks for backend dispatch, function execution,
//! and prompt chain steps.
//!
//! ```rust
//! use fobserve::TracingObservabilityHooks;
//! use fchat::PromptChainHooks;
//!
//! fn accepts_chain_hooks(_hooks: &dyn PromptChainHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_chain_hooks(&hooks);
//! ```

use std::time::Duration;

use fchat::{ChatError, ChatOutput, PromptChainHooks};
use fprovider::{ProviderError, ProviderId, ProviderOperationHooks, ToolCall};
use ftooling::{FunctionContext, FunctionOutcome, ToolError, ToolRuntimeHooks};

use crate::output_kind;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ProviderOperationHooks for TracingObservabilityHooks {
    fn on_attempt_start(&self, provider: ProviderId, operation: &str, attempt: u32) {
        tracing::debug!(
            phase = "provider",
            event = "attempt_start",
            provider = %provider,
            operation,
            attempt
        );
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        operation: &str,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        tracing::warn!(
            phase = "provider",
            event = "retry_scheduled",
            provider = %provider,
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error_kind = ?error.kind,
            status = error.status,
            retryable = error.retryable,
            error = %error
        );
    }

    fn on_success(&self, provider: ProviderId, operation: &str, attempts: u32) {
        tracing::debug!(
            phase = "provider",
            event = "success",
            provider = %provider,
            operation,
            attempts
        );
    }

    fn on_failure(
        &self,
        provider: ProviderId,
        operation: &str,
        attempts: u32,
        error: &ProviderError,
    ) {
        tracing::error!(
            phase = "provider",
            event = "failure",
            provider = %provider,
            operation,
            attempts,
            error_kind = ?error.kind,
            status = error.status,
            body = error.body.as_deref(),
            retryable = error.retryable,
            error = %error
        );
    }
}

impl ToolRuntimeHooks for TracingObservabilityHooks {
    fn on_execution_start(&self, tool_call: &ToolCall, context: &FunctionContext) {
        tracing::info!(
            phase = "function",
            event = "execution_start",
            function_name = tool_call.name,
            call_id = context.call_id,
            session_id = %context.session_id,
            arguments = tool_call.arguments
        );
    }

    fn on_execution_success(
        &self,
        tool_call: &ToolCall,
        context: &FunctionContext,
        _outcome: &FunctionOutcome,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "function",
            event = "execution_success",
            function_name = tool_call.name,
            call_id = context.call_id,
            session_id = %context.session_id,
            loop_continues = context.is_looping(),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_execution_failure(
        &self,
        tool_call: &ToolCall,
        context: &FunctionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "function",
            event = "execution_failure",
            function_name = tool_call.name,
            call_id = context.call_id,
            session_id = %context.session_id,
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            error = %error
        );
    }
}

impl PromptChainHooks for TracingObservabilityHooks {
    fn on_step_start(&self, step: usize, prompt_id: &str) {
        tracing::info!(phase = "chain", event = "step_start", step, prompt_id);
    }

    fn on_step_finish(&self, step: usize, prompt_id: &str, output: &ChatOutput, elapsed: Duration) {
        tracing::info!(
            phase = "chain",
            event = "step_finish",
            step,
            prompt_id,
            output_kind = output_kind(output),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_step_failure(&self, step: usize, prompt_id: &str, error: &ChatError) {
        tracing::error!(
            phase = "chain",
            event = "step_failure",
            step,
            prompt_id,
            error_kind = ?error.kind,
            status = error.status,
            error = %error
        );
    }
}
