//! Metrics-based observability hooks for backend dispatch, function execution,
//! and prompt chain steps.
//!
//! ```rust
//! use fobserve::MetricsObservabilityHooks;
//! use fprovider::ProviderOperationHooks;
//!
//! fn accepts_provider_hooks(_hooks: &dyn ProviderOperationHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_provider_hooks(&hooks);
//! ```

use std::time::Duration;

use fchat::{ChatError, ChatOutput, PromptChainHooks};
use fprovider::{ProviderError, ProviderId, ProviderOperationHooks, ToolCall};
use ftooling::{FunctionContext, FunctionOutcome, ToolError, ToolRuntimeHooks};

use crate::output_kind;

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl ProviderOperationHooks for MetricsObservabilityHooks {
    fn on_attempt_start(&self, provider: ProviderId, operation: &str, _attempt: u32) {
        metrics::counter!(
            "fconverse_provider_attempt_start_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        operation: &str,
        _attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        metrics::counter!(
            "fconverse_provider_retry_scheduled_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "fconverse_provider_retry_delay_seconds",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .record(delay.as_secs_f64());
    }

    fn on_success(&self, provider: ProviderId, operation: &str, attempts: u32) {
        metrics::counter!(
            "fconverse_provider_success_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "fconverse_provider_attempts_per_success",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }

    fn on_failure(
        &self,
        provider: ProviderId,
        operation: &str,
        attempts: u32,
        error: &ProviderError,
    ) {
        metrics::counter!(
            "fconverse_provider_failure_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind),
            "retryable" => error.retryable.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "fconverse_provider_attempts_per_failure",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }
}

impl ToolRuntimeHooks for MetricsObservabilityHooks {
    fn on_execution_start(&self, tool_call: &ToolCall, _context: &FunctionContext) {
        metrics::counter!(
            "fconverse_function_execution_start_total",
            "function_name" => tool_call.name.clone()
        )
        .increment(1);
    }

    fn on_execution_success(
        &self,
        tool_call: &ToolCall,
        context: &FunctionContext,
        _outcome: &FunctionOutcome,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "fconverse_function_execution_success_total",
            "function_name" => tool_call.name.clone()
        )
        .increment(1);
        if !context.is_looping() {
            metrics::counter!(
                "fconverse_function_loop_stopped_total",
                "function_name" => tool_call.name.clone()
            )
            .increment(1);
        }
        metrics::histogram!(
            "fconverse_function_execution_duration_seconds",
            "function_name" => tool_call.name.clone(),
            "status" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_execution_failure(
        &self,
        tool_call: &ToolCall,
        _context: &FunctionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "fconverse_function_execution_failure_total",
            "function_name" => tool_call.name.clone(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "fconverse_function_execution_duration_seconds",
            "function_name" => tool_call.name.clone(),
            "status" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }
}

impl PromptChainHooks for MetricsObservabilityHooks {
    fn on_step_start(&self, _step: usize, _prompt_id: &str) {
        metrics::counter!("fconverse_chain_step_start_total").increment(1);
    }

    fn on_step_finish(
        &self,
        _step: usize,
        _prompt_id: &str,
        output: &ChatOutput,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "fconverse_chain_step_finish_total",
            "output_kind" => output_kind(output)
        )
        .increment(1);
        metrics::histogram!(
            "fconverse_chain_step_duration_seconds",
            "status" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_step_failure(&self, _step: usize, _prompt_id: &str, error: &ChatError) {
        metrics::counter!(
            "fconverse_chain_step_failure_total",
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }
}
