//! Production-friendly observability hooks for backend dispatch, function
//! execution, and prompt chain steps.
//!
//! ```rust
//! use fobserve::{MetricsObservabilityHooks, SafeProviderHooks, TracingObservabilityHooks};
//!
//! let _provider_hooks = SafeProviderHooks::new(TracingObservabilityHooks);
//! let _metrics = MetricsObservabilityHooks;
//! ```

mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsObservabilityHooks;
pub use safe_hooks::{SafeChainHooks, SafeProviderHooks, SafeToolHooks};
pub use tracing_hooks::TracingObservabilityHooks;

pub mod prelude {
    pub use crate::{
        MetricsObservabilityHooks, SafeChainHooks, SafeProviderHooks, SafeToolHooks,
        TracingObservabilityHooks,
    };
}

pub(crate) fn output_kind(output: &fchat::ChatOutput) -> &'static str {
    match output {
        fchat::ChatOutput::Text(_) => "text",
        fchat::ChatOutput::Json(_) => "json",
        fchat::ChatOutput::Raw(_) => "raw",
        fchat::ChatOutput::Function { .. } => "function",
        fchat::ChatOutput::Empty => "empty",
    }
}
