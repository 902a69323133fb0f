//! Lifecycle hooks around prompt chain steps.

use std::time::Duration;

use crate::{ChatError, ChatOutput};

pub trait PromptChainHooks: Send + Sync {
    fn on_step_start(&self, _step: usize, _prompt_id: &str) {}

    fn on_step_finish(
        &self,
        _step: usize,
        _prompt_id: &str,
        _output: &ChatOutput,
        _elapsed: Duration,
    ) {
    }

    fn on_step_failure(&self, _step: usize, _prompt_id: &str, _error: &ChatError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPromptChainHooks;

impl PromptChainHooks for NoopPromptChainHooks {}
