//! Declared prompt chains and their executor.
//!
//! ```rust
//! use fchat::{PromptDeclarations, PromptSpec};
//!
//! let declarations = PromptDeclarations::new()
//!     .with_system_prompt("You are   a careful\n   reviewer.")
//!     .prompt(PromptSpec::fixed("List the risky changes."))
//!     .prompt(PromptSpec::new(|ctx| format!("Step {}: summarize.", ctx.step())));
//!
//! assert_eq!(declarations.system_prompt(), Some("You are a careful reviewer."));
//! assert_eq!(declarations.len(), 2);
//! assert_eq!(declarations.prompts()[0].id().len(), 8);
//! ```

use std::fmt::{Debug, Formatter};
use std::panic::Location;
use std::sync::Arc;
use std::time::Instant;

use fcommon::{BoxFuture, RequestParameters};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    ChatError, ChatOutput, CompletionOptions, NoopPromptChainHooks, PromptChainHooks,
    Transcript, Turn,
};

const PROMPT_ID_LEN: usize = 8;

pub type PromptGenerator = Arc<dyn Fn(&PromptContext<'_>) -> String + Send + Sync>;

pub type SuccessHandler =
    Arc<dyn Fn(ChatOutput, &PromptContext<'_>) -> Result<ChatOutput, ChatError> + Send + Sync>;

/// What a prompt generator can see while a chain runs.
pub struct PromptContext<'a> {
    transcript: &'a Transcript,
    step: usize,
    last_result: Option<&'a ChatOutput>,
    effective: RequestParameters,
}

impl<'a> PromptContext<'a> {
    fn capture<D>(
        driver: &'a D,
        step: usize,
        last_result: Option<&'a ChatOutput>,
        step_params: &RequestParameters,
    ) -> Self
    where
        D: ConversationDriver + ?Sized,
    {
        Self {
            transcript: driver.transcript(),
            step,
            last_result,
            effective: step_params.or(&driver.session_parameters()),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        self.transcript
    }

    /// Zero-based index of the running prompt.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Processed result of the previous prompt.
    pub fn last_result(&self) -> Option<&ChatOutput> {
        self.last_result
    }

    pub fn model(&self) -> Option<&str> {
        self.effective
            .model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
    }

    pub fn temperature(&self) -> Option<f32> {
        self.effective.temperature
    }

    pub fn max_tokens(&self) -> Option<u32> {
        self.effective.max_tokens
    }
}

#[derive(Clone)]
pub struct PromptSpec {
    id: String,
    system: Option<PromptGenerator>,
    text: PromptGenerator,
    on_success: Option<SuccessHandler>,
    params: RequestParameters,
}

impl PromptSpec {
    /// Declares a prompt. Its id is derived from the call site, so the same
    /// declaration always gets the same id.
    #[track_caller]
    pub fn new<F>(text: F) -> Self
    where
        F: Fn(&PromptContext<'_>) -> String + Send + Sync + 'static,
    {
        Self {
            id: prompt_id(Location::caller()),
            system: None,
            text: Arc::new(text),
            on_success: None,
            params: RequestParameters::default(),
        }
    }

    #[track_caller]
    pub fn fixed(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| text.clone())
    }

    pub fn with_system<F>(mut self, system: F) -> Self
    where
        F: Fn(&PromptContext<'_>) -> String + Send + Sync + 'static,
    {
        self.system = Some(Arc::new(system));
        self
    }

    pub fn on_success<F>(mut self, handler: F) -> Self
    where
        F: Fn(ChatOutput, &PromptContext<'_>) -> Result<ChatOutput, ChatError>
            + Send
            + Sync
            + 'static,
    {
        self.on_success = Some(Arc::new(handler));
        self
    }

    pub fn with_params(mut self, params: RequestParameters) -> Self {
        self.params = params;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn params(&self) -> &RequestParameters {
        &self.params
    }
}

impl Debug for PromptSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptSpec")
            .field("id", &self.id)
            .field("system", &self.system.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("params", &self.params)
            .finish()
    }
}

fn prompt_id(location: &Location<'_>) -> String {
    let source = format!(
        "{}:{}:{}",
        location.file(),
        location.line(),
        location.column()
    );
    let digest = hex::encode(Sha256::digest(source.as_bytes()));
    digest[..PROMPT_ID_LEN].to_string()
}

/// Ordered prompts declared once per conversation type.
#[derive(Debug, Clone, Default)]
pub struct PromptDeclarations {
    system_prompt: Option<String>,
    prompts: Vec<PromptSpec>,
}

impl PromptDeclarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain-level system prompt. Runs of whitespace collapse to one space.
    pub fn with_system_prompt(mut self, system_prompt: impl AsRef<str>) -> Self {
        self.system_prompt = Some(squish(system_prompt.as_ref()));
        self
    }

    pub fn prompt(mut self, spec: PromptSpec) -> Self {
        self.prompts.push(spec);
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn prompts(&self) -> &[PromptSpec] {
        &self.prompts
    }

    pub fn get(&self, id: &str) -> Option<&PromptSpec> {
        self.prompts.iter().find(|spec| spec.id == id)
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

fn squish(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The session surface a prompt chain needs.
pub trait ConversationDriver: Send {
    fn transcript(&self) -> &Transcript;

    fn push_turn(&mut self, turn: Turn) -> Result<(), ChatError>;

    /// Instance-level system prompt, if the session has one.
    fn system_prompt(&self) -> Option<&str>;

    /// Session parameters merged over the process defaults.
    fn session_parameters(&self) -> RequestParameters;

    /// Runs one completion with `step` as the prompt-step parameter layer.
    fn complete<'a>(
        &'a mut self,
        step: RequestParameters,
        options: CompletionOptions,
    ) -> BoxFuture<'a, Result<ChatOutput, ChatError>>;
}

pub struct PromptChainExecutor {
    declarations: Arc<PromptDeclarations>,
    hooks: Arc<dyn PromptChainHooks>,
}

impl PromptChainExecutor {
    pub fn new(declarations: Arc<PromptDeclarations>) -> Self {
        Self {
            declarations,
            hooks: Arc::new(NoopPromptChainHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PromptChainHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn declarations(&self) -> &PromptDeclarations {
        &self.declarations
    }

    /// Runs every declared prompt in order and returns the last processed result.
    ///
    /// `overrides.params` sits above each prompt's own parameters.
    pub async fn run<D>(
        &self,
        driver: &mut D,
        overrides: CompletionOptions,
    ) -> Result<ChatOutput, ChatError>
    where
        D: ConversationDriver + ?Sized,
    {
        if self.declarations.is_empty() {
            return Err(ChatError::no_prompts_defined());
        }

        let mut last = None;
        for (step, spec) in self.declarations.prompts().iter().enumerate() {
            self.hooks.on_step_start(step, spec.id());
            debug!(step, prompt_id = spec.id(), "running prompt step");
            let started = Instant::now();

            match self
                .run_step(driver, step, spec, last.as_ref(), overrides.clone())
                .await
            {
                Ok(output) => {
                    self.hooks
                        .on_step_finish(step, spec.id(), &output, started.elapsed());
                    last = Some(output);
                }
                Err(error) => {
                    self.hooks.on_step_failure(step, spec.id(), &error);
                    return Err(error);
                }
            }
        }

        last.ok_or_else(ChatError::no_prompts_defined)
    }

    async fn run_step<D>(
        &self,
        driver: &mut D,
        step: usize,
        spec: &PromptSpec,
        last: Option<&ChatOutput>,
        overrides: CompletionOptions,
    ) -> Result<ChatOutput, ChatError>
    where
        D: ConversationDriver + ?Sized,
    {
        let system = {
            let context = PromptContext::capture(&*driver, step, last, &spec.params);
            spec.system
                .as_ref()
                .map(|system| system(&context))
                .filter(|text| !text.trim().is_empty())
                .or_else(|| {
                    driver
                        .system_prompt()
                        .filter(|text| !text.trim().is_empty())
                        .map(str::to_string)
                })
                .or_else(|| self.declarations.system_prompt().map(str::to_string))
                .filter(|text| !text.trim().is_empty())
        };
        if let Some(system) = system {
            driver.push_turn(Turn::system(system))?;
        }

        let text = {
            let context = PromptContext::capture(&*driver, step, last, &spec.params);
            (spec.text)(&context)
        };
        driver.push_turn(Turn::user(text))?;

        let output = driver.complete(spec.params.clone(), overrides).await?;
        if let Some(reply) = output.to_text() {
            driver.push_turn(Turn::assistant(reply))?;
        }

        match &spec.on_success {
            Some(handler) => {
                let context = PromptContext::capture(&*driver, step, last, &spec.params);
                handler(output, &context)
            }
            None => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_ids_follow_the_declaration_site() {
        let specs = (0..2)
            .map(|_| PromptSpec::fixed("same site"))
            .collect::<Vec<_>>();
        let other = PromptSpec::fixed("other site");

        assert_eq!(specs[0].id(), specs[1].id());
        assert_ne!(specs[0].id(), other.id());
        assert!(specs[0].id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn declarations_keep_order_and_lookup_by_id() {
        let first = PromptSpec::fixed("first");
        let second = PromptSpec::fixed("second");
        let second_id = second.id().to_string();

        let declarations = PromptDeclarations::new().prompt(first).prompt(second);
        assert_eq!(declarations.len(), 2);
        assert!(declarations.get(&second_id).is_some());
        assert!(PromptDeclarations::new().is_empty());
    }

    #[test]
    fn system_prompt_is_squished() {
        let declarations =
            PromptDeclarations::new().with_system_prompt("  one\n\ttwo   three ");
        assert_eq!(declarations.system_prompt(), Some("one two three"));
    }
}
