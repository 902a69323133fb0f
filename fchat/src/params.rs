//! Layered request parameter resolution.
//!
//! ```rust
//! use fcommon::RequestParameters;
//! use fchat::ParameterLayers;
//!
//! let layers = ParameterLayers::new(RequestParameters::default().with_temperature(0.0))
//!     .session(RequestParameters::default().with_temperature(0.5))
//!     .call(RequestParameters::default().with_temperature(0.9));
//! assert_eq!(layers.resolve().temperature, Some(0.9));
//! ```

use fcommon::RequestParameters;

/// Call > step > session > defaults, resolved field by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterLayers {
    pub call: RequestParameters,
    pub step: RequestParameters,
    pub session: RequestParameters,
    pub defaults: RequestParameters,
}

impl ParameterLayers {
    pub fn new(defaults: RequestParameters) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    pub fn call(mut self, call: RequestParameters) -> Self {
        self.call = call;
        self
    }

    pub fn step(mut self, step: RequestParameters) -> Self {
        self.step = step;
        self
    }

    pub fn session(mut self, session: RequestParameters) -> Self {
        self.session = session;
        self
    }

    pub fn resolve(&self) -> RequestParameters {
        self.call
            .or(&self.step.or(&self.session.or(&self.defaults)))
            .without_blanks()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layers() -> ParameterLayers {
        ParameterLayers::new(RequestParameters::default().with_temperature(0.0))
            .session(RequestParameters::default().with_temperature(0.5))
            .call(RequestParameters::default().with_temperature(0.9))
    }

    #[test]
    fn call_beats_session_beats_defaults() {
        assert_eq!(layers().resolve().temperature, Some(0.9));

        let without_call = layers().call(RequestParameters::default());
        assert_eq!(without_call.resolve().temperature, Some(0.5));

        let only_defaults = without_call.session(RequestParameters::default());
        assert_eq!(only_defaults.resolve().temperature, Some(0.0));
    }

    #[test]
    fn step_sits_between_call_and_session() {
        let resolved = layers()
            .call(RequestParameters::default())
            .step(RequestParameters::default().with_temperature(0.2).with_max_tokens(50))
            .resolve();

        assert_eq!(resolved.temperature, Some(0.2));
        assert_eq!(resolved.max_tokens, Some(50));
    }

    #[test]
    fn blank_values_never_reach_the_result() {
        let resolved = ParameterLayers::new(RequestParameters::default())
            .call(RequestParameters {
                model: Some(String::new()),
                ..RequestParameters::default()
            })
            .resolve();

        assert_eq!(resolved.model, None);
        assert!(resolved.is_empty());
    }
}
