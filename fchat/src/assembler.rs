//! Transcript + parameter layers → one backend request.

use fcommon::ResponseFormat;
use fprovider::ModelRequest;
use ftooling::FunctionRegistry;
use serde_json::Value;

use crate::{ChatError, DEFAULT_MODEL, ParameterLayers, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Text,
    /// Structured output: the reply must be a JSON document.
    Json,
}

/// Builds the effective request for one completion.
///
/// JSON mode forces `provider.require_parameters` and a `json_object` response
/// format on the returned request only; `layers` are left as they were.
pub fn assemble_request(
    transcript: &Transcript,
    functions: Option<&FunctionRegistry>,
    layers: &ParameterLayers,
    mode: ResponseMode,
) -> Result<ModelRequest, ChatError> {
    if transcript.is_empty() {
        return Err(ChatError::empty_transcript());
    }

    let mut parameters = layers.resolve();
    if mode == ResponseMode::Json {
        parameters = parameters
            .with_provider_hint("require_parameters", Value::Bool(true))
            .with_response_format(ResponseFormat::JsonObject);
    }

    let model = parameters
        .model
        .take()
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let tools = functions
        .filter(|registry| !registry.is_empty())
        .map(FunctionRegistry::definitions)
        .unwrap_or_default();

    let request = ModelRequest::builder(model)
        .messages(transcript.to_messages())
        .tools(tools)
        .parameters(parameters)
        .build()
        .map_err(|error| ChatError::invalid_request(error.message))?;

    Ok(request)
}

#[cfg(test)]
mod tests {
    use fcommon::RequestParameters;
    use fprovider::Role;
    use ftooling::FunctionSpec;
    use serde_json::json;

    use super::*;
    use crate::{ChatErrorKind, Turn};

    fn transcript() -> Transcript {
        Transcript::from_turns([Turn::system("be brief"), Turn::user("hi")]).expect("turns")
    }

    #[test]
    fn empty_transcript_is_rejected() {
        let error = assemble_request(
            &Transcript::new(),
            None,
            &ParameterLayers::default(),
            ResponseMode::Text,
        )
        .expect_err("empty transcript must fail");

        assert_eq!(error.kind, ChatErrorKind::EmptyTranscript);
    }

    #[test]
    fn resolves_parameters_and_falls_back_to_default_model() {
        let layers = ParameterLayers::new(RequestParameters::default().with_max_tokens(10))
            .call(RequestParameters::default().with_temperature(0.9));

        let request =
            assemble_request(&transcript(), None, &layers, ResponseMode::Text).expect("request");

        assert_eq!(request.model, DEFAULT_MODEL);
        assert_eq!(request.parameters.model, None);
        assert_eq!(request.parameters.temperature, Some(0.9));
        assert_eq!(request.parameters.max_tokens, Some(10));
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.tools.is_empty());
    }

    #[test]
    fn json_mode_forces_structured_output_hints() {
        let layers = ParameterLayers::default()
            .session(RequestParameters::default().with_model("openai/gpt-4o"));

        let request =
            assemble_request(&transcript(), None, &layers, ResponseMode::Json).expect("request");

        assert_eq!(request.model, "openai/gpt-4o");
        assert_eq!(
            request.parameters.response_format,
            Some(ResponseFormat::JsonObject)
        );
        let provider = request.parameters.provider.expect("provider hints");
        assert_eq!(provider.get("require_parameters"), Some(&json!(true)));
        assert_eq!(layers.session.response_format, None);
    }

    #[test]
    fn non_empty_registry_attaches_tool_declarations() {
        let mut registry = FunctionRegistry::new();
        registry.register_sync(
            FunctionSpec::new("check_weather")
                .with_property("location", json!({"type": "string"})),
            |_args, _ctx| Ok(json!("sunny")),
        );

        let request = assemble_request(
            &transcript(),
            Some(&registry),
            &ParameterLayers::default(),
            ResponseMode::Text,
        )
        .expect("request");

        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.tools[0].name, "check_weather");

        let empty = FunctionRegistry::new();
        let request = assemble_request(
            &transcript(),
            Some(&empty),
            &ParameterLayers::default(),
            ResponseMode::Text,
        )
        .expect("request");
        assert!(request.tools.is_empty());
    }
}
