//! Backend construction from endpoint settings.

use std::sync::Arc;

use fprovider::{ModelProvider, ProviderError, ProviderId, ProviderRegistry, default_policy};
#[cfg(feature = "http")]
use fprovider::http::{
    HttpTransport, OPEN_AI_BASE_URL, OPEN_ROUTER_BASE_URL, OpenAiCompatibleProvider,
};

use crate::settings::{EndpointSettings, Settings};

pub const OPEN_ROUTER_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const OPEN_AI_KEY_ENV: &str = "OPENAI_API_KEY";

pub fn parse_provider_id(value: &str) -> Option<ProviderId> {
    match value.trim().to_ascii_lowercase().as_str() {
        "openrouter" | "open-router" | "open_router" | "routed" => Some(ProviderId::OpenRouter),
        "openai" | "open-ai" | "direct" => Some(ProviderId::OpenAi),
        _ => None,
    }
}

fn key_env(provider_id: ProviderId) -> &'static str {
    match provider_id {
        ProviderId::OpenRouter => OPEN_ROUTER_KEY_ENV,
        ProviderId::OpenAi => OPEN_AI_KEY_ENV,
    }
}

#[cfg(feature = "http")]
pub fn build_provider(
    provider_id: ProviderId,
    endpoint: &EndpointSettings,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    let api_key = endpoint.api_key_or_env(key_env(provider_id)).ok_or_else(|| {
        ProviderError::authentication(format!(
            "no API key configured for {provider_id} (set {})",
            key_env(provider_id)
        ))
    })?;

    let http = reqwest::Client::builder()
        .timeout(endpoint.timeout())
        .build()
        .map_err(|err| ProviderError::transport(err.to_string()))?;

    let base_url = match provider_id {
        ProviderId::OpenRouter => OPEN_ROUTER_BASE_URL,
        ProviderId::OpenAi => OPEN_AI_BASE_URL,
    };
    let mut transport = HttpTransport::new(http, endpoint.base_url.as_deref().unwrap_or(base_url))
        .with_api_key(api_key);
    if provider_id == ProviderId::OpenRouter
        && let Some(app_name) = endpoint
            .app_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    {
        transport = transport.with_header("X-Title", app_name);
    }

    Ok(Arc::new(OpenAiCompatibleProvider::new(
        provider_id,
        Arc::new(transport),
    )))
}

#[cfg(not(feature = "http"))]
pub fn build_provider(
    _provider_id: ProviderId,
    _endpoint: &EndpointSettings,
) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    Err(ProviderError::invalid_request(
        "http feature is not enabled on fconverse",
    ))
}

/// Registers every backend that has an API key available. The routed
/// backend is required; the direct backend is skipped when unconfigured.
pub fn build_provider_registry(settings: &Settings) -> Result<ProviderRegistry, ProviderError> {
    let mut registry = ProviderRegistry::new();

    let routed = build_provider(ProviderId::OpenRouter, &settings.openrouter)?;
    registry.register_shared(routed, default_policy(ProviderId::OpenRouter));

    if settings
        .openai
        .api_key_or_env(key_env(ProviderId::OpenAi))
        .is_some()
    {
        let direct = build_provider(ProviderId::OpenAi, &settings.openai)?;
        registry.register_shared(direct, default_policy(ProviderId::OpenAi));
    } else {
        tracing::debug!(provider = %ProviderId::OpenAi, "direct backend not configured");
    }

    Ok(registry)
}
