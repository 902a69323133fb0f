mod support;

use std::sync::Arc;
use std::time::Duration;

use fchat::DEFAULT_MODEL;
use fchat::prelude::*;
use fprovider::ProviderError;

use support::{RecordingSleeper, ScriptedProvider, dispatcher, text};

fn overloaded() -> Result<fprovider::ModelResponse, ProviderError> {
    Err(ProviderError::server(502, "upstream overloaded"))
}

fn session(provider: &Arc<ScriptedProvider>) -> (ChatSession, Arc<RecordingSleeper>) {
    let (dispatcher, sleeper) = dispatcher(provider);
    let mut session = ChatSession::builder(dispatcher).build();
    session.push(Turn::user("hello")).expect("user turn");
    (session, sleeper)
}

#[tokio::test]
async fn four_transient_failures_then_success() {
    let provider = ScriptedProvider::new(vec![
        overloaded(),
        overloaded(),
        overloaded(),
        overloaded(),
        Ok(text("finally")),
    ]);
    let (mut session, sleeper) = session(&provider);

    let output = session
        .chat_completion(CompletionOptions::new())
        .await
        .expect("fifth attempt succeeds");

    assert_eq!(output.as_text(), Some("finally"));
    assert_eq!(provider.request_count(), 5);
    assert_eq!(
        sleeper.delays(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3),
            Duration::from_secs(4),
        ]
    );
}

#[tokio::test]
async fn five_transient_failures_exhaust_the_policy() {
    let provider = ScriptedProvider::new(vec![
        overloaded(),
        overloaded(),
        overloaded(),
        overloaded(),
        overloaded(),
        Ok(text("too late")),
    ]);
    let (mut session, sleeper) = session(&provider);

    let error = session
        .chat_completion(CompletionOptions::new())
        .await
        .expect_err("policy exhausted");

    assert_eq!(error.kind, ChatErrorKind::TransientBackend);
    assert_eq!(error.status, Some(502));
    assert_eq!(provider.request_count(), 5);
    assert_eq!(sleeper.delays().len(), 4);
}

#[tokio::test]
async fn retry_hint_in_message_makes_client_errors_retryable() {
    let provider = ScriptedProvider::new(vec![
        Err(ProviderError::invalid_request("Provider busy, please retry").honor_retry_hint()),
        Ok(text("recovered")),
    ]);
    let (mut session, sleeper) = session(&provider);

    let output = session
        .chat_completion(CompletionOptions::new())
        .await
        .expect("retried");

    assert_eq!(output.as_text(), Some("recovered"));
    assert_eq!(sleeper.delays(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn empty_transcript_never_reaches_the_backend() {
    let provider = ScriptedProvider::new(vec![Ok(text("unused"))]);
    let (dispatcher, _) = dispatcher(&provider);
    let mut session = ChatSession::builder(dispatcher).build();

    let error = session
        .chat_completion(CompletionOptions::new())
        .await
        .expect_err("empty transcript");

    assert_eq!(error.kind, ChatErrorKind::EmptyTranscript);
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn call_session_and_default_temperatures_layer_in_order() {
    let provider = ScriptedProvider::new(vec![
        Ok(text("one")),
        Ok(text("two")),
        Ok(text("three")),
    ]);
    let (dispatcher, _) = dispatcher(&provider);
    let defaults = Arc::new(ChatDefaults::default().with_temperature(0.0));
    let mut session = ChatSession::builder(dispatcher)
        .defaults(defaults)
        .parameters(RequestParameters::default().with_temperature(0.5))
        .build();
    session.push(Turn::user("hi")).expect("user turn");

    session
        .chat_completion(
            CompletionOptions::new()
                .with_params(RequestParameters::default().with_temperature(0.9)),
        )
        .await
        .expect("call layer");
    session
        .chat_completion(CompletionOptions::new())
        .await
        .expect("session layer");
    session.set_parameters(RequestParameters::default());
    session
        .chat_completion(CompletionOptions::new())
        .await
        .expect("defaults layer");

    let temperatures = provider
        .requests()
        .iter()
        .map(|request| request.parameters.temperature)
        .collect::<Vec<_>>();
    assert_eq!(temperatures, vec![Some(0.9), Some(0.5), Some(0.0)]);

    let requests = provider.requests();
    let request = &requests[2];
    assert_eq!(request.model, DEFAULT_MODEL);
    assert_eq!(request.parameters.max_tokens, Some(1000));
    assert_eq!(request.parameters.top_p, None);
}
