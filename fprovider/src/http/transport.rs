//! Transport seam and the reqwest-based HTTP implementation.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::{ProviderError, ProviderFuture, SecretString};

use super::wire::classify_status;

pub const OPEN_ROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPEN_AI_BASE_URL: &str = "https://api.openai.com/v1";

/// Decoded `data:` payloads of a server-sent event stream.
pub type PayloadStream<'a> = Pin<Box<dyn Stream<Item = Result<Value, ProviderError>> + Send + 'a>>;

pub trait CompletionTransport: Send + Sync + std::fmt::Debug {
    fn post<'a>(&'a self, payload: Value) -> ProviderFuture<'a, Result<Value, ProviderError>>;

    fn post_stream<'a>(
        &'a self,
        payload: Value,
    ) -> ProviderFuture<'a, Result<PayloadStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    headers: Vec<(String, String)>,
}

impl HttpTransport {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: None,
            headers: Vec::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key).filter(|key| !key.is_empty());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request(&self, payload: &Value) -> RequestBuilder {
        let mut builder = self.client.post(self.endpoint()).json(payload);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose());
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    async fn send(&self, payload: &Value) -> Result<Response, ProviderError> {
        let response = self.request(payload).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(err.to_string())
    } else {
        ProviderError::transport(err.to_string())
    }
}

impl CompletionTransport for HttpTransport {
    fn post<'a>(&'a self, payload: Value) -> ProviderFuture<'a, Result<Value, ProviderError>> {
        Box::pin(async move {
            let response = self.send(&payload).await?;
            let body = response.text().await.map_err(map_reqwest_error)?;
            serde_json::from_str(&body).map_err(|err| {
                ProviderError::transport(format!("response body is not JSON: {err}"))
                    .with_body(body)
            })
        })
    }

    fn post_stream<'a>(
        &'a self,
        payload: Value,
    ) -> ProviderFuture<'a, Result<PayloadStream<'a>, ProviderError>> {
        Box::pin(async move {
            let response = self.send(&payload).await?;

            let stream = try_stream! {
                let mut chunks = response.bytes_stream();
                let mut buffer = String::new();
                let mut finished = false;

                while let Some(item) = chunks.next().await {
                    let bytes = item.map_err(map_reqwest_error)?;
                    buffer.push_str(&String::from_utf8_lossy(&bytes));

                    while let Some(newline) = buffer.find('\n') {
                        let line = buffer.drain(..=newline).collect::<String>();
                        match parse_sse_line(&line) {
                            SseLine::Data(value) => yield value,
                            SseLine::Done => {
                                finished = true;
                                break;
                            }
                            SseLine::Skip => {}
                        }
                    }

                    if finished {
                        break;
                    }
                }
            };

            Ok(Box::pin(stream) as PayloadStream<'a>)
        })
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum SseLine {
    Data(Value),
    Done,
    Skip,
}

/// Comments, keep-alives, and undecodable payloads are skipped.
pub(crate) fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };

    let payload = payload.trim();
    if payload == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str(payload) {
        Ok(value) => SseLine::Data(value),
        Err(err) => {
            tracing::debug!(error = %err, "skipping undecodable stream payload");
            SseLine::Skip
        }
    }
}
