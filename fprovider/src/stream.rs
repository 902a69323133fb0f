//! Streaming event contracts and buffering helpers.
//!
//! ```rust
//! use fprovider::{ProviderId, StreamAccumulator, StreamEvent};
//!
//! let mut buffer = StreamAccumulator::new(ProviderId::OpenRouter, "demo-model");
//! buffer.push(&StreamEvent::TextDelta("hel".into()));
//! buffer.push(&StreamEvent::TextDelta("lo".into()));
//! assert_eq!(buffer.finish().text(), "hello");
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::{
    Message, ModelResponse, OutputItem, ProviderError, ProviderId, StopReason, TokenUsage,
    ToolCall,
};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    /// Latest accumulated state of one tool call; the same id may repeat.
    ToolCallDelta(ToolCall),
    MessageComplete(Message),
    ResponseComplete(ModelResponse),
}

/// Backend stream contract.
///
/// Invariants for consumers:
/// - Events are emitted in source order.
/// - `TextDelta` and `ToolCallDelta` may appear zero or more times.
/// - `MessageComplete` and `ResponseComplete` are terminal milestones and, when present,
///   arrive after all related deltas.
/// - Once the stream yields `None`, it must not yield additional items.
pub trait ModelEventStream: Stream<Item = Result<StreamEvent, ProviderError>> + Send {}

impl<T> ModelEventStream for T where T: Stream<Item = Result<StreamEvent, ProviderError>> + Send {}

pub type BoxedEventStream<'a> = Pin<Box<dyn ModelEventStream + 'a>>;

#[derive(Debug)]
pub struct VecEventStream {
    events: VecDeque<Result<StreamEvent, ProviderError>>,
}

impl VecEventStream {
    pub fn new(events: Vec<Result<StreamEvent, ProviderError>>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

impl Stream for VecEventStream {
    type Item = Result<StreamEvent, ProviderError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<StreamEvent, ProviderError>>> {
        Poll::Ready(self.events.pop_front())
    }
}

/// Folds stream events into a single response.
///
/// A `ResponseComplete` event replaces whatever was buffered from deltas.
#[derive(Debug, Clone)]
pub struct StreamAccumulator {
    provider: ProviderId,
    model: String,
    text: String,
    tool_calls: Vec<ToolCall>,
    completed: Option<ModelResponse>,
}

impl StreamAccumulator {
    pub fn new(provider: ProviderId, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            text: String::new(),
            tool_calls: Vec::new(),
            completed: None,
        }
    }

    pub fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta(delta) => self.text.push_str(delta),
            StreamEvent::ToolCallDelta(call) => {
                match self.tool_calls.iter_mut().find(|known| known.id == call.id) {
                    Some(known) => *known = call.clone(),
                    None => self.tool_calls.push(call.clone()),
                }
            }
            StreamEvent::MessageComplete(message) => {
                self.text = message.content.clone();
                self.tool_calls = message.tool_calls.clone();
            }
            StreamEvent::ResponseComplete(response) => self.completed = Some(response.clone()),
        }
    }

    /// True when neither text nor tool calls were received.
    pub fn is_empty(&self) -> bool {
        match &self.completed {
            Some(response) => response.output.is_empty(),
            None => self.text.is_empty() && self.tool_calls.is_empty(),
        }
    }

    pub fn finish(self) -> ModelResponse {
        if let Some(response) = self.completed {
            return response;
        }

        let mut output = Vec::new();
        if !self.text.is_empty() {
            output.push(OutputItem::Message(Message::assistant(self.text)));
        }
        let stop_reason = if self.tool_calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        };
        output.extend(self.tool_calls.into_iter().map(OutputItem::ToolCall));

        ModelResponse {
            provider: self.provider,
            model: self.model,
            output,
            stop_reason,
            usage: TokenUsage::default(),
            raw: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[tokio::test]
    async fn vec_event_stream_yields_events_in_order() {
        let mut stream = VecEventStream::new(vec![
            Ok(StreamEvent::TextDelta("one".into())),
            Ok(StreamEvent::TextDelta("two".into())),
        ]);

        assert_eq!(
            stream.next().await,
            Some(Ok(StreamEvent::TextDelta("one".into())))
        );
        assert_eq!(
            stream.next().await,
            Some(Ok(StreamEvent::TextDelta("two".into())))
        );
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn accumulator_merges_repeated_tool_call_deltas() {
        let mut buffer = StreamAccumulator::new(ProviderId::OpenAi, "m");
        buffer.push(&StreamEvent::ToolCallDelta(ToolCall::new("c1", "lookup", "{\"q\"")));
        buffer.push(&StreamEvent::ToolCallDelta(ToolCall::new(
            "c1",
            "lookup",
            "{\"q\":1}",
        )));

        let response = buffer.finish();
        assert_eq!(response.stop_reason, StopReason::ToolUse);
        let calls = response.tool_calls().collect::<Vec<_>>();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, "{\"q\":1}");
    }

    #[test]
    fn accumulator_reports_empty_when_nothing_was_buffered() {
        let buffer = StreamAccumulator::new(ProviderId::OpenRouter, "m");
        assert!(buffer.is_empty());
        assert!(buffer.finish().output.is_empty());
    }
}
