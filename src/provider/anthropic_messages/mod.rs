//! Anthropic Messages API (`/v1/messages`).

use serde_json::Value;
use tracing::{trace, warn};

use crate::error::LLMError;
use crate::stream::Framing;
use crate::types::CompletionRequest;

use super::{AuthScheme, StreamItem, WireProtocol};

mod request;
mod types;

use request::build_anthropic_body;
use types::{AnthropicMessageResponse, AnthropicStreamEvent};

/// Strategy for [`crate::registry::WireFormat::Anthropic`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AnthropicMessagesProtocol;

impl WireProtocol for AnthropicMessagesProtocol {
    fn name(&self) -> &'static str {
        "anthropic_messages"
    }

    fn auth_scheme(&self) -> AuthScheme {
        AuthScheme::ApiKeyHeader
    }

    fn framing(&self) -> Framing {
        Framing::SseData
    }

    fn build_body(
        &self,
        request: &CompletionRequest<'_>,
        default_max_tokens: u32,
    ) -> Result<Value, LLMError> {
        serde_json::to_value(build_anthropic_body(request, default_max_tokens)).map_err(|err| {
            LLMError::Validation {
                message: format!("failed to serialize request: {err}"),
            }
        })
    }

    fn parse_response(&self, provider: &str, body: &str) -> Result<String, LLMError> {
        let parsed: AnthropicMessageResponse =
            serde_json::from_str(body).map_err(|err| LLMError::parse(provider, err.to_string()))?;
        Ok(parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect())
    }

    fn decode_stream_line(&self, line: &str) -> StreamItem {
        let event: AnthropicStreamEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(err) => {
                trace!(error = %err, "skipping malformed stream event");
                return StreamItem::Skip;
            }
        };
        match event.kind.as_str() {
            "content_block_delta" => match event.delta.and_then(|delta| delta.text) {
                Some(text) if !text.is_empty() => StreamItem::Text(text),
                _ => StreamItem::Skip,
            },
            "message_stop" => StreamItem::Done,
            "error" => {
                let error = event.error;
                warn!(
                    kind = error.as_ref().and_then(|e| e.kind.as_deref()).unwrap_or("unknown"),
                    message = error.as_ref().and_then(|e| e.message.as_deref()).unwrap_or(""),
                    "anthropic stream reported an error event"
                );
                StreamItem::Skip
            }
            _ => StreamItem::Skip,
        }
    }
}
