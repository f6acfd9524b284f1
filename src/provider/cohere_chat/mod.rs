//! Cohere Chat v1 (`/v1/chat`), streamed as newline-delimited JSON.

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::LLMError;
use crate::stream::Framing;
use crate::types::{CompletionRequest, ConversationMessage, Role};

use super::{AuthScheme, StreamItem, WireProtocol};

mod types;

use types::{CohereChatBody, CohereChatResponse, CohereHistoryEntry, CohereRole, CohereStreamEvent};

/// Strategy for [`crate::registry::WireFormat::Cohere`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CohereChatProtocol;

fn cohere_role(role: Role) -> CohereRole {
    match role {
        Role::Assistant => CohereRole::Chatbot,
        // v1 chat has no system speaker, so system turns ride along as user turns.
        Role::System | Role::User => CohereRole::User,
    }
}

fn history_entry(message: &ConversationMessage) -> CohereHistoryEntry<'_> {
    CohereHistoryEntry {
        role: cohere_role(message.role),
        message: &message.content,
    }
}

impl WireProtocol for CohereChatProtocol {
    fn name(&self) -> &'static str {
        "cohere_chat"
    }

    fn auth_scheme(&self) -> AuthScheme {
        AuthScheme::Bearer
    }

    fn framing(&self) -> Framing {
        Framing::JsonLines
    }

    fn build_body(
        &self,
        request: &CompletionRequest<'_>,
        _default_max_tokens: u32,
    ) -> Result<Value, LLMError> {
        let (last, history) = request
            .messages
            .split_last()
            .ok_or_else(|| LLMError::Validation {
                message: "Cohere chat requires at least one message".to_string(),
            })?;
        let body = CohereChatBody {
            model: &request.model,
            message: &last.content,
            chat_history: history.iter().map(history_entry).collect(),
            stream: request.stream,
            max_tokens: request.max_tokens,
        };
        serde_json::to_value(body).map_err(|err| LLMError::Validation {
            message: format!("failed to serialize request: {err}"),
        })
    }

    fn parse_response(&self, provider: &str, body: &str) -> Result<String, LLMError> {
        let parsed: CohereChatResponse =
            serde_json::from_str(body).map_err(|err| LLMError::parse(provider, err.to_string()))?;
        Ok(parsed.text.unwrap_or_default())
    }

    fn decode_stream_line(&self, line: &str) -> StreamItem {
        let event: CohereStreamEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(err) => {
                trace!(error = %err, "skipping malformed stream line");
                return StreamItem::Skip;
            }
        };
        match event.event_type.as_str() {
            "text-generation" => match event.text {
                Some(text) if !text.is_empty() => StreamItem::Text(text),
                _ => StreamItem::Skip,
            },
            "stream-end" => {
                debug!(finish_reason = ?event.finish_reason, "cohere stream ended");
                StreamItem::Done
            }
            _ => StreamItem::Skip,
        }
    }
}
