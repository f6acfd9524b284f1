//! Wire-format strategies.
//!
//! Every provider in the registry names one [`WireFormat`]; the matching
//! [`WireProtocol`] knows how to shape the request body, pick the auth header, pull text
//! out of a buffered response and decode one streamed line. Adding a vendor that speaks
//! an existing format only needs a registry row.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::LLMError;
use crate::registry::WireFormat;
use crate::stream::Framing;
use crate::types::CompletionRequest;

pub mod anthropic_messages;
pub mod cohere_chat;
mod error;
pub mod openai_compatible;

pub(crate) use error::http_error;

use anthropic_messages::AnthropicMessagesProtocol;
use cohere_chat::CohereChatProtocol;
use openai_compatible::OpenAiCompatibleProtocol;

/// Result of decoding one payload line of a streaming body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// A non-empty fragment of generated text.
    Text(String),
    /// Explicit end-of-stream marker.
    Done,
    /// Anything else: other event types, keep-alives, malformed JSON.
    Skip,
}

/// How a credential is attached to outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>` with no prefix.
    ApiKeyHeader,
}

impl AuthScheme {
    pub(crate) fn header(self, api_key: &SecretString) -> (String, String) {
        match self {
            AuthScheme::Bearer => (
                "Authorization".to_string(),
                format!("Bearer {}", api_key.expose_secret()),
            ),
            AuthScheme::ApiKeyHeader => {
                ("x-api-key".to_string(), api_key.expose_secret().to_string())
            }
        }
    }
}

/// Request/response rules for one wire format.
pub trait WireProtocol: Send + Sync {
    /// Short name used in logs and parse errors.
    fn name(&self) -> &'static str;

    fn auth_scheme(&self) -> AuthScheme;

    /// Line framing of the streaming body.
    fn framing(&self) -> Framing;

    /// Builds the JSON body for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] when the conversation cannot be expressed in this
    /// format.
    fn build_body(
        &self,
        request: &CompletionRequest<'_>,
        default_max_tokens: u32,
    ) -> Result<Value, LLMError>;

    /// Extracts the completion text from a buffered 2xx body.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Parse`] when the body is not the vendor's JSON shape.
    fn parse_response(&self, provider: &str, body: &str) -> Result<String, LLMError>;

    /// Decodes one payload line produced by [`crate::stream::LineDecoder`].
    fn decode_stream_line(&self, line: &str) -> StreamItem;
}

static OPENAI_COMPATIBLE: OpenAiCompatibleProtocol = OpenAiCompatibleProtocol;
static ANTHROPIC_MESSAGES: AnthropicMessagesProtocol = AnthropicMessagesProtocol;
static COHERE_CHAT: CohereChatProtocol = CohereChatProtocol;

impl WireFormat {
    /// Strategy implementing this wire format.
    pub fn protocol(self) -> &'static dyn WireProtocol {
        match self {
            WireFormat::OpenAiCompatible => &OPENAI_COMPATIBLE,
            WireFormat::Anthropic => &ANTHROPIC_MESSAGES,
            WireFormat::Cohere => &COHERE_CHAT,
        }
    }
}

/// Content type, credential and the descriptor's extra headers, in that order.
pub(crate) fn build_headers(
    protocol: &dyn WireProtocol,
    request: &CompletionRequest<'_>,
) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    let (name, value) = protocol.auth_scheme().header(&request.api_key);
    headers.insert(name, value);
    for (name, value) in request.provider.extra_headers {
        headers.insert((*name).to_string(), (*value).to_string());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProviderRegistry;
    use crate::types::ConversationMessage;

    fn request_for<'a>(
        id: &str,
        messages: &'a [ConversationMessage],
    ) -> CompletionRequest<'a> {
        let provider = ProviderRegistry::builtin().get(id).expect("provider");
        CompletionRequest {
            provider,
            api_key: SecretString::from("key-123".to_string()),
            model: provider.default_model.to_string(),
            messages,
            stream: false,
            max_tokens: None,
        }
    }

    #[test]
    fn anthropic_uses_x_api_key_without_bearer() {
        let messages = vec![ConversationMessage::user("hi")];
        let request = request_for("anthropic", &messages);
        let headers = build_headers(request.provider.wire_format.protocol(), &request);

        assert_eq!(headers.get("x-api-key").map(String::as_str), Some("key-123"));
        assert_eq!(
            headers.get("anthropic-version").map(String::as_str),
            Some("2023-06-01")
        );
        assert!(!headers.contains_key("Authorization"));
    }

    #[test]
    fn bearer_providers_send_authorization_header() {
        let messages = vec![ConversationMessage::user("hi")];
        for id in ["openrouter", "groq", "openai", "together", "cohere", "deepinfra", "xai"] {
            let request = request_for(id, &messages);
            let headers = build_headers(request.provider.wire_format.protocol(), &request);
            assert_eq!(
                headers.get("Authorization").map(String::as_str),
                Some("Bearer key-123"),
                "{id}"
            );
            assert!(!headers.contains_key("x-api-key"), "{id}");
            assert_eq!(
                headers.get("Content-Type").map(String::as_str),
                Some("application/json")
            );
        }
    }

    #[test]
    fn protocol_names_match_wire_formats() {
        assert_eq!(WireFormat::OpenAiCompatible.protocol().name(), "openai_compatible");
        assert_eq!(WireFormat::Anthropic.protocol().name(), "anthropic_messages");
        assert_eq!(WireFormat::Cohere.protocol().name(), "cohere_chat");
    }
}
