//! OpenAI Chat Completions shape, shared by OpenAI, OpenRouter, Groq, Together,
//! DeepInfra and xAI.

use serde_json::Value;
use tracing::trace;

use crate::error::LLMError;
use crate::stream::Framing;
use crate::types::CompletionRequest;

use super::{AuthScheme, StreamItem, WireProtocol};

mod types;

use types::{OpenAiChatBody, OpenAiChatResponse, OpenAiStreamChunk};

const DONE_MARKER: &str = "[DONE]";

/// Strategy for [`crate::registry::WireFormat::OpenAiCompatible`].
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiCompatibleProtocol;

impl WireProtocol for OpenAiCompatibleProtocol {
    fn name(&self) -> &'static str {
        "openai_compatible"
    }

    fn auth_scheme(&self) -> AuthScheme {
        AuthScheme::Bearer
    }

    fn framing(&self) -> Framing {
        Framing::SseData
    }

    fn build_body(
        &self,
        request: &CompletionRequest<'_>,
        _default_max_tokens: u32,
    ) -> Result<Value, LLMError> {
        let body = OpenAiChatBody {
            model: &request.model,
            messages: request.messages,
            stream: request.stream,
            max_tokens: request.max_tokens,
        };
        serde_json::to_value(body).map_err(|err| LLMError::Validation {
            message: format!("failed to serialize request: {err}"),
        })
    }

    fn parse_response(&self, provider: &str, body: &str) -> Result<String, LLMError> {
        let parsed: OpenAiChatResponse =
            serde_json::from_str(body).map_err(|err| LLMError::parse(provider, err.to_string()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }

    fn decode_stream_line(&self, line: &str) -> StreamItem {
        if line == DONE_MARKER {
            return StreamItem::Done;
        }
        let chunk: OpenAiStreamChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(err) => {
                trace!(error = %err, "skipping malformed stream chunk");
                return StreamItem::Skip;
            }
        };
        match chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
        {
            Some(text) if !text.is_empty() => StreamItem::Text(text),
            _ => StreamItem::Skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::registry::ProviderRegistry;
    use crate::types::ConversationMessage;

    #[test]
    fn body_passes_messages_through_verbatim() {
        let messages = vec![
            ConversationMessage::system("Be brief."),
            ConversationMessage::user("Hi"),
            ConversationMessage::assistant("Hello!"),
        ];
        let request = CompletionRequest {
            provider: ProviderRegistry::builtin().get("groq").expect("groq"),
            api_key: SecretString::from("k".to_string()),
            model: "llama-3.1-70b-versatile".to_string(),
            messages: &messages,
            stream: true,
            max_tokens: None,
        };
        let body = OpenAiCompatibleProtocol
            .build_body(&request, 4000)
            .expect("body");
        assert_eq!(
            body,
            json!({
                "model": "llama-3.1-70b-versatile",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"}
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn max_tokens_is_sent_only_when_requested() {
        let messages = vec![ConversationMessage::user("Hello")];
        let request = CompletionRequest {
            provider: ProviderRegistry::builtin().get("openai").expect("openai"),
            api_key: SecretString::from("k".to_string()),
            model: "gpt-4o-mini".to_string(),
            messages: &messages,
            stream: false,
            max_tokens: Some(10),
        };
        let body = OpenAiCompatibleProtocol
            .build_body(&request, 4000)
            .expect("body");
        assert_eq!(body["max_tokens"], json!(10));
        assert_eq!(body["stream"], json!(false));
    }

    #[test]
    fn parse_response_reads_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hello"}}]}"#;
        let text = OpenAiCompatibleProtocol
            .parse_response("openai", body)
            .expect("parse");
        assert_eq!(text, "Hello");

        let empty = OpenAiCompatibleProtocol
            .parse_response("openai", r#"{"choices":[]}"#)
            .expect("parse");
        assert_eq!(empty, "");

        let null_content = OpenAiCompatibleProtocol
            .parse_response("openai", r#"{"choices":[{"message":{"content":null}}]}"#)
            .expect("parse");
        assert_eq!(null_content, "");
    }

    #[test]
    fn parse_response_rejects_foreign_shapes() {
        for body in ["not json", r#"{"text":"cohere shaped"}"#] {
            let err = OpenAiCompatibleProtocol
                .parse_response("xai", body)
                .expect_err("parse error");
            assert!(matches!(err, LLMError::Parse { ref provider, .. } if provider == "xai"));
        }
    }

    #[test]
    fn decode_stream_line_handles_delta_done_and_noise() {
        let protocol = OpenAiCompatibleProtocol;
        assert_eq!(
            protocol.decode_stream_line(r#"{"choices":[{"delta":{"content":"Hel"}}]}"#),
            StreamItem::Text("Hel".to_string())
        );
        assert_eq!(protocol.decode_stream_line("[DONE]"), StreamItem::Done);
        assert_eq!(
            protocol.decode_stream_line(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            StreamItem::Skip
        );
        assert_eq!(
            protocol.decode_stream_line(r#"{"choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#),
            StreamItem::Skip
        );
        assert_eq!(protocol.decode_stream_line("{\"choices\":[{\"del"), StreamItem::Skip);
    }
}
