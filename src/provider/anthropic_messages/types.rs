use serde::{Deserialize, Serialize};

use crate::types::ConversationMessage;

/// Request body for `POST /v1/messages`.
#[derive(Debug, Serialize)]
pub(crate) struct AnthropicMessagesBody<'a> {
    pub(crate) model: &'a str,
    pub(crate) max_tokens: u32,
    /// Every non-system turn, in order.
    pub(crate) messages: Vec<&'a ConversationMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system: Option<String>,
    pub(crate) stream: bool,
}

/// Non-streaming response payload; only the content blocks matter here.
#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicMessageResponse {
    pub(crate) content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicContentBlock {
    #[serde(rename = "type", default)]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) text: Option<String>,
}

/// One `data:` payload of the Messages SSE stream.
#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) delta: Option<AnthropicStreamDelta>,
    #[serde(default)]
    pub(crate) error: Option<AnthropicStreamError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicStreamDelta {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnthropicStreamError {
    #[serde(rename = "type", default)]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}
