use serde::{Deserialize, Serialize};

/// Request body for Cohere `POST /v1/chat`.
#[derive(Debug, Serialize)]
pub(crate) struct CohereChatBody<'a> {
    pub(crate) model: &'a str,
    /// Content of the newest turn.
    pub(crate) message: &'a str,
    pub(crate) chat_history: Vec<CohereHistoryEntry<'a>>,
    pub(crate) stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct CohereHistoryEntry<'a> {
    pub(crate) role: CohereRole,
    pub(crate) message: &'a str,
}

/// Cohere v1 only knows these two speakers.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub(crate) enum CohereRole {
    User,
    Chatbot,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CohereChatResponse {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

/// One line of the newline-delimited JSON stream.
#[derive(Debug, Deserialize)]
pub(crate) struct CohereStreamEvent {
    pub(crate) event_type: String,
    #[serde(default)]
    pub(crate) text: Option<String>,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}
