//! Shared data structures for chat completion requests and results.
//!
//! Conversations are plain role/content pairs. Vendor-specific shapes are produced by
//! the wire strategies in [`crate::provider`].

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::LLMError;
use crate::registry::ProviderDescriptor;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One chronological turn of a conversation.
///
/// # Examples
///
/// ```
/// use face_llm::types::{ConversationMessage, Role};
///
/// let msg = ConversationMessage::user("Write a post about autumn");
/// assert_eq!(msg.role, Role::User);
/// assert_eq!(
///     serde_json::to_value(&msg).unwrap(),
///     serde_json::json!({"role": "user", "content": "Write a post about autumn"})
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Everything needed to issue one call, built fresh per call and dropped afterwards.
pub struct CompletionRequest<'a> {
    pub provider: &'a ProviderDescriptor,
    /// Caller-owned credential, only exposed while building headers.
    pub api_key: SecretString,
    pub model: String,
    pub messages: &'a [ConversationMessage],
    pub stream: bool,
    /// Output budget; `None` leaves the vendor default in place.
    pub max_tokens: Option<u32>,
}

impl fmt::Debug for CompletionRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("provider", &self.provider.id)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("stream", &self.stream)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Successful completion of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Full generated text. For streamed calls this is the concatenation of every chunk.
    pub content: String,
    /// Id of the provider that served the call (after alias or fallback resolution).
    pub provider: String,
    /// Model name sent to the provider.
    pub model: String,
}

/// Outcome of [`crate::client::ChatClient::send_message`].
pub type CompletionResult = Result<Completion, LLMError>;
