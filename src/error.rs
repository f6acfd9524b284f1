use std::time::Duration;

use thiserror::Error;

/// Aggregates every failure mode exposed by the chat completion client.
///
/// Every call surfaces its failure as one of these variants instead of panicking, so
/// callers can show the message directly or decide on their own retry policy.
#[derive(Debug, Error)]
pub enum LLMError {
    /// The request never reached the server or the response never arrived.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The server answered with a non-2xx status.
    #[error("http {status} {status_text}: {message}")]
    Http {
        /// Numeric HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status, empty when unknown.
        status_text: String,
        /// Vendor error message when the body carried one, otherwise the raw body.
        message: String,
        /// Wait hint taken from a numeric `Retry-After` header.
        retry_after: Option<Duration>,
    },
    /// The response body did not match the vendor's JSON shape.
    #[error("failed to parse {provider} response: {message}")]
    Parse {
        /// Identifier of the provider whose payload failed to parse.
        provider: String,
        message: String,
    },
    /// The provider id is not present in the registry.
    #[error("unknown provider: {id}")]
    UnknownProvider { id: String },
    /// Signals validation failures in the request payload.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Raised when building or validating configuration fails.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
    /// Surfaces cancellations triggered explicitly by the caller.
    #[error("request aborted: {message}")]
    Aborted { message: String },
}

impl LLMError {
    /// Creates an [`LLMError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use face_llm::error::LLMError;
    ///
    /// let err = LLMError::transport("dns lookup failed");
    /// assert!(matches!(err, LLMError::Transport { .. }));
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`LLMError::Parse`] tagged with the provider id.
    ///
    /// # Examples
    ///
    /// ```
    /// use face_llm::error::LLMError;
    ///
    /// let err = LLMError::parse("cohere", "expected value at line 1");
    /// assert!(matches!(err, LLMError::Parse { ref provider, .. } if provider == "cohere"));
    /// ```
    pub fn parse<P: Into<String>, T: Into<String>>(provider: P, message: T) -> Self {
        Self::Parse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if the server responded at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for 401/403 responses, i.e. rejected or missing credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// Returns `true` when the provider throttled the request.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}

/// Canonical reason phrase for a status code, or an empty string.
pub(crate) fn status_text(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or_default()
        .to_string()
}
