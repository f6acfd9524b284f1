use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{LLMError, status_text};
use crate::http::retry_after_from_headers;

/// Longest raw body echoed into an error when no vendor message can be found.
const MAX_RAW_BODY: usize = 512;

/// Builds [`LLMError::Http`] for a non-2xx response.
///
/// OpenAI-compatible and Anthropic bodies carry `{"error": {"message": ..}}`, Cohere uses
/// a top-level `{"message": ..}`; anything else is passed through truncated.
pub(crate) fn http_error(status: u16, headers: &HashMap<String, String>, body: &str) -> LLMError {
    LLMError::Http {
        status,
        status_text: status_text(status),
        message: vendor_message(body).unwrap_or_else(|| truncate(body.trim())),
        retry_after: retry_after_from_headers(headers),
    }
}

fn vendor_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
        message: Option<String>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum InnerError {
        Object {
            message: Option<String>,
            r#type: Option<String>,
        },
        Text(String),
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.error {
        Some(InnerError::Object {
            message: Some(message),
            r#type: Some(kind),
        }) => Some(format!("{message} ({kind})")),
        Some(InnerError::Object {
            message: Some(message),
            ..
        }) => Some(message),
        Some(InnerError::Text(message)) => Some(message),
        _ => parsed.message,
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_RAW_BODY {
        return body.to_string();
    }
    let mut end = MAX_RAW_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn openai_style_error_body() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        match http_error(401, &HashMap::new(), body) {
            LLMError::Http {
                status,
                status_text,
                message,
                retry_after,
            } => {
                assert_eq!(status, 401);
                assert_eq!(status_text, "Unauthorized");
                assert_eq!(message, "Incorrect API key provided (invalid_request_error)");
                assert_eq!(retry_after, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn anthropic_error_with_retry_after() {
        let body = r#"{"type":"error","error":{"type":"rate_limit_error","message":"Too many requests"}}"#;
        let headers = HashMap::from([("retry-after".to_string(), "3".to_string())]);
        let err = http_error(429, &headers, body);
        assert!(err.is_rate_limited());
        match err {
            LLMError::Http {
                message,
                retry_after,
                ..
            } => {
                assert_eq!(message, "Too many requests (rate_limit_error)");
                assert_eq!(retry_after, Some(Duration::from_secs(3)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cohere_and_string_errors() {
        let err = http_error(400, &HashMap::new(), r#"{"message":"invalid request: message must not be empty"}"#);
        assert!(err.to_string().contains("message must not be empty"));

        let err = http_error(402, &HashMap::new(), r#"{"error":"Insufficient credits"}"#);
        assert!(err.to_string().contains("Insufficient credits"));
    }

    #[test]
    fn raw_bodies_are_truncated() {
        let body = "x".repeat(2000);
        match http_error(502, &HashMap::new(), &body) {
            LLMError::Http { message, .. } => {
                assert!(message.len() < 600);
                assert!(message.ends_with('…'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
