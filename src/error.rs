// Error types for the job client. Every failure the client can hit maps to
// one variant so callers can tell a dead job from a slow one.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HumanizeError>;

/// Longest slice of a response body kept inside an error.
pub const BODY_EXCERPT_LEN: usize = 512;

#[derive(Debug, Error)]
pub enum HumanizeError {
    /// Transport failure (DNS, connect, read timeout) while talking to the service.
    #[error("Network error during {operation}: {source}")]
    Network {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success HTTP status.
    #[error("{operation} failed: {status} - {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// A success response without the field this operation needs.
    #[error("{operation} response has no `{field}` field: {body}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
        body: String,
    },

    #[error("Could not decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The poll response carried a `result` that is empty or not a list of versions.
    #[error("Empty or invalid result: {detail}")]
    MalformedResult { detail: String },

    /// The service declared the job failed.
    #[error("Server error: {error}{}", dash_suffix(.message))]
    Server {
        error: String,
        message: Option<String>,
    },

    /// Polling gave up. The job may still be running on the service.
    #[error("Timeout after {}s ({attempts} poll attempts)", .timeout.as_secs_f64())]
    Timeout { timeout: Duration, attempts: u32 },

    #[error("Response is {encoding} encoded and could not be decoded")]
    UnsupportedEncoding { encoding: String },

    /// A configured value (token, base URL) cannot be sent as a header.
    #[error("Value for the {header} header is not a valid HTTP header value")]
    InvalidHeader { header: &'static str },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl HumanizeError {
    pub(crate) fn network(operation: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| HumanizeError::Network { operation, source }
    }

    pub(crate) fn decode(operation: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| HumanizeError::Decode { operation, source }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HumanizeError::Timeout { .. })
    }

    /// Whether submitting a fresh job could plausibly succeed. A declared
    /// server error or a bad response shape will not fix itself.
    pub fn is_retryable_with_new_job(&self) -> bool {
        matches!(
            self,
            HumanizeError::Timeout { .. } | HumanizeError::Network { .. }
        )
    }
}

fn dash_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) => format!(" - {m}"),
        None => String::new(),
    }
}

/// Cut `body` down to at most [`BODY_EXCERPT_LEN`] bytes without splitting a char.
pub fn excerpt(body: &str) -> String {
    if body.len() <= BODY_EXCERPT_LEN {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_keeps_short_bodies() {
        assert_eq!(excerpt("{\"ok\":true}"), "{\"ok\":true}");
    }

    #[test]
    fn excerpt_truncates_on_char_boundary() {
        let body = "é".repeat(BODY_EXCERPT_LEN);
        let cut = excerpt(&body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= BODY_EXCERPT_LEN + 3);
        assert!(cut.trim_end_matches("...").chars().all(|c| c == 'é'));
    }

    #[test]
    fn server_error_joins_message() {
        let err = HumanizeError::Server {
            error: "quota".into(),
            message: Some("no credits left".into()),
        };
        assert_eq!(err.to_string(), "Server error: quota - no credits left");

        let bare = HumanizeError::Server {
            error: "quota".into(),
            message: None,
        };
        assert_eq!(bare.to_string(), "Server error: quota");
    }

    #[test]
    fn timeout_is_distinct_from_server_error() {
        let timeout = HumanizeError::Timeout {
            timeout: Duration::from_secs(300),
            attempts: 150,
        };
        assert!(timeout.is_timeout());
        assert!(timeout.is_retryable_with_new_job());

        let declared = HumanizeError::Server {
            error: "failed".into(),
            message: None,
        };
        assert!(!declared.is_timeout());
        assert!(!declared.is_retryable_with_new_job());
    }
}
