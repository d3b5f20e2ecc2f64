//! Error types for staging operations.

use std::time::Duration;

/// Errors that can occur while staging a photo.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Request rejected locally before any remote call was made.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Credentials missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Caller authenticated but not allowed to use the model or bucket.
    #[error("permission denied: {0}")]
    Permission(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code from the remote service.
        status: u16,
        /// Sanitized error body.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Server-suggested delay before the next attempt.
        retry_after: Option<Duration>,
    },

    /// Remote call exceeded the configured deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Content was blocked by the model's safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode a base64 image payload.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Object store operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Required deployment configuration is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error (e.g., reading an upload from disk).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StageError {
    /// Returns true if this error is likely transient and worth retrying.
    ///
    /// Validation, auth, and permission failures are never retryable; a retry
    /// would fail identically without user intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_)
        )
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Timeout(_) => Some(Duration::from_secs(1)),
            Self::Network(_) => Some(Duration::from_secs(2)),
            _ => None,
        }
    }
}

/// Result type alias for staging operations.
pub type Result<T> = std::result::Result<T, StageError>;

/// Parses a `Retry-After` header value in seconds, if present.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Trims a raw error body down to something fit for a status line.
///
/// Remote services occasionally return full HTML error pages; those are
/// replaced wholesale, and anything else is clamped to a readable length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    const MAX_LEN: usize = 300;

    let trimmed = text.trim();
    if trimmed.starts_with('<') {
        return "service returned an unreadable error page".to_string();
    }

    if trimmed.len() > MAX_LEN {
        let mut end = MAX_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(StageError::RateLimited { retry_after: None }.is_retryable());
        assert!(StageError::Timeout(Duration::from_secs(30)).is_retryable());

        assert!(!StageError::Auth("bad key".into()).is_retryable());
        assert!(!StageError::Permission("missing role".into()).is_retryable());
        assert!(!StageError::Validation("empty instruction".into()).is_retryable());
        assert!(!StageError::ContentBlocked("safety".into()).is_retryable());
        assert!(!StageError::Storage("bucket missing".into()).is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let rate_limited = StageError::RateLimited {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

        let rate_limited_no_hint = StageError::RateLimited { retry_after: None };
        assert_eq!(rate_limited_no_hint.retry_after(), None);

        let timeout = StageError::Timeout(Duration::from_secs(30));
        assert_eq!(timeout.retry_after(), Some(Duration::from_secs(1)));

        let auth = StageError::Auth("bad".into());
        assert_eq!(auth.retry_after(), None);
    }

    #[test]
    fn test_error_display() {
        let err = StageError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = StageError::Permission("caller does not have permission".into());
        assert_eq!(
            err.to_string(),
            "permission denied: caller does not have permission"
        );
    }

    #[test]
    fn test_sanitize_error_message() {
        assert_eq!(sanitize_error_message("  plain error  "), "plain error");
        assert_eq!(
            sanitize_error_message("<html><body>502</body></html>"),
            "service returned an unreadable error page"
        );

        let long = "x".repeat(500);
        let sanitized = sanitize_error_message(&long);
        assert!(sanitized.len() <= 303);
        assert!(sanitized.ends_with("..."));
    }
}
