//! Error taxonomy shared by every extraction component

use std::time::Duration;

/// Error from a single remote interaction (request, poll, page).
///
/// `endpoint` is always `"METHOD url"` so a failure can be traced back to
/// the call that produced it without leaking credentials.
#[derive(Debug)]
pub enum TapError {
    /// One HTTP 429 observation; retried inside the gateway
    Throttled { endpoint: String, attempt: u32 },
    /// Retry budget exhausted while throttled
    MaxRetriesExceeded { endpoint: String, attempts: u32 },
    /// Non-JSON body where structured data was expected
    Decode { endpoint: String, message: String },
    /// Long-running operation finished with an error payload
    RemoteOperation {
        operation: String,
        payload: serde_json::Value,
    },
    /// Long-running operation did not finish within its budget
    OperationTimeout { operation: String, elapsed: Duration },
    /// Page body could not be decoded; carries the raw body
    InvalidPage { endpoint: String, body: String },
    /// HTTP 401/403
    AuthorizationDenied { endpoint: String, status: u16 },
    /// Connection reset, refused or timed out before a response arrived
    TransientConnection { endpoint: String, message: String },
    /// Any other non-2xx status or transport failure
    Http {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },
    /// Missing or malformed configuration
    Config(String),
}

impl std::fmt::Display for TapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Throttled { endpoint, attempt } => {
                write!(f, "{endpoint}: throttled (attempt {attempt})")
            }
            Self::MaxRetriesExceeded { endpoint, attempts } => {
                write!(f, "{endpoint}: still throttled after {attempts} attempts")
            }
            Self::Decode { endpoint, message } => {
                write!(f, "{endpoint}: cannot decode response: {message}")
            }
            Self::RemoteOperation { operation, payload } => {
                write!(f, "operation {operation} failed: {payload}")
            }
            Self::OperationTimeout { operation, elapsed } => write!(
                f,
                "operation {operation} did not complete within {}s",
                elapsed.as_secs()
            ),
            Self::InvalidPage { endpoint, body } => {
                write!(f, "{endpoint}: invalid page body: {body}")
            }
            Self::AuthorizationDenied { endpoint, status } => {
                write!(f, "{endpoint}: HTTP {status}: authorization denied")
            }
            Self::TransientConnection { endpoint, message } => {
                write!(f, "{endpoint}: connection error: {message}")
            }
            Self::Http {
                endpoint,
                status: Some(s),
                message,
            } => write!(f, "{endpoint}: HTTP {s}: {message}"),
            Self::Http {
                endpoint,
                status: None,
                message,
            } => write!(f, "{endpoint}: HTTP error: {message}"),
            Self::Config(msg) => write!(f, "configuration: {msg}"),
        }
    }
}

impl std::error::Error for TapError {}

impl TapError {
    /// Retried by the gateway's exponential backoff loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    /// Retried by callers that add their own linear backoff on top.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientConnection { .. })
    }

    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, Self::AuthorizationDenied { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Throttled { .. } => Some(429),
            Self::AuthorizationDenied { status, .. } => Some(*status),
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_err(status: u16) -> TapError {
        TapError::Http {
            endpoint: "GET https://example.test/x".to_string(),
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn throttled_is_retryable() {
        let err = TapError::Throttled {
            endpoint: "GET u".into(),
            attempt: 0,
        };
        assert!(err.is_retryable());
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn http_500_not_retryable() {
        assert!(!http_err(500).is_retryable());
        assert!(!http_err(500).is_transient());
    }

    #[test]
    fn connection_error_is_transient() {
        let err = TapError::TransientConnection {
            endpoint: "GET u".into(),
            message: "reset".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_retryable());
    }

    #[test]
    fn authorization_denied_classified() {
        let err = TapError::AuthorizationDenied {
            endpoint: "GET u".into(),
            status: 403,
        };
        assert!(err.is_authorization_denied());
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn display_http_with_status() {
        assert_eq!(
            format!("{}", http_err(404)),
            "GET https://example.test/x: HTTP 404: test"
        );
    }

    #[test]
    fn display_invalid_page_includes_body() {
        let err = TapError::InvalidPage {
            endpoint: "GET u".into(),
            body: "<html>oops</html>".into(),
        };
        assert!(format!("{err}").contains("<html>oops</html>"));
    }

    #[test]
    fn display_timeout_in_seconds() {
        let err = TapError::OperationTimeout {
            operation: "ops/1".into(),
            elapsed: Duration::from_secs(300),
        };
        assert_eq!(
            format!("{err}"),
            "operation ops/1 did not complete within 300s"
        );
    }
}
