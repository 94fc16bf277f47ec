//! Error types for the TAP client.

use thiserror::Error;

/// Result type for TAP operations.
pub type TapResult<T> = Result<T, TapError>;

/// Errors that can occur when talking to a TAP service.
#[derive(Debug, Error)]
pub enum TapError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status code.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body was not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required UWS element was absent from the job document.
    #[error("Missing UWS element: {0}")]
    MissingElement(&'static str),

    /// The job phase is not one the tracker understands.
    #[error("Unknown job phase: {0:?}")]
    UnknownPhase(String),

    /// The results document lacks `metadata` or `data`, or is otherwise unusable.
    #[error("Malformed results: {0}")]
    MalformedResults(String),

    /// The source identifier cannot be substituted into the query.
    #[error("Invalid source id: {0:?}")]
    InvalidSourceId(String),

    /// Query template or base URL misconfiguration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TapError {
    /// Whether retrying the same request later may succeed.
    ///
    /// Network failures, timeouts, throttling and server-side errors are
    /// transient; malformed documents and client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            TapError::Http(_) => true,
            TapError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = TapError::Api {
            status: 503,
            message: "Service unavailable".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("Service unavailable"));
    }

    #[test]
    fn test_transient_classification() {
        let server = TapError::Api {
            status: 502,
            message: String::new(),
        };
        let throttled = TapError::Api {
            status: 429,
            message: String::new(),
        };
        let client = TapError::Api {
            status: 404,
            message: String::new(),
        };
        assert!(server.is_transient());
        assert!(throttled.is_transient());
        assert!(!client.is_transient());
        assert!(!TapError::UnknownPhase("RUNNING".into()).is_transient());
        assert!(!TapError::MalformedResults("no data".into()).is_transient());
    }

    #[test]
    fn test_unknown_phase_display() {
        let err = TapError::UnknownPhase("RUNNING".into());
        assert!(err.to_string().contains("RUNNING"));
    }
}
