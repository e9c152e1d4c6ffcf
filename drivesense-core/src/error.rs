//! Error types for drivesense-core

use thiserror::Error;

/// Main error type for the drivesense-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure (connection refused, timeout, bad body)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success response from one of the services
    #[error("API error ({status}): {}", message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        /// The service's `error` field, when it sent one
        message: Option<String>,
    },

    /// No signed-in identity is available
    #[error("not signed in")]
    NotSignedIn,

    /// Record not found in the local collection
    #[error("record not found: {0}")]
    NotFound(String),

    /// A local patch could not be merged into a record
    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    /// Unknown driver status tag
    #[error("invalid status: {0}")]
    InvalidStatus(String),
}

impl Error {
    /// Text for a blocking user notification.
    ///
    /// Prefers the message the service sent back; otherwise falls back to a
    /// generic description of what went wrong.
    pub fn user_message(&self) -> String {
        match self {
            Error::Api {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Error::Api { status, .. } => format!("request failed with status {}", status),
            Error::Http(_) => "could not reach the server, please try again".to_string(),
            Error::NotSignedIn => "please sign in first".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for drivesense-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = Error::Api {
            status: 500,
            message: Some("Failed to delete driver: Driver not found".to_string()),
        };
        assert_eq!(
            err.user_message(),
            "Failed to delete driver: Driver not found"
        );
    }

    #[test]
    fn test_user_message_generic_fallback() {
        let err = Error::Api {
            status: 502,
            message: None,
        };
        assert_eq!(err.user_message(), "request failed with status 502");

        let err = Error::Http("connection refused".to_string());
        assert!(err.user_message().contains("could not reach"));
    }
}
