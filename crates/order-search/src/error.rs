//! Search projection error types.

use thiserror::Error;

/// Errors that can occur while talking to the search engine.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The search engine could not be reached.
    #[error("Search engine unavailable: {0}")]
    Unavailable(String),

    /// The engine answered with a status the projector does not handle.
    #[error("Unexpected search engine response {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Any other HTTP client failure.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// A document or response body could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SearchError {
    /// Returns true if repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::Unavailable(_) => true,
            SearchError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
            SearchError::Http(err) => err.is_request() || err.is_body(),
            SearchError::Serialization(_) => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            SearchError::Unavailable(err.to_string())
        } else {
            SearchError::Http(err)
        }
    }
}

/// Result type for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> SearchError {
        SearchError::UnexpectedStatus {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_server_errors_are_transient() {
        assert!(SearchError::Unavailable("refused".to_string()).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!status(400).is_transient());
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!SearchError::from(err).is_transient());
    }
}
