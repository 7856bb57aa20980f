//! Event publishing error types.

use thiserror::Error;

/// Errors that can occur while handing an event to the bus.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus (or the proxy in front of it) could not be reached.
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),

    /// The bus answered but refused the record.
    #[error("Event rejected by the bus with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The event payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Native Kafka producer failure.
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

impl PublishError {
    /// Returns true if retrying the same event may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PublishError::Unavailable(_) => true,
            PublishError::Rejected { status, .. } => *status >= 500 || *status == 429,
            PublishError::Serialization(_) => false,
            #[cfg(feature = "kafka")]
            PublishError::Kafka(_) => true,
        }
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Unavailable(err.to_string())
    }
}

/// Result type for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_record_is_permanent_unless_server_side() {
        let rejected = |status| PublishError::Rejected {
            status,
            body: String::new(),
        };

        assert!(!rejected(422).is_transient());
        assert!(rejected(502).is_transient());
        assert!(PublishError::Unavailable("timeout".to_string()).is_transient());
    }
}
