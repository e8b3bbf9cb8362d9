//! Error type shared by the stores and the query façade.

use std::time::Duration;

use mongodb::bson;
use thiserror::Error;

/// Failure of a single spatial query.
///
/// Store and engine errors are carried unmodified; nothing here is retried.
#[derive(Error, Debug)]
pub enum GeoQueryError {
    /// The driver or the database engine failed to run the find.
    #[error("query execution failed: {0}")]
    Store(#[from] mongodb::error::Error),

    /// The in-memory store refused a filter or a document.
    #[error("query rejected: {0}")]
    Rejected(String),

    /// A result document does not match the location record shape.
    #[error("failed to decode location record: {0}")]
    Decode(#[from] bson::de::Error),

    #[error("failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),

    /// The execution scope's time budget elapsed before the query finished.
    #[error("query exceeded its {0:?} time budget")]
    Timeout(Duration),
}

impl GeoQueryError {
    pub fn rejected(message: impl Into<String>) -> Self {
        GeoQueryError::Rejected(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GeoQueryError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, GeoQueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_budget() {
        let err = GeoQueryError::Timeout(Duration::from_secs(10));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "query exceeded its 10s time budget");
    }

    #[test]
    fn test_rejected_is_not_timeout() {
        let err = GeoQueryError::rejected("unsupported operator $foo");
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("$foo"));
    }
}
