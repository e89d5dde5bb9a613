//! Result and error types for probar-dom.

use thiserror::Error;

/// Result type for probar-dom operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while querying or manipulating a document
#[derive(Debug, Error)]
pub enum QueryError {
    /// No element matched where at least one was required
    #[error("{message}")]
    MissingElement {
        /// Error message, including the container snapshot
        message: String,
    },

    /// More than one element matched where exactly one was required
    #[error("{message}")]
    MultipleElements {
        /// Error message, including the container snapshot
        message: String,
    },

    /// Invalid configuration (no default document, conflicting matcher options)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// An async query did not settle before its deadline
    #[error("{message}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// Message of the last failed attempt
        message: String,
    },

    /// The observed container left the document while waiting
    #[error("Container detached: {message}")]
    DetachedContainer {
        /// Error message
        message: String,
    },

    /// Selector could not be parsed
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector {
        /// The selector text
        selector: String,
        /// What went wrong
        message: String,
    },

    /// Tree mutation that would break the document structure
    #[error("Invalid tree operation: {message}")]
    Hierarchy {
        /// Error message
        message: String,
    },

    /// JSON error (configuration files)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueryError {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a hierarchy error
    #[must_use]
    pub fn hierarchy(message: impl Into<String>) -> Self {
        Self::Hierarchy {
            message: message.into(),
        }
    }

    /// Whether this is a zero-match failure
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::MissingElement { .. })
    }

    /// Whether this is an ambiguous-match failure
    #[must_use]
    pub const fn is_multiple(&self) -> bool {
        matches!(self, Self::MultipleElements { .. })
    }

    /// Whether this is an async deadline failure
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_element_errors_display_message_verbatim() {
        let err = QueryError::MissingElement {
            message: "Unable to find an element".to_string(),
        };
        assert_eq!(err.to_string(), "Unable to find an element");
        assert!(err.is_missing());
        assert!(!err.is_multiple());
    }

    #[test]
    fn test_timeout_display_mirrors_last_error() {
        let err = QueryError::Timeout {
            ms: 1000,
            message: "Found multiple elements".to_string(),
        };
        assert_eq!(err.to_string(), "Found multiple elements");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_configuration_error_prefix() {
        let err = QueryError::configuration("no document");
        assert_eq!(err.to_string(), "Configuration error: no document");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: QueryError = json_err.into();
        assert!(matches!(err, QueryError::Json(_)));
    }
}
