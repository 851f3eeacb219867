//! Error types for backend operations.

use crate::key::Key;
use std::io;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur during backend operations.
///
/// Callers distinguish outcomes by kind, never by message text:
/// [`BackendError::is_condition_failed`] and [`BackendError::is_not_found`]
/// are the supported checks for the two outcomes that drive control flow.
#[derive(Debug, Error)]
pub enum BackendError {
    /// A precondition of an atomic write did not hold.
    ///
    /// This is an expected, retryable outcome, not a fault: the batch was
    /// not applied and no key was touched. Callers retry by re-reading and
    /// recomputing their conditions.
    #[error("atomic write condition failed")]
    ConditionFailed,

    /// The requested key is absent (or expired).
    #[error("key not found: {key}")]
    NotFound {
        /// The key that was looked up.
        key: Key,
    },

    /// Malformed input, such as an oversized atomic write batch.
    ///
    /// This indicates a caller bug and is never retryable.
    #[error("bad parameter: {message}")]
    BadParameter {
        /// Description of the rejected input.
        message: String,
    },

    /// The operation's context was canceled before any effect took place.
    #[error("operation canceled")]
    Canceled,

    /// The operation's deadline passed before any effect took place.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The underlying storage engine failed.
    ///
    /// Propagated opaquely; the caller decides retry policy.
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Description of the engine fault.
        message: String,
    },

    /// The persisted snapshot could not be decoded.
    #[error("snapshot corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BackendError {
    /// Creates a not-found error for a key.
    pub fn not_found(key: impl Into<Key>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a bad-parameter error.
    pub fn bad_parameter(message: impl Into<String>) -> Self {
        Self::BadParameter {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a corrupted-snapshot error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Checks whether this error is the condition-failed outcome.
    #[must_use]
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, Self::ConditionFailed)
    }

    /// Checks whether this error is the not-found outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_failed_kind_check() {
        let err = BackendError::ConditionFailed;
        assert!(err.is_condition_failed());
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_kind_check() {
        let err = BackendError::not_found("/missing");
        assert!(err.is_not_found());
        assert!(!err.is_condition_failed());
    }

    #[test]
    fn io_error_is_neither_outcome() {
        let err = BackendError::from(io::Error::new(io::ErrorKind::Other, "disk gone"));
        assert!(!err.is_condition_failed());
        assert!(!err.is_not_found());
    }

    #[test]
    fn display_includes_key() {
        let err = BackendError::not_found("/a/b");
        assert_eq!(format!("{err}"), "key not found: /a/b");
    }
}
