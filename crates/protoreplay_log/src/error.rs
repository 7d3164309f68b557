//! Structural errors in a recorded log.

use crate::entry::Direction;
use protoreplay_core::{CoreError, CorrelationId};
use thiserror::Error;

/// Result type for log operations
pub type LogResult<T> = Result<T, LogError>;

/// A recorded log that cannot be replayed
///
/// Every variant is fatal: a replay never starts from a malformed log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// The input is not a JSON array of entry objects
    #[error("Malformed log: {message}")]
    Parse {
        /// Position of the offending entry, when known
        index: Option<usize>,
        /// Parser message
        message: String,
    },
    /// An entry lacks a field required by its direction
    #[error("Malformed log: entry {index} ({id}) is missing `{field}`")]
    MissingField {
        /// Position in the log
        index: usize,
        /// Correlation id of the entry
        id: CorrelationId,
        /// Name of the missing field
        field: &'static str,
    },
    /// A field is present but has the wrong shape
    #[error("Malformed log: entry {index} ({id}) has invalid `{field}`: {reason}")]
    InvalidField {
        /// Position in the log
        index: usize,
        /// Correlation id of the entry
        id: CorrelationId,
        /// Name of the field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
    /// Two entries of the same direction share a correlation id
    #[error("Malformed log: duplicate {direction} id {id} at entry {index}")]
    DuplicateId {
        /// Position of the second occurrence
        index: usize,
        /// Repeated correlation id
        id: CorrelationId,
        /// Direction in which the id repeats
        direction: Direction,
    },
    /// The log file could not be read
    #[error("Failed to read log {path}: {message}")]
    Io {
        /// Path that was being read
        path: String,
        /// Underlying error message
        message: String,
    },
}

impl From<LogError> for CoreError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Io { .. } => CoreError::Io {
                message: err.to_string(),
            },
            _ => CoreError::Validation {
                field: "log".to_string(),
                reason: err.to_string(),
            },
        }
    }
}
