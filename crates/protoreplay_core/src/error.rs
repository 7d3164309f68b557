//! Core error types for protoreplay.

use thiserror::Error;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
///
/// Crate-specific errors (log, replay) convert into this type so callers
/// juggling several crates can funnel everything through one `?`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Input could not be parsed
    #[error("Parse error: {message}")]
    Parse {
        /// Parser message
        message: String,
    },

    /// Filesystem or stream failure
    #[error("I/O error: {message}")]
    Io {
        /// Underlying error message
        message: String,
    },

    /// Validation error
    #[error("Validation failed for {field}: {reason}")]
    Validation {
        /// Field or component that failed
        field: String,
        /// Why it failed
        reason: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {reason}")]
    Config {
        /// Why the configuration was rejected
        reason: String,
    },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::Config {
            reason: "unknown field `deny`".to_string(),
        };
        assert_eq!(format!("{}", err), "Invalid configuration: unknown field `deny`");

        let err = CoreError::Validation {
            field: "params".to_string(),
            reason: "not an object".to_string(),
        };
        assert_eq!(format!("{}", err), "Validation failed for params: not an object");
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Parse { .. }));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "log.json");
        let core: CoreError = err.into();
        assert!(core.to_string().contains("log.json"));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::Io {
            message: "gone".to_string(),
        };
        let err2 = CoreError::Io {
            message: "gone".to_string(),
        };
        assert_eq!(err1, err2);

        let err3 = CoreError::Parse {
            message: "gone".to_string(),
        };
        assert_ne!(err1, err3);
    }
}
