//! Replay failures and warnings.

use crate::hooks::HookError;
use crate::session::TransportError;
use protoreplay_core::{CoreError, CorrelationId, IdentifierKind};
use std::fmt;
use thiserror::Error;

/// Which hook failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// `before_each`
    Before,
    /// `after_each`
    After,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before_each"),
            Self::After => f.write_str("after_each"),
        }
    }
}

/// Fatal replay failure
///
/// Each variant names the scheduled pair it stopped at. Requests sent before
/// that pair have already taken effect on the live session.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Strict mode found an identifier with no substitution
    #[error("Unresolved {kind} id {value:?} in {method} ({id}) at pair {index}")]
    UnresolvedIdentifier {
        /// Position in the scheduled sequence
        index: usize,
        /// Correlation id of the recorded request
        id: CorrelationId,
        /// Method of the recorded request
        method: String,
        /// Identifier kind
        kind: IdentifierKind,
        /// Recorded value with no mapping
        value: String,
    },
    /// The live session failed to deliver a response
    #[error("Transport failed on {method} ({id}) at pair {index}: {source}")]
    Transport {
        /// Position in the scheduled sequence
        index: usize,
        /// Correlation id of the recorded request
        id: CorrelationId,
        /// Method of the recorded request
        method: String,
        /// Transport failure
        source: TransportError,
    },
    /// A caller-supplied hook failed
    #[error("{stage} hook failed on {method} ({id}) at pair {index}: {source}")]
    Hook {
        /// Position in the scheduled sequence
        index: usize,
        /// Correlation id of the recorded request
        id: CorrelationId,
        /// Method of the recorded request
        method: String,
        /// Hook that failed
        stage: HookStage,
        /// Error returned by the hook, unchanged
        source: HookError,
    },
}

impl ReplayError {
    /// Position of the failing pair in the scheduled sequence
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::UnresolvedIdentifier { index, .. }
            | Self::Transport { index, .. }
            | Self::Hook { index, .. } => *index,
        }
    }

    /// Method of the failing pair
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::UnresolvedIdentifier { method, .. }
            | Self::Transport { method, .. }
            | Self::Hook { method, .. } => method,
        }
    }
}

impl From<ReplayError> for CoreError {
    fn from(err: ReplayError) -> Self {
        CoreError::Validation {
            field: "replay".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Non-fatal condition observed during replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayWarning {
    /// An identifier was sent with its recorded value
    Unresolved {
        /// Position in the scheduled sequence
        index: usize,
        /// Method of the request
        method: String,
        /// Identifier kind
        kind: IdentifierKind,
        /// Stale value that was sent
        value: String,
    },
    /// A second, different live value was seen for a mapped identifier
    Conflict {
        /// Position in the scheduled sequence
        index: usize,
        /// Method of the request
        method: String,
        /// Identifier kind
        kind: IdentifierKind,
        /// Recorded value
        old: String,
        /// Value kept
        kept: String,
        /// Value discarded
        ignored: String,
    },
    /// The same live value was observed again for a mapped identifier
    Duplicate {
        /// Position in the scheduled sequence
        index: usize,
        /// Method of the request
        method: String,
        /// Identifier kind
        kind: IdentifierKind,
        /// Recorded value
        old: String,
    },
    /// An identifier-issuing response lacked the expected field
    MissingIdentifier {
        /// Position in the scheduled sequence
        index: usize,
        /// Method of the request
        method: String,
        /// Identifier kind
        kind: IdentifierKind,
        /// Whether the recorded (`false`) or live (`true`) side lacked it
        live: bool,
    },
}

impl fmt::Display for ReplayWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolved {
                index,
                method,
                kind,
                value,
            } => write!(
                f,
                "pair {}: {} sent with unresolved {} id {:?}",
                index, method, kind, value
            ),
            Self::Conflict {
                index,
                method,
                kind,
                old,
                kept,
                ignored,
            } => write!(
                f,
                "pair {}: {} mapped {} id {:?} again to {:?}; keeping {:?}",
                index, method, kind, old, ignored, kept
            ),
            Self::Duplicate {
                index,
                method,
                kind,
                old,
            } => write!(
                f,
                "pair {}: {} observed {} id {:?} again with the same live value",
                index, method, kind, old
            ),
            Self::MissingIdentifier {
                index,
                method,
                kind,
                live,
            } => write!(
                f,
                "pair {}: {} {} response has no {} id",
                index,
                method,
                if *live { "live" } else { "recorded" },
                kind
            ),
        }
    }
}
