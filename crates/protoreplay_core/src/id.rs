//! Identifiers shared between the recorded log and the live session.
//!
//! `CorrelationId` pairs a request with its response inside one recording.
//! `IdentifierKind` names the four families of server-issued identifiers
//! whose values change from one session to the next.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation identifier - shared by a request and its matching response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Create from a raw value
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CorrelationId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of server-issued identifier tracked across sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Debuggable target (page, worker, ...)
    Target,
    /// Sub-session attached to a target
    Session,
    /// Document frame
    Frame,
    /// Script execution context
    ExecutionContext,
}

impl IdentifierKind {
    /// Every kind, in table order
    pub const ALL: [Self; 4] = [
        Self::Target,
        Self::Session,
        Self::Frame,
        Self::ExecutionContext,
    ];

    /// Top-level request parameter that carries this kind of identifier
    #[must_use]
    pub const fn param_field(self) -> &'static str {
        match self {
            Self::Target => "targetId",
            Self::Session => "sessionId",
            Self::Frame => "frameId",
            Self::ExecutionContext => "contextId",
        }
    }

    /// Look up the kind carried by a parameter field
    #[must_use]
    pub fn from_param_field(field: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.param_field() == field)
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Target => "target",
            Self::Session => "session",
            Self::Frame => "frame",
            Self::ExecutionContext => "execution context",
        };
        f.write_str(name)
    }
}
