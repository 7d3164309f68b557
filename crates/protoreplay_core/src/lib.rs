//! protoreplay core types
//!
//! Pure types shared by the log model and the replay engine.
//! Nothing in this crate performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod id;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use id::{CorrelationId, IdentifierKind};
