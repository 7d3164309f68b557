//! protoreplay recorded log
//!
//! Read-only model of one recorded protocol session: the raw `send`/`recv`
//! entries as they were captured, and the ordered request/response pairs
//! derived from them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod error;
pub mod load;
pub mod pair;
pub mod summary;

pub use entry::{Direction, LogEntry};
pub use error::{LogError, LogResult};
pub use load::RecordedLog;
pub use pair::{RecordedRequest, RecordedResponse, RequestResponsePair, pair};
pub use summary::LogSummary;
