//! Loading and validating a recorded log.
//!
//! The log is transport-agnostic: anything that yields the deserialized
//! array of entries can feed `RecordedLog`. Loading either succeeds with a
//! fully validated log or fails with `LogError`; there is no partially
//! loaded state.

use crate::entry::{Direction, LogEntry};
use crate::error::{LogError, LogResult};
use crate::pair::{RequestResponsePair, pair};
use protoreplay_core::CorrelationId;
use serde_json::Value;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// A validated, read-only recorded session
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedLog {
    entries: Vec<LogEntry>,
    ignored: usize,
}

impl RecordedLog {
    /// Build from already-deserialized entries
    ///
    /// # Errors
    ///
    /// Returns `LogError` if an entry lacks the fields its direction
    /// requires, or if a correlation id repeats within one direction
    pub fn from_entries(entries: Vec<LogEntry>) -> LogResult<Self> {
        Self::validated(entries.into_iter().enumerate().collect(), 0)
    }

    fn validated(indexed: Vec<(usize, LogEntry)>, ignored: usize) -> LogResult<Self> {
        let mut sent: HashSet<CorrelationId> = HashSet::new();
        let mut received: HashSet<CorrelationId> = HashSet::new();

        for (index, entry) in &indexed {
            let index = *index;
            entry.validate(index)?;
            let seen = match entry.direction {
                Direction::Send => &mut sent,
                Direction::Recv => &mut received,
            };
            if !seen.insert(entry.id) {
                return Err(LogError::DuplicateId {
                    index,
                    id: entry.id,
                    direction: entry.direction,
                });
            }
        }

        Ok(Self {
            entries: indexed.into_iter().map(|(_, entry)| entry).collect(),
            ignored,
        })
    }

    /// Build from a JSON array value
    ///
    /// Entries whose `type` is a string other than `send` or `recv` (push
    /// events, annotations) are skipped and counted in [`RecordedLog::ignored`].
    /// Indices in errors refer to positions in the original array.
    ///
    /// # Errors
    ///
    /// Returns `LogError::Parse` if the value is not an array of entry
    /// objects, or any validation error from `from_entries`
    pub fn from_value(value: Value) -> LogResult<Self> {
        let Value::Array(items) = value else {
            return Err(LogError::Parse {
                index: None,
                message: "expected a JSON array of entries".to_string(),
            });
        };

        let mut indexed = Vec::with_capacity(items.len());
        let mut ignored = 0;
        for (index, item) in items.into_iter().enumerate() {
            if is_unpaired_kind(&item) {
                ignored += 1;
                continue;
            }
            let entry = serde_json::from_value::<LogEntry>(item).map_err(|err| LogError::Parse {
                index: Some(index),
                message: format!("entry {}: {}", index, err),
            })?;
            indexed.push((index, entry));
        }

        Self::validated(indexed, ignored)
    }

    /// Parse from JSON text
    ///
    /// # Errors
    ///
    /// Returns `LogError` if the text is not a well-formed log
    pub fn from_json_str(text: &str) -> LogResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(parse_error)?;
        Self::from_value(value)
    }

    /// Parse from JSON bytes
    ///
    /// # Errors
    ///
    /// Returns `LogError` if the bytes are not a well-formed log
    pub fn from_slice(bytes: &[u8]) -> LogResult<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(parse_error)?;
        Self::from_value(value)
    }

    /// Parse from a reader
    ///
    /// # Errors
    ///
    /// Returns `LogError` if the stream is not a well-formed log
    pub fn from_reader<R: Read>(reader: R) -> LogResult<Self> {
        let value: Value = serde_json::from_reader(reader).map_err(parse_error)?;
        Self::from_value(value)
    }

    /// Read and parse a log file
    ///
    /// # Errors
    ///
    /// Returns `LogError::Io` if the file cannot be read, or any parse or
    /// validation error
    pub async fn load_file(path: impl AsRef<Path>) -> LogResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|err| LogError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    /// Number of entries skipped because they are neither `send` nor `recv`
    #[must_use]
    pub fn ignored(&self) -> usize {
        self.ignored
    }

    /// All entries in recorded order
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Request/response pairs in request order
    ///
    /// # Errors
    ///
    /// Returns `LogError` if pairing fails
    pub fn pairs(&self) -> LogResult<Vec<RequestResponsePair>> {
        pair(&self.entries)
    }
}

fn is_unpaired_kind(item: &Value) -> bool {
    matches!(
        item.get("type").and_then(Value::as_str),
        Some(kind) if kind != "send" && kind != "recv"
    )
}

fn parse_error(err: serde_json::Error) -> LogError {
    LogError::Parse {
        index: None,
        message: err.to_string(),
    }
}
