//! Matching requests to their responses.

use crate::entry::{Direction, LogEntry};
use crate::error::{LogError, LogResult};
use indexmap::IndexMap;
use protoreplay_core::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The request half of a pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedRequest {
    /// Correlation id
    pub id: CorrelationId,
    /// Protocol method name
    pub method: String,
    /// Parameters as recorded
    pub params: Map<String, Value>,
}

/// The response half of a pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedResponse {
    /// Correlation id
    pub id: CorrelationId,
    /// Response payload as recorded
    pub result: Value,
}

/// A recorded request with its response, if one was captured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResponsePair {
    /// Position of the request among all recorded requests
    pub sequence: usize,
    /// Recorded request
    pub request: RecordedRequest,
    /// Recorded response; `None` when the log was truncated
    pub response: Option<RecordedResponse>,
}

impl RequestResponsePair {
    /// Correlation id of the pair
    #[must_use]
    pub fn id(&self) -> CorrelationId {
        self.request.id
    }

    /// Method of the recorded request
    #[must_use]
    pub fn method(&self) -> &str {
        &self.request.method
    }

    /// Recorded response payload, if any
    #[must_use]
    pub fn recorded_result(&self) -> Option<&Value> {
        self.response.as_ref().map(|r| &r.result)
    }

    /// Whether a response was captured
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.response.is_some()
    }
}

/// Pair each `send` entry with the first `recv` entry sharing its id
///
/// Pairs come out in the original order of their `send` entries. A request
/// whose response was never recorded yields a pair with `response: None`.
///
/// # Errors
///
/// Returns `LogError` if an entry is missing required fields or a `send`
/// id repeats
pub fn pair(entries: &[LogEntry]) -> LogResult<Vec<RequestResponsePair>> {
    let mut responses: IndexMap<CorrelationId, &LogEntry> = IndexMap::new();
    for (index, entry) in entries.iter().enumerate() {
        entry.validate(index)?;
        if entry.direction == Direction::Recv {
            responses.entry(entry.id).or_insert(entry);
        }
    }

    let mut pairs: Vec<RequestResponsePair> = Vec::new();
    let mut seen: IndexMap<CorrelationId, usize> = IndexMap::new();

    for (index, entry) in entries.iter().enumerate() {
        if entry.direction != Direction::Send {
            continue;
        }
        if seen.insert(entry.id, index).is_some() {
            return Err(LogError::DuplicateId {
                index,
                id: entry.id,
                direction: Direction::Send,
            });
        }

        let method = entry.method.clone().ok_or(LogError::MissingField {
            index,
            id: entry.id,
            field: "method",
        })?;

        let response = responses.get(&entry.id).map(|recv| RecordedResponse {
            id: recv.id,
            result: recv.result.clone().unwrap_or_else(|| Value::Object(Map::new())),
        });

        pairs.push(RequestResponsePair {
            sequence: pairs.len(),
            request: RecordedRequest {
                id: entry.id,
                method,
                params: entry.params_object(),
            },
            response,
        });
    }

    Ok(pairs)
}
