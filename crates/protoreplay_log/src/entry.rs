//! Raw log entries.
//!
//! One entry per message observed on the wire during the recording.
//! Entries are immutable once loaded.

use crate::error::{LogError, LogResult};
use protoreplay_core::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Direction of a recorded message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Request sent by the client
    Send,
    /// Response received from the server
    Recv,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Recv => f.write_str("recv"),
        }
    }
}

/// A recorded protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Correlation id, unique among entries of the same direction
    pub id: CorrelationId,
    /// Message direction
    #[serde(rename = "type")]
    pub direction: Direction,
    /// Protocol method name, required on `send`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request parameters, `send` only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Response payload, required on `recv`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl LogEntry {
    /// Build a `send` entry
    #[must_use]
    pub fn send(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: CorrelationId::new(id),
            direction: Direction::Send,
            method: Some(method.into()),
            params: Some(params),
            result: None,
        }
    }

    /// Build a `recv` entry
    #[must_use]
    pub fn recv(id: u64, result: Value) -> Self {
        Self {
            id: CorrelationId::new(id),
            direction: Direction::Recv,
            method: None,
            params: None,
            result: Some(result),
        }
    }

    /// Whether this is a request
    #[must_use]
    pub fn is_send(&self) -> bool {
        self.direction == Direction::Send
    }

    /// Whether this is a response
    #[must_use]
    pub fn is_recv(&self) -> bool {
        self.direction == Direction::Recv
    }

    /// Request parameters as an object; absent params read as empty
    #[must_use]
    pub fn params_object(&self) -> Map<String, Value> {
        match &self.params {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Check the fields required for this entry's direction
    ///
    /// # Errors
    ///
    /// Returns `LogError` if a required field is missing or mis-shaped
    pub fn validate(&self, index: usize) -> LogResult<()> {
        match self.direction {
            Direction::Send => {
                match self.method.as_deref() {
                    None => {
                        return Err(LogError::MissingField {
                            index,
                            id: self.id,
                            field: "method",
                        });
                    }
                    Some("") => {
                        return Err(LogError::InvalidField {
                            index,
                            id: self.id,
                            field: "method",
                            reason: "empty method name".to_string(),
                        });
                    }
                    Some(_) => {}
                }
                if let Some(params) = &self.params {
                    if !params.is_object() {
                        return Err(LogError::InvalidField {
                            index,
                            id: self.id,
                            field: "params",
                            reason: format!("expected object, found {}", kind_of(params)),
                        });
                    }
                }
            }
            Direction::Recv => {
                let Some(result) = &self.result else {
                    return Err(LogError::MissingField {
                        index,
                        id: self.id,
                        field: "result",
                    });
                };
                if !result.is_object() {
                    return Err(LogError::InvalidField {
                        index,
                        id: self.id,
                        field: "result",
                        reason: format!("expected object, found {}", kind_of(result)),
                    });
                }
            }
        }
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
