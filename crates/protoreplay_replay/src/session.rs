//! Live session contract.
//!
//! The engine only needs two things from a transport: send a request and
//! await its response, and subscribe to push events for diagnostics. Opening,
//! configuring and closing the channel stays with the caller.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Callback for a push event; receives the event payload
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Failure of the live session's send primitive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The remote end answered with a protocol error
    #[error("Request rejected ({code}): {message}")]
    Rejected {
        /// Protocol error code
        code: i64,
        /// Protocol error message
        message: String,
    },
    /// The channel closed before a response arrived
    #[error("Session closed")]
    Closed,
    /// Any other transport failure
    #[error("Transport failure: {0}")]
    Other(String),
}

/// A duplex protocol session the engine can replay against
///
/// Implementations correlate responses to requests themselves; `send`
/// resolves with the response to exactly the request it issued.
#[async_trait]
pub trait LiveSession: Send + Sync {
    /// Send `method` with `params` and await the response payload
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request is rejected or the channel
    /// goes away
    async fn send(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Register a handler for push events named `event`
    fn on(&self, event: &str, handler: EventHandler);
}

#[async_trait]
impl<S: LiveSession + ?Sized> LiveSession for Arc<S> {
    async fn send(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        (**self).send(method, params).await
    }

    fn on(&self, event: &str, handler: EventHandler) {
        (**self).on(event, handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Rejected {
            code: -32601,
            message: "'X.foo' wasn't found".to_string(),
        };
        assert_eq!(err.to_string(), "Request rejected (-32601): 'X.foo' wasn't found");
        assert_eq!(TransportError::Closed.to_string(), "Session closed");
    }
}
