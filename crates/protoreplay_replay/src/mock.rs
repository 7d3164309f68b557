//! In-memory session for tests and offline rehearsal.
//!
//! `ScriptedSession` answers each method from a FIFO queue of scripted
//! replies, falls back to a fixed response when the queue is empty, records
//! every request it receives, and can fire push events at registered
//! handlers.

use crate::session::{EventHandler, LiveSession, TransportError};
use async_trait::async_trait;
use protoreplay_log::RequestResponsePair;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// A request observed by the scripted session
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    /// Method name
    pub method: String,
    /// Parameters as sent
    pub params: Value,
}

#[derive(Default)]
struct ScriptState {
    replies: HashMap<String, VecDeque<Result<Value, TransportError>>>,
    sent: Vec<SentRequest>,
    handlers: HashMap<String, Vec<EventHandler>>,
}

/// Scripted `LiveSession`
pub struct ScriptedSession {
    state: Mutex<ScriptState>,
    fallback: Value,
}

impl ScriptedSession {
    /// Create a session answering `{}` to everything
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState::default()),
            fallback: Value::Object(Map::new()),
        }
    }

    /// Script every recorded response of `pairs`, per method in order
    ///
    /// Pairs without a recorded response are answered with the fallback.
    #[must_use]
    pub fn from_pairs(pairs: &[RequestResponsePair]) -> Self {
        let session = Self::new();
        for pair in pairs {
            let reply = pair
                .recorded_result()
                .cloned()
                .unwrap_or_else(|| session.fallback.clone());
            session.respond(pair.method(), reply);
        }
        session
    }

    /// Answer used when no reply is queued for a method
    #[must_use]
    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = fallback;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a successful reply for `method`
    pub fn respond(&self, method: impl Into<String>, reply: Value) {
        self.lock()
            .replies
            .entry(method.into())
            .or_default()
            .push_back(Ok(reply));
    }

    /// Queue a transport failure for `method`
    pub fn fail(&self, method: impl Into<String>, err: TransportError) {
        self.lock()
            .replies
            .entry(method.into())
            .or_default()
            .push_back(Err(err));
    }

    /// Every request received so far, in order
    #[must_use]
    pub fn sent(&self) -> Vec<SentRequest> {
        self.lock().sent.clone()
    }

    /// Methods received so far, in order
    #[must_use]
    pub fn sent_methods(&self) -> Vec<String> {
        self.lock().sent.iter().map(|r| r.method.clone()).collect()
    }

    /// Number of handlers registered for `event`
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.lock().handlers.get(event).map_or(0, Vec::len)
    }

    /// Deliver a push event; returns how many handlers ran
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let handlers = self.lock().handlers.get(event).cloned().unwrap_or_default();
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }
}

impl Default for ScriptedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ScriptedSession")
            .field("queued", &state.replies.values().map(VecDeque::len).sum::<usize>())
            .field("sent", &state.sent.len())
            .finish()
    }
}

#[async_trait]
impl LiveSession for ScriptedSession {
    async fn send(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let mut state = self.lock();
        state.sent.push(SentRequest {
            method: method.to_string(),
            params,
        });
        state
            .replies
            .get_mut(method)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn on(&self, event: &str, handler: EventHandler) {
        self.lock()
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoreplay_log::{LogEntry, pair};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_replies_in_fifo_order() {
        let session = ScriptedSession::new();
        session.respond("A.a", json!({"n": 1}));
        session.respond("A.a", json!({"n": 2}));

        assert_eq!(session.send("A.a", json!({})).await.unwrap(), json!({"n": 1}));
        assert_eq!(session.send("A.a", json!({})).await.unwrap(), json!({"n": 2}));
        assert_eq!(session.send("A.a", json!({})).await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn test_records_requests() {
        let session = ScriptedSession::new();
        session.send("Page.enable", json!({"x": 1})).await.unwrap();
        assert_eq!(
            session.sent(),
            vec![SentRequest {
                method: "Page.enable".to_string(),
                params: json!({"x": 1}),
            }]
        );
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let session = ScriptedSession::new();
        session.fail("Page.navigate", TransportError::Closed);
        let err = session.send("Page.navigate", json!({})).await.unwrap_err();
        assert_eq!(err, TransportError::Closed);
    }

    #[tokio::test]
    async fn test_fallback() {
        let session = ScriptedSession::new().with_fallback(json!({"ok": true}));
        assert_eq!(session.send("X.y", json!({})).await.unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_from_pairs() {
        let pairs = pair(&[
            LogEntry::send(1, "Target.attachToTarget", json!({})),
            LogEntry::recv(1, json!({"sessionId": "S1"})),
            LogEntry::send(2, "Page.enable", json!({})),
        ])
        .unwrap();
        let session = ScriptedSession::from_pairs(&pairs);
        let queued = format!("{:?}", session);
        assert!(queued.contains("queued: 2"));
    }

    #[test]
    fn test_emit_events() {
        let session = ScriptedSession::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        session.on(
            "ServiceWorker.workerRegistrationUpdated",
            Arc::new(move |_payload: &Value| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(session.handler_count("ServiceWorker.workerRegistrationUpdated"), 1);
        let ran = session.emit("ServiceWorker.workerRegistrationUpdated", &json!({}));
        assert_eq!(ran, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(session.emit("Other.event", &json!({})), 0);
    }
}
