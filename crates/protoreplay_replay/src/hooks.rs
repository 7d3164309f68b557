//! Lifecycle hooks around each replayed request.
//!
//! Hooks run at two synchronization points per pair: after the request is
//! rewritten but before it is sent, and after its live response arrived and
//! the substitution table was updated. The engine awaits each hook before
//! moving on. Hooks only see the recorded pair and the live response; they
//! cannot reach engine state.

use crate::session::{LiveSession, TransportError};
use async_trait::async_trait;
use indexmap::IndexMap;
use protoreplay_log::RequestResponsePair;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Boxed error produced by hook code
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure raised by a caller-supplied hook
///
/// Either a plain message or the hook's own error, kept intact as the
/// `source` so callers can downcast it.
#[derive(Debug)]
pub struct HookError {
    message: String,
    source: Option<BoxError>,
}

impl HookError {
    /// Create from a message
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            source: None,
        }
    }

    /// Wrap the hook's own error
    pub fn wrap(err: impl Into<BoxError>) -> Self {
        let source = err.into();
        Self {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Error message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The wrapped error as its concrete type, if it is a `T`
    #[must_use]
    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        self.source.as_deref()?.downcast_ref::<T>()
    }

    /// Take back the wrapped error
    #[must_use]
    pub fn into_source(self) -> Option<BoxError> {
        self.source
    }
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl From<TransportError> for HookError {
    fn from(err: TransportError) -> Self {
        Self::wrap(err)
    }
}

/// Before/after capability interface; both methods default to no-ops
#[async_trait]
pub trait ReplayHooks: Send + Sync {
    /// Called with the recorded pair right before its request is sent
    ///
    /// # Errors
    ///
    /// A returned error aborts the replay
    async fn before_each(&self, _pair: &RequestResponsePair) -> Result<(), HookError> {
        Ok(())
    }

    /// Called with the recorded pair and the live response
    ///
    /// # Errors
    ///
    /// A returned error aborts the replay
    async fn after_each(
        &self,
        _pair: &RequestResponsePair,
        _response: &Value,
    ) -> Result<(), HookError> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ReplayHooks for NoopHooks {}

/// Logs each request before it goes out and each non-empty response
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceHooks;

#[async_trait]
impl ReplayHooks for TraceHooks {
    async fn before_each(&self, pair: &RequestResponsePair) -> Result<(), HookError> {
        info!(id = %pair.id(), method = pair.method(), "sending");
        Ok(())
    }

    async fn after_each(
        &self,
        pair: &RequestResponsePair,
        response: &Value,
    ) -> Result<(), HookError> {
        let empty = response.as_object().is_some_and(|o| o.is_empty());
        if !empty {
            info!(id = %pair.id(), method = pair.method(), %response, "response");
        }
        Ok(())
    }
}

/// Artificial pauses: before selected methods, and after every response
#[derive(Debug, Clone, Default)]
pub struct DelayHooks {
    before: IndexMap<String, Duration>,
    after_each: Duration,
}

impl DelayHooks {
    /// Create with no pauses
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause before sending `method`
    #[must_use]
    pub fn pause_before(mut self, method: impl Into<String>, delay: Duration) -> Self {
        self.before.insert(method.into(), delay);
        self
    }

    /// Pause after every response
    #[must_use]
    pub fn pause_after_each(mut self, delay: Duration) -> Self {
        self.after_each = delay;
        self
    }

    /// Pause configured before `method`
    #[must_use]
    pub fn delay_before(&self, method: &str) -> Option<Duration> {
        self.before.get(method).copied()
    }
}

#[async_trait]
impl ReplayHooks for DelayHooks {
    async fn before_each(&self, pair: &RequestResponsePair) -> Result<(), HookError> {
        if let Some(delay) = self.delay_before(pair.method()) {
            info!(method = pair.method(), ?delay, "pausing before send");
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn after_each(
        &self,
        _pair: &RequestResponsePair,
        _response: &Value,
    ) -> Result<(), HookError> {
        if !self.after_each.is_zero() {
            tokio::time::sleep(self.after_each).await;
        }
        Ok(())
    }
}

/// Issues one diagnostic call after every response and logs its answer
///
/// Useful to find the exact replayed step after which a call starts to
/// misbehave. The probe runs on its own session handle; a probe that never
/// answers suspends the replay, which is the signal being looked for.
pub struct ProbeHooks<S> {
    session: S,
    method: String,
    params: Value,
}

impl<S: LiveSession> ProbeHooks<S> {
    /// Probe `method` with empty params on `session`
    pub fn new(session: S, method: impl Into<String>) -> Self {
        Self {
            session,
            method: method.into(),
            params: Value::Object(serde_json::Map::new()),
        }
    }

    /// Use `params` for the probe call
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

#[async_trait]
impl<S: LiveSession> ReplayHooks for ProbeHooks<S> {
    async fn after_each(
        &self,
        pair: &RequestResponsePair,
        _response: &Value,
    ) -> Result<(), HookError> {
        let answer = self.session.send(&self.method, self.params.clone()).await?;
        info!(probe = %self.method, after = pair.method(), %answer, "probe answered");
        Ok(())
    }
}

/// Runs several hooks in order
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Box<dyn ReplayHooks>>,
}

impl HookChain {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook
    #[must_use]
    pub fn with(mut self, hook: impl ReplayHooks + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Number of hooks
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[async_trait]
impl ReplayHooks for HookChain {
    async fn before_each(&self, pair: &RequestResponsePair) -> Result<(), HookError> {
        for hook in &self.hooks {
            hook.before_each(pair).await?;
        }
        Ok(())
    }

    async fn after_each(
        &self,
        pair: &RequestResponsePair,
        response: &Value,
    ) -> Result<(), HookError> {
        for hook in &self.hooks {
            hook.after_each(pair, response).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedSession;
    use protoreplay_core::CorrelationId;
    use protoreplay_log::RecordedRequest;
    use serde_json::{Map, json};
    use std::sync::{Arc, Mutex};

    fn pair_for(method: &str) -> RequestResponsePair {
        RequestResponsePair {
            sequence: 0,
            request: RecordedRequest {
                id: CorrelationId::new(1),
                method: method.to_string(),
                params: Map::new(),
            },
            response: None,
        }
    }

    struct Recorder {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ReplayHooks for Recorder {
        async fn before_each(&self, pair: &RequestResponsePair) -> Result<(), HookError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:before:{}", self.name, pair.method()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_noop_hooks() {
        let pair = pair_for("Page.enable");
        assert!(NoopHooks.before_each(&pair).await.is_ok());
        assert!(NoopHooks.after_each(&pair, &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let chain = HookChain::new()
            .with(Recorder {
                name: "a",
                calls: calls.clone(),
            })
            .with(Recorder {
                name: "b",
                calls: calls.clone(),
            });
        assert_eq!(chain.len(), 2);

        chain.before_each(&pair_for("Page.enable")).await.unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["a:before:Page.enable", "b:before:Page.enable"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_before_selected_method() {
        let hooks = DelayHooks::new()
            .pause_before("Page.getInstallabilityErrors", Duration::from_secs(10));

        let start = tokio::time::Instant::now();
        hooks.before_each(&pair_for("Page.enable")).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));

        hooks
            .before_each(&pair_for("Page.getInstallabilityErrors"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_after_each() {
        let hooks = DelayHooks::new().pause_after_each(Duration::from_millis(50));
        let start = tokio::time::Instant::now();
        hooks
            .after_each(&pair_for("Page.enable"), &json!({}))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_probe_calls_session() {
        let probe_session = Arc::new(ScriptedSession::new());
        probe_session.respond(
            "Page.getInstallabilityErrors",
            json!({"installabilityErrors": []}),
        );
        let hooks = ProbeHooks::new(probe_session.clone(), "Page.getInstallabilityErrors");

        hooks
            .after_each(&pair_for("Page.enable"), &json!({}))
            .await
            .unwrap();
        let sent = probe_session.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, "Page.getInstallabilityErrors");
    }

    #[tokio::test]
    async fn test_diagnostic_failure_is_hook_error() {
        let probe_session = ScriptedSession::new();
        probe_session.fail("Page.getInstallabilityErrors", TransportError::Closed);
        let hooks = ProbeHooks::new(probe_session, "Page.getInstallabilityErrors");

        let err = hooks
            .after_each(&pair_for("Page.enable"), &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Session closed");
        assert_eq!(err.downcast_ref::<TransportError>(), Some(&TransportError::Closed));
    }

    #[derive(Debug, PartialEq)]
    struct InstallabilityRegressed {
        errors: usize,
    }

    impl fmt::Display for InstallabilityRegressed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{} installability errors", self.errors)
        }
    }

    impl std::error::Error for InstallabilityRegressed {}

    #[test]
    fn test_wrapped_error_keeps_its_type() {
        let err = HookError::wrap(InstallabilityRegressed { errors: 2 });
        assert_eq!(err.message(), "2 installability errors");
        assert_eq!(
            err.downcast_ref::<InstallabilityRegressed>(),
            Some(&InstallabilityRegressed { errors: 2 })
        );
        assert!(std::error::Error::source(&err).is_some());

        let inner = err.into_source().unwrap();
        assert!(inner.downcast::<InstallabilityRegressed>().is_ok());
    }

    #[test]
    fn test_plain_message_has_no_source() {
        let err = HookError::new("diagnostic call failed");
        assert!(std::error::Error::source(&err).is_none());
        assert!(err.downcast_ref::<TransportError>().is_none());
    }
}
