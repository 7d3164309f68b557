//! Deciding which recorded pairs are replayed.
//!
//! A rejected pair is dropped entirely: it is never sent and its recorded
//! response never feeds the substitution table. Identifiers issued only by
//! a filtered-out call are therefore unavailable to later requests; picking
//! a filter that keeps the identifier-issuing calls is up to the caller.

use protoreplay_log::RequestResponsePair;
use serde::{Deserialize, Serialize};

/// Predicate over recorded pairs
pub trait CommandFilter: Send + Sync {
    /// Whether `pair` should be replayed
    fn should_replay(&self, pair: &RequestResponsePair) -> bool;
}

impl<F> CommandFilter for F
where
    F: Fn(&RequestResponsePair) -> bool + Send + Sync,
{
    fn should_replay(&self, pair: &RequestResponsePair) -> bool {
        self(pair)
    }
}

/// Filter that replays everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl CommandFilter for AcceptAll {
    fn should_replay(&self, _pair: &RequestResponsePair) -> bool {
        true
    }
}

/// Method-name filter: deny by prefix, with exact-name exceptions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFilter {
    /// Methods starting with any of these are skipped
    pub deny_prefixes: Vec<String>,
    /// Methods replayed even when a deny prefix matches
    pub allow: Vec<String>,
}

/// Domains and calls that can usually be dropped without changing how a
/// page-level session behaves
const QUIET_PREFIXES: &[&str] = &[
    "CSS.",
    "Debugger.",
    "DOM.resolveNode",
    "DOMDebugger.",
    "Emulation.",
    "IO.",
    "Log.",
    "Network.",
    "Profiler.",
    "Runtime.callFunctionOn",
    "Runtime.evaluate",
];

const QUIET_ALLOW: &[&str] = &["Network.enable"];

impl MethodFilter {
    /// Create an empty filter (replays everything)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset that skips inspection, emulation and evaluation traffic
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            deny_prefixes: QUIET_PREFIXES.iter().map(|p| (*p).to_string()).collect(),
            allow: QUIET_ALLOW.iter().map(|m| (*m).to_string()).collect(),
        }
    }

    /// Add a deny prefix
    #[must_use]
    pub fn deny_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.deny_prefixes.push(prefix.into());
        self
    }

    /// Add an exact-name exception
    #[must_use]
    pub fn allow(mut self, method: impl Into<String>) -> Self {
        self.allow.push(method.into());
        self
    }

    /// Whether `method` passes the filter
    #[must_use]
    pub fn accepts(&self, method: &str) -> bool {
        if self.allow.iter().any(|m| m == method) {
            return true;
        }
        !self
            .deny_prefixes
            .iter()
            .any(|prefix| method.starts_with(prefix.as_str()))
    }
}

impl CommandFilter for MethodFilter {
    fn should_replay(&self, pair: &RequestResponsePair) -> bool {
        self.accepts(pair.method())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protoreplay_core::CorrelationId;
    use protoreplay_log::RecordedRequest;
    use serde_json::Map;

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

    #[test]
    fn test_accept_all() {
        assert!(AcceptAll.should_replay(&pair_for("Debugger.enable")));
    }

    #[test]
    fn test_closure_filter() {
        let filter = |pair: &RequestResponsePair| !pair.method().starts_with("Debugger.");
        assert!(!filter.should_replay(&pair_for("Debugger.enable")));
        assert!(filter.should_replay(&pair_for("Page.enable")));
    }

    #[test]
    fn test_quiet_preset() {
        let filter = MethodFilter::quiet();
        assert!(!filter.accepts("CSS.enable"));
        assert!(!filter.accepts("Network.setCacheDisabled"));
        assert!(filter.accepts("Network.enable"));
        assert!(!filter.accepts("Runtime.evaluate"));
        assert!(filter.accepts("Runtime.enable"));
        assert!(!filter.accepts("DOM.resolveNode"));
        assert!(filter.accepts("DOM.getDocument"));
        assert!(filter.accepts("Page.getInstallabilityErrors"));
        assert!(filter.accepts("Storage.clearDataForOrigin"));
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = MethodFilter::new();
        assert!(filter.accepts("Anything.atAll"));
    }

    #[test]
    fn test_builder() {
        let filter = MethodFilter::new().deny_prefix("Fetch.").allow("Fetch.enable");
        assert!(!filter.should_replay(&pair_for("Fetch.continueRequest")));
        assert!(filter.should_replay(&pair_for("Fetch.enable")));
    }

    #[test]
    fn test_filter_deserialize() {
        let filter: MethodFilter =
            serde_json::from_str(r#"{"deny_prefixes": ["Log."], "allow": []}"#).unwrap();
        assert!(!filter.accepts("Log.enable"));
    }
}
