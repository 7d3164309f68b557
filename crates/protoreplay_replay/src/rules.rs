//! Which responses issue identifiers.
//!
//! The table below is fixed protocol knowledge: for each identifier-issuing
//! method it names the response field holding the new identifier and the
//! table it feeds. Fields are JSON pointers; when several are listed the
//! first one present in the response wins.

use protoreplay_core::IdentifierKind;
use serde_json::Value;

/// Static extraction rule for one identifier-issuing method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRule {
    /// Protocol method the rule applies to
    pub method: &'static str,
    /// Mapping the rule updates
    pub kind: IdentifierKind,
    /// Fields of the live response holding the new-session value
    pub live_fields: &'static [&'static str],
    /// Fields of the recorded response holding the old-session value
    pub recorded_fields: &'static [&'static str],
}

const TARGET_INFO_ID: &[&str] = &["/targetInfo/targetId"];
const TARGET_ID: &[&str] = &["/targetId"];
const SESSION_ID: &[&str] = &["/sessionId"];
const ROOT_FRAME_ID: &[&str] = &["/frameTree/frame/id"];
const CONTEXT_ID: &[&str] = &["/executionContextId", "/contextId"];

/// Every known extraction rule
pub const EXTRACTION_RULES: &[ExtractionRule] = &[
    ExtractionRule {
        method: "Target.getTargetInfo",
        kind: IdentifierKind::Target,
        live_fields: TARGET_INFO_ID,
        recorded_fields: TARGET_INFO_ID,
    },
    ExtractionRule {
        method: "Target.createTarget",
        kind: IdentifierKind::Target,
        live_fields: TARGET_ID,
        recorded_fields: TARGET_ID,
    },
    ExtractionRule {
        method: "Target.attachToTarget",
        kind: IdentifierKind::Session,
        live_fields: SESSION_ID,
        recorded_fields: SESSION_ID,
    },
    ExtractionRule {
        method: "Page.getResourceTree",
        kind: IdentifierKind::Frame,
        live_fields: ROOT_FRAME_ID,
        recorded_fields: ROOT_FRAME_ID,
    },
    ExtractionRule {
        method: "Page.getFrameTree",
        kind: IdentifierKind::Frame,
        live_fields: ROOT_FRAME_ID,
        recorded_fields: ROOT_FRAME_ID,
    },
    ExtractionRule {
        method: "Page.createIsolatedWorld",
        kind: IdentifierKind::ExecutionContext,
        live_fields: CONTEXT_ID,
        recorded_fields: CONTEXT_ID,
    },
];

/// Find the rule for `method`, if it issues an identifier
#[must_use]
pub fn rule_for(method: &str) -> Option<&'static ExtractionRule> {
    EXTRACTION_RULES.iter().find(|rule| rule.method == method)
}

impl ExtractionRule {
    /// New-session identifier carried by a live response
    #[must_use]
    pub fn extract_live(&self, response: &Value) -> Option<String> {
        extract(response, self.live_fields)
    }

    /// Old-session identifier carried by a recorded response
    #[must_use]
    pub fn extract_recorded(&self, response: &Value) -> Option<String> {
        extract(response, self.recorded_fields)
    }
}

fn extract(response: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|pointer| response.pointer(pointer).and_then(identifier_text))
}

/// String form of an identifier value
///
/// Identifiers are strings or integers on the wire; anything else (and the
/// empty string) does not count as an identifier.
#[must_use]
pub fn identifier_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}
