//! Identifier substitution table.
//!
//! One append-only mapping per identifier kind, from the value seen in the
//! recorded session to the value seen in the live session. The table is
//! created fresh for every replay run.

use crate::rules::{identifier_text, rule_for};
use indexmap::IndexMap;
use protoreplay_core::IdentifierKind;
use serde::Serialize;
use serde_json::{Map, Value};

/// Old-session to new-session values for one identifier kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdentifierMap {
    entries: IndexMap<String, String>,
}

/// Result of inserting into an `IdentifierMap`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapInsert {
    /// New entry stored
    Inserted,
    /// Same mapping observed again
    AlreadyMapped,
    /// Old value already maps elsewhere; the first mapping is kept
    Conflict {
        /// Value kept in the map
        kept: String,
    },
}

impl IdentifierMap {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// New value for `old`
    #[must_use]
    pub fn get(&self, old: &str) -> Option<&str> {
        self.entries.get(old).map(String::as_str)
    }

    /// Whether `old` has a mapping
    #[must_use]
    pub fn contains(&self, old: &str) -> bool {
        self.entries.contains_key(old)
    }

    /// Number of mappings
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mappings in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Insert `old -> new` unless `old` is already mapped
    pub fn insert(&mut self, old: String, new: String) -> MapInsert {
        match self.entries.get(&old) {
            Some(kept) if *kept == new => MapInsert::AlreadyMapped,
            Some(kept) => MapInsert::Conflict { kept: kept.clone() },
            None => {
                self.entries.insert(old, new);
                MapInsert::Inserted
            }
        }
    }
}

/// A parameter identifier with no mapping at rewrite time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedIdentifier {
    /// Identifier kind
    pub kind: IdentifierKind,
    /// Stale value left in place
    pub value: String,
}

/// A parameter identifier that was replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// Identifier kind
    pub kind: IdentifierKind,
    /// Recorded value
    pub old: String,
    /// Live value written in its place
    pub new: String,
}

/// Rewritten request parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Rewrite {
    /// Parameters ready to send
    pub params: Map<String, Value>,
    /// Fields that were replaced
    pub substituted: Vec<Substitution>,
    /// Fields left unresolved
    pub unresolved: Vec<UnresolvedIdentifier>,
}

/// What `SubstitutionTable::record` did with a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The method issues no tracked identifier
    NoRule,
    /// No recorded response, or it lacks the rule's field
    MissingRecorded {
        /// Kind the rule would have fed
        kind: IdentifierKind,
    },
    /// The live response lacks the rule's field
    MissingLive {
        /// Kind the rule would have fed
        kind: IdentifierKind,
    },
    /// A new mapping was stored
    Inserted {
        /// Mapping updated
        kind: IdentifierKind,
        /// Recorded value
        old: String,
        /// Live value
        new: String,
    },
    /// The same mapping was observed again
    AlreadyMapped {
        /// Mapping consulted
        kind: IdentifierKind,
        /// Recorded value
        old: String,
    },
    /// A different live value was observed for an already-mapped old value
    Conflict {
        /// Mapping consulted
        kind: IdentifierKind,
        /// Recorded value
        old: String,
        /// Value kept from the first observation
        kept: String,
        /// Value discarded
        ignored: String,
    },
}

/// The four identifier mappings of one replay run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionTable {
    target: IdentifierMap,
    session: IdentifierMap,
    frame: IdentifierMap,
    execution_context: IdentifierMap,
}

impl SubstitutionTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping for `kind`
    #[must_use]
    pub fn mapping(&self, kind: IdentifierKind) -> &IdentifierMap {
        match kind {
            IdentifierKind::Target => &self.target,
            IdentifierKind::Session => &self.session,
            IdentifierKind::Frame => &self.frame,
            IdentifierKind::ExecutionContext => &self.execution_context,
        }
    }

    fn mapping_mut(&mut self, kind: IdentifierKind) -> &mut IdentifierMap {
        match kind {
            IdentifierKind::Target => &mut self.target,
            IdentifierKind::Session => &mut self.session,
            IdentifierKind::Frame => &mut self.frame,
            IdentifierKind::ExecutionContext => &mut self.execution_context,
        }
    }

    /// Target-id mapping
    #[must_use]
    pub fn target_ids(&self) -> &IdentifierMap {
        &self.target
    }

    /// Sub-session-id mapping
    #[must_use]
    pub fn session_ids(&self) -> &IdentifierMap {
        &self.session
    }

    /// Live value for a recorded identifier
    #[must_use]
    pub fn resolve(&self, kind: IdentifierKind, old: &str) -> Option<&str> {
        self.mapping(kind).get(old)
    }

    /// Whether every mapping is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        IdentifierKind::ALL
            .iter()
            .all(|kind| self.mapping(*kind).is_empty())
    }

    /// Total number of mappings across all kinds
    #[must_use]
    pub fn len(&self) -> usize {
        IdentifierKind::ALL
            .iter()
            .map(|kind| self.mapping(*kind).len())
            .sum()
    }

    /// Rewrite the top-level identifier fields of outgoing parameters
    ///
    /// Mapped values are replaced; unmapped ones stay in place and are
    /// reported as unresolved. Nested objects are not inspected.
    #[must_use]
    pub fn rewrite(&self, params: &Map<String, Value>) -> Rewrite {
        let mut rewritten = params.clone();
        let mut substituted = Vec::new();
        let mut unresolved = Vec::new();

        for kind in IdentifierKind::ALL {
            let field = kind.param_field();
            let Some(current) = params.get(field) else {
                continue;
            };
            let Some(old) = identifier_text(current) else {
                continue;
            };

            match self.resolve(kind, &old) {
                Some(new) => {
                    rewritten.insert(field.to_string(), shaped_like(current, new));
                    substituted.push(Substitution {
                        kind,
                        old,
                        new: new.to_string(),
                    });
                }
                None => unresolved.push(UnresolvedIdentifier { kind, value: old }),
            }
        }

        Rewrite {
            params: rewritten,
            substituted,
            unresolved,
        }
    }

    /// Learn a mapping from a recorded/live response pair of `method`
    pub fn record(
        &mut self,
        method: &str,
        recorded: Option<&Value>,
        live: &Value,
    ) -> RecordOutcome {
        let Some(rule) = rule_for(method) else {
            return RecordOutcome::NoRule;
        };
        let kind = rule.kind;
        let Some(old) = recorded.and_then(|r| rule.extract_recorded(r)) else {
            return RecordOutcome::MissingRecorded { kind };
        };
        let Some(new) = rule.extract_live(live) else {
            return RecordOutcome::MissingLive { kind };
        };

        match self.mapping_mut(kind).insert(old.clone(), new.clone()) {
            MapInsert::Inserted => RecordOutcome::Inserted { kind, old, new },
            MapInsert::AlreadyMapped => RecordOutcome::AlreadyMapped { kind, old },
            MapInsert::Conflict { kept } => RecordOutcome::Conflict {
                kind,
                old,
                kept,
                ignored: new,
            },
        }
    }
}

/// Write `new` with the JSON type of the value it replaces
fn shaped_like(current: &Value, new: &str) -> Value {
    if current.is_number() {
        if let Ok(n) = new.parse::<i64>() {
            return Value::from(n);
        }
        if let Ok(n) = new.parse::<u64>() {
            return Value::from(n);
        }
    }
    Value::String(new.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_table_new_is_empty() {
        let table = SubstitutionTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_record_target_info() {
        let mut table = SubstitutionTable::new();
        let outcome = table.record(
            "Target.getTargetInfo",
            Some(&json!({"targetInfo": {"targetId": "OLD1"}})),
            &json!({"targetInfo": {"targetId": "NEW1"}}),
        );
        assert_eq!(
            outcome,
            RecordOutcome::Inserted {
                kind: IdentifierKind::Target,
                old: "OLD1".to_string(),
                new: "NEW1".to_string(),
            }
        );
        assert_eq!(table.target_ids().get("OLD1"), Some("NEW1"));
    }

    #[test]
    fn test_record_first_write_wins() {
        let mut table = SubstitutionTable::new();
        table.record(
            "Target.attachToTarget",
            Some(&json!({"sessionId": "S-OLD"})),
            &json!({"sessionId": "S-NEW"}),
        );
        let outcome = table.record(
            "Target.attachToTarget",
            Some(&json!({"sessionId": "S-OLD"})),
            &json!({"sessionId": "S-OTHER"}),
        );
        assert_eq!(
            outcome,
            RecordOutcome::Conflict {
                kind: IdentifierKind::Session,
                old: "S-OLD".to_string(),
                kept: "S-NEW".to_string(),
                ignored: "S-OTHER".to_string(),
            }
        );
        assert_eq!(table.session_ids().get("S-OLD"), Some("S-NEW"));
        assert_eq!(table.session_ids().len(), 1);
    }

    #[test]
    fn test_record_same_mapping_twice() {
        let mut table = SubstitutionTable::new();
        let recorded = json!({"frameTree": {"frame": {"id": "F-OLD"}}});
        let live = json!({"frameTree": {"frame": {"id": "F-NEW"}}});
        table.record("Page.getResourceTree", Some(&recorded), &live);
        let outcome = table.record("Page.getResourceTree", Some(&recorded), &live);
        assert!(matches!(outcome, RecordOutcome::AlreadyMapped { .. }));
    }

    #[test]
    fn test_record_without_recorded_response() {
        let mut table = SubstitutionTable::new();
        let outcome = table.record("Target.attachToTarget", None, &json!({"sessionId": "S"}));
        assert_eq!(
            outcome,
            RecordOutcome::MissingRecorded {
                kind: IdentifierKind::Session
            }
        );
        assert!(table.is_empty());
    }

    #[test]
    fn test_record_live_missing_field() {
        let mut table = SubstitutionTable::new();
        let outcome = table.record(
            "Target.attachToTarget",
            Some(&json!({"sessionId": "S"})),
            &json!({}),
        );
        assert!(matches!(outcome, RecordOutcome::MissingLive { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn test_record_unknown_method() {
        let mut table = SubstitutionTable::new();
        let outcome = table.record("Page.enable", Some(&json!({})), &json!({}));
        assert_eq!(outcome, RecordOutcome::NoRule);
    }

    #[test]
    fn test_rewrite_replaces_mapped_fields() {
        let mut table = SubstitutionTable::new();
        table.record(
            "Target.getTargetInfo",
            Some(&json!({"targetInfo": {"targetId": "OLD1"}})),
            &json!({"targetInfo": {"targetId": "NEW1"}}),
        );

        let rewrite = table.rewrite(&params(json!({"targetId": "OLD1", "flatten": true})));
        assert_eq!(rewrite.params["targetId"], json!("NEW1"));
        assert_eq!(rewrite.params["flatten"], json!(true));
        assert_eq!(rewrite.substituted.len(), 1);
        assert!(rewrite.unresolved.is_empty());
    }

    #[test]
    fn test_rewrite_leaves_unmapped_in_place() {
        let table = SubstitutionTable::new();
        let rewrite = table.rewrite(&params(json!({"sessionId": "STALE"})));
        assert_eq!(rewrite.params["sessionId"], json!("STALE"));
        assert_eq!(
            rewrite.unresolved,
            vec![UnresolvedIdentifier {
                kind: IdentifierKind::Session,
                value: "STALE".to_string(),
            }]
        );
    }

    #[test]
    fn test_rewrite_is_shallow() {
        let mut table = SubstitutionTable::new();
        table.record(
            "Page.getResourceTree",
            Some(&json!({"frameTree": {"frame": {"id": "F-OLD"}}})),
            &json!({"frameTree": {"frame": {"id": "F-NEW"}}}),
        );
        let rewrite = table.rewrite(&params(json!({"nested": {"frameId": "F-OLD"}})));
        assert_eq!(rewrite.params["nested"]["frameId"], json!("F-OLD"));
        assert!(rewrite.substituted.is_empty());
    }

    #[test]
    fn test_rewrite_keeps_integer_context_ids() {
        let mut table = SubstitutionTable::new();
        table.record(
            "Page.createIsolatedWorld",
            Some(&json!({"executionContextId": 3})),
            &json!({"executionContextId": 8}),
        );
        let rewrite = table.rewrite(&params(json!({"contextId": 3})));
        assert_eq!(rewrite.params["contextId"], json!(8));
    }

    #[test]
    fn test_rewrite_all_kinds() {
        let mut table = SubstitutionTable::new();
        table.record(
            "Target.getTargetInfo",
            Some(&json!({"targetInfo": {"targetId": "T0"}})),
            &json!({"targetInfo": {"targetId": "T1"}}),
        );
        table.record(
            "Target.attachToTarget",
            Some(&json!({"sessionId": "S0"})),
            &json!({"sessionId": "S1"}),
        );
        table.record(
            "Page.getFrameTree",
            Some(&json!({"frameTree": {"frame": {"id": "F0"}}})),
            &json!({"frameTree": {"frame": {"id": "F1"}}}),
        );
        table.record(
            "Page.createIsolatedWorld",
            Some(&json!({"contextId": "C0"})),
            &json!({"contextId": "C1"}),
        );
        assert_eq!(table.len(), 4);

        let rewrite = table.rewrite(&params(json!({
            "targetId": "T0",
            "sessionId": "S0",
            "frameId": "F0",
            "contextId": "C0"
        })));
        assert_eq!(
            Value::Object(rewrite.params),
            json!({"targetId": "T1", "sessionId": "S1", "frameId": "F1", "contextId": "C1"})
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_rewrite_without_identifier_fields_is_identity(
            fields in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8)
        ) {
            let mut table = SubstitutionTable::new();
            table.record(
                "Target.attachToTarget",
                Some(&json!({"sessionId": "S0"})),
                &json!({"sessionId": "S1"}),
            );
            let input: Map<String, Value> = fields
                .into_iter()
                .filter(|(k, _)| IdentifierKind::from_param_field(k).is_none())
                .map(|(k, v)| (k, Value::from(v)))
                .collect();
            let rewrite = table.rewrite(&input);
            prop_assert_eq!(rewrite.params, input);
            prop_assert!(rewrite.substituted.is_empty());
            prop_assert!(rewrite.unresolved.is_empty());
        }
    }
}
