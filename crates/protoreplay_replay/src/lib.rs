//! protoreplay replay engine
//!
//! Sequential replay of a recorded protocol session against a live one.
//! Server-issued identifiers learned from live responses are substituted
//! into later requests before they are sent.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod mock;
pub mod rules;
pub mod session;
pub mod substitution;

pub use engine::{
    ReplayConfig, ReplayOutcome, ReplayPlan, ReplayStatus, Replayer, StepRecord,
    UnresolvedPolicy,
};
pub use error::{HookStage, ReplayError, ReplayWarning};
pub use filter::{AcceptAll, CommandFilter, MethodFilter};
pub use hooks::{
    BoxError, DelayHooks, HookChain, HookError, NoopHooks, ProbeHooks, ReplayHooks, TraceHooks,
};
pub use mock::{ScriptedSession, SentRequest};
pub use rules::{EXTRACTION_RULES, ExtractionRule, rule_for};
pub use session::{EventHandler, LiveSession, TransportError};
pub use substitution::{
    IdentifierMap, RecordOutcome, Rewrite, Substitution, SubstitutionTable, UnresolvedIdentifier,
};
pub use tokio_util::sync::CancellationToken;
