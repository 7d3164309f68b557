//! Replay engine.
//!
//! Re-issues recorded requests, in order, against a live session whose
//! server-issued identifiers differ from the recording. One request is in
//! flight at a time: later requests may reference identifiers that only an
//! earlier live response can supply.
//!
//! The engine imposes no timeout. A request that never gets an answer keeps
//! the replay suspended; wrap the future in a timeout if that is unwanted.

use crate::error::{HookStage, ReplayError, ReplayWarning};
use crate::filter::{AcceptAll, CommandFilter};
use crate::hooks::{NoopHooks, ReplayHooks};
use crate::session::LiveSession;
use crate::substitution::{IdentifierMap, RecordOutcome, Substitution, SubstitutionTable};
use protoreplay_core::CorrelationId;
use protoreplay_log::{LogResult, RecordedLog, RequestResponsePair};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// What to do with an identifier that has no substitution yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Send the recorded value and warn
    #[default]
    Lenient,
    /// Abort the replay
    Strict,
}

/// Replay engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    /// Handling of unresolved identifiers
    pub unresolved: UnresolvedPolicy,
    /// Push events to log while replaying; never used for correlation
    pub watch_events: Vec<String>,
}

/// Progress of one pair through the engine; drives transition logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReplayPhase {
    Pending,
    Sending,
    AwaitingResponse,
    Recorded,
    Done,
    Failed,
}

/// The pairs a replay will send, after filtering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayPlan {
    scheduled: Vec<RequestResponsePair>,
    total: usize,
}

impl ReplayPlan {
    /// Pairs scheduled for replay, in order
    #[must_use]
    pub fn scheduled(&self) -> &[RequestResponsePair] {
        &self.scheduled
    }

    /// Number of scheduled pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    /// Whether nothing is scheduled
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }

    /// Pairs in the log before filtering
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Pairs rejected by the filter
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.total - self.scheduled.len()
    }
}

/// How a replay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStatus {
    /// Every scheduled pair was replayed
    Completed,
    /// Cancellation was observed before pair `next_index` was sent
    Cancelled {
        /// First pair that was not sent
        next_index: usize,
    },
}

/// Record of one replayed pair
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// Position in the scheduled sequence
    pub index: usize,
    /// Correlation id of the recorded request
    pub id: CorrelationId,
    /// Method sent
    pub method: String,
    /// Identifier fields rewritten before sending
    pub substituted: Vec<Substitution>,
    /// Effect of the response on the substitution table; `None` when no
    /// response was recorded
    pub learned: Option<RecordOutcome>,
}

/// Result of a replay that was not aborted by an error
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    status: ReplayStatus,
    table: SubstitutionTable,
    steps: Vec<StepRecord>,
    warnings: Vec<ReplayWarning>,
}

impl ReplayOutcome {
    /// How the replay ended
    #[must_use]
    pub fn status(&self) -> ReplayStatus {
        self.status
    }

    /// Whether every scheduled pair was replayed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == ReplayStatus::Completed
    }

    /// Number of requests sent
    #[must_use]
    pub fn sent(&self) -> usize {
        self.steps.len()
    }

    /// Per-pair records, in order
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Non-fatal conditions observed
    #[must_use]
    pub fn warnings(&self) -> &[ReplayWarning] {
        &self.warnings
    }

    /// The full substitution table
    #[must_use]
    pub fn table(&self) -> &SubstitutionTable {
        &self.table
    }

    /// Recorded to live target ids
    #[must_use]
    pub fn target_ids(&self) -> &IdentifierMap {
        self.table.target_ids()
    }

    /// Recorded to live sub-session ids
    #[must_use]
    pub fn session_ids(&self) -> &IdentifierMap {
        self.table.session_ids()
    }
}

/// Replay engine
pub struct Replayer {
    config: ReplayConfig,
    filter: Box<dyn CommandFilter>,
    hooks: Box<dyn ReplayHooks>,
    cancel: CancellationToken,
}

impl Replayer {
    /// Create an engine that replays everything with no hooks
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ReplayConfig::default(),
            filter: Box::new(AcceptAll),
            hooks: Box::new(NoopHooks),
            cancel: CancellationToken::new(),
        }
    }

    /// Create with custom config
    #[must_use]
    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the pair filter
    #[must_use]
    pub fn with_filter(mut self, filter: impl CommandFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Set lifecycle hooks
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl ReplayHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Observe an external cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this engine's replays
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Pair a log and apply the filter
    ///
    /// # Errors
    ///
    /// Returns `LogError` if the log cannot be paired
    pub fn prepare(&self, log: &RecordedLog) -> LogResult<ReplayPlan> {
        Ok(self.schedule(log.pairs()?))
    }

    /// Apply the filter to already-built pairs
    ///
    /// The filter is evaluated exactly once per pair.
    #[must_use]
    pub fn schedule(&self, pairs: Vec<RequestResponsePair>) -> ReplayPlan {
        let total = pairs.len();
        let scheduled: Vec<_> = pairs
            .into_iter()
            .filter(|pair| {
                let keep = self.filter.should_replay(pair);
                if !keep {
                    debug!(id = %pair.id(), method = pair.method(), "filtered out");
                }
                keep
            })
            .collect();
        info!(scheduled = scheduled.len(), total, "replay plan ready");
        ReplayPlan { scheduled, total }
    }

    /// Replay `plan` against `session`
    ///
    /// Builds a fresh substitution table, then for each scheduled pair:
    /// rewrite, `before_each`, send and await, record, `after_each`. The
    /// session is used, never closed or reconfigured.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError` on the first transport failure, hook failure,
    /// or (in strict mode) unresolved identifier. Nothing is retried.
    pub async fn replay<S>(
        &self,
        plan: &ReplayPlan,
        session: &S,
    ) -> Result<ReplayOutcome, ReplayError>
    where
        S: LiveSession + ?Sized,
    {
        self.watch_events(session);

        let mut table = SubstitutionTable::new();
        let mut steps = Vec::with_capacity(plan.len());
        let mut warnings = Vec::new();
        let mut status = ReplayStatus::Completed;

        info!(pairs = plan.len(), "replay started");

        for (index, pair) in plan.scheduled().iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(index, "replay cancelled");
                status = ReplayStatus::Cancelled { next_index: index };
                break;
            }

            let span = info_span!("replay_pair", index, id = %pair.id(), method = pair.method());
            let step = self
                .replay_pair(index, pair, session, &mut table, &mut warnings)
                .instrument(span)
                .await?;
            steps.push(step);
        }

        info!(
            sent = steps.len(),
            warnings = warnings.len(),
            mappings = table.len(),
            "replay finished"
        );

        Ok(ReplayOutcome {
            status,
            table,
            steps,
            warnings,
        })
    }

    async fn replay_pair<S>(
        &self,
        index: usize,
        pair: &RequestResponsePair,
        session: &S,
        table: &mut SubstitutionTable,
        warnings: &mut Vec<ReplayWarning>,
    ) -> Result<StepRecord, ReplayError>
    where
        S: LiveSession + ?Sized,
    {
        let mut phase = ReplayPhase::Pending;
        let method = pair.method();

        let rewrite = table.rewrite(&pair.request.params);
        for unresolved in &rewrite.unresolved {
            if self.config.unresolved == UnresolvedPolicy::Strict {
                advance(&mut phase, ReplayPhase::Failed);
                error!(kind = %unresolved.kind, value = %unresolved.value, "unresolved identifier");
                return Err(ReplayError::UnresolvedIdentifier {
                    index,
                    id: pair.id(),
                    method: method.to_string(),
                    kind: unresolved.kind,
                    value: unresolved.value.clone(),
                });
            }
            warn!(kind = %unresolved.kind, value = %unresolved.value, "sending unresolved identifier");
            warnings.push(ReplayWarning::Unresolved {
                index,
                method: method.to_string(),
                kind: unresolved.kind,
                value: unresolved.value.clone(),
            });
        }

        if let Err(source) = self.hooks.before_each(pair).await {
            advance(&mut phase, ReplayPhase::Failed);
            error!(error = %source, "before_each hook failed");
            return Err(ReplayError::Hook {
                index,
                id: pair.id(),
                method: method.to_string(),
                stage: HookStage::Before,
                source,
            });
        }

        advance(&mut phase, ReplayPhase::Sending);
        let request = session.send(method, Value::Object(rewrite.params));
        advance(&mut phase, ReplayPhase::AwaitingResponse);
        let response = match request.await {
            Ok(response) => response,
            Err(source) => {
                advance(&mut phase, ReplayPhase::Failed);
                error!(error = %source, "transport failed");
                return Err(ReplayError::Transport {
                    index,
                    id: pair.id(),
                    method: method.to_string(),
                    source,
                });
            }
        };

        let learned = pair.recorded_result().map(|recorded| {
            let outcome = table.record(method, Some(recorded), &response);
            note_outcome(index, method, &outcome, warnings);
            outcome
        });
        advance(&mut phase, ReplayPhase::Recorded);

        if let Err(source) = self.hooks.after_each(pair, &response).await {
            advance(&mut phase, ReplayPhase::Failed);
            error!(error = %source, "after_each hook failed");
            return Err(ReplayError::Hook {
                index,
                id: pair.id(),
                method: method.to_string(),
                stage: HookStage::After,
                source,
            });
        }
        advance(&mut phase, ReplayPhase::Done);

        Ok(StepRecord {
            index,
            id: pair.id(),
            method: method.to_string(),
            substituted: rewrite.substituted,
            learned,
        })
    }

    fn watch_events<S: LiveSession + ?Sized>(&self, session: &S) {
        for name in &self.config.watch_events {
            let event: Arc<str> = Arc::from(name.as_str());
            session.on(
                name,
                Arc::new(move |payload: &Value| {
                    info!(event = %event, %payload, "push event");
                }),
            );
        }
    }
}

impl Default for Replayer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Replayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replayer")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

fn advance(phase: &mut ReplayPhase, next: ReplayPhase) {
    debug!(from = ?*phase, to = ?next, "phase");
    *phase = next;
}

fn note_outcome(
    index: usize,
    method: &str,
    outcome: &RecordOutcome,
    warnings: &mut Vec<ReplayWarning>,
) {
    match outcome {
        RecordOutcome::NoRule => {}
        RecordOutcome::AlreadyMapped { kind, old } => {
            warn!(%kind, %old, "identifier observed again");
            warnings.push(ReplayWarning::Duplicate {
                index,
                method: method.to_string(),
                kind: *kind,
                old: old.clone(),
            });
        }
        RecordOutcome::Inserted { kind, old, new } => {
            debug!(%kind, %old, %new, "learned identifier");
        }
        RecordOutcome::Conflict {
            kind,
            old,
            kept,
            ignored,
        } => {
            warn!(%kind, %old, %kept, %ignored, "identifier already mapped; keeping first");
            warnings.push(ReplayWarning::Conflict {
                index,
                method: method.to_string(),
                kind: *kind,
                old: old.clone(),
                kept: kept.clone(),
                ignored: ignored.clone(),
            });
        }
        RecordOutcome::MissingRecorded { kind } | RecordOutcome::MissingLive { kind } => {
            let live = matches!(outcome, RecordOutcome::MissingLive { .. });
            warn!(%kind, live, "response carries no identifier");
            warnings.push(ReplayWarning::MissingIdentifier {
                index,
                method: method.to_string(),
                kind: *kind,
                live,
            });
        }
    }
}
