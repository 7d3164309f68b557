//! Subcommand implementations.
//!
//! Each command returns the text to print so it can be checked in tests.

use crate::config::CliConfig;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use protoreplay_core::IdentifierKind;
use protoreplay_log::{LogSummary, RecordedLog};
use protoreplay_replay::{
    HookChain, ReplayOutcome, ReplayPlan, ReplayStatus, Replayer, ScriptedSession, TraceHooks,
};
use std::fmt::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

async fn load_log(path: &Path) -> Result<RecordedLog> {
    let log = RecordedLog::load_file(path)
        .await
        .wrap_err_with(|| format!("loading {}", path.display()))?;
    info!(path = %path.display(), entries = log.len(), "log loaded");
    Ok(log)
}

async fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(path) => CliConfig::load(path)
            .await
            .wrap_err_with(|| format!("reading config {}", path.display())),
        None => Ok(CliConfig::default()),
    }
}

fn replayer_for(config: &CliConfig) -> Replayer {
    Replayer::new()
        .with_config(config.replay.clone())
        .with_filter(config.method_filter())
}

/// Summarize a recorded log
///
/// # Errors
///
/// Fails if the log cannot be read or is malformed
pub async fn inspect(log: &Path, json: bool) -> Result<String> {
    let summary = LogSummary::of(&load_log(log).await?);
    if json {
        return Ok(serde_json::to_string_pretty(&summary)?);
    }

    let mut out = String::new();
    writeln!(out, "requests:   {}", summary.requests)?;
    writeln!(out, "responses:  {}", summary.responses)?;
    writeln!(out, "unanswered: {}", summary.unanswered.len())?;
    writeln!(out, "orphaned:   {}", summary.orphaned.len())?;
    writeln!(out, "ignored:    {}", summary.ignored)?;
    writeln!(out, "domains:")?;
    for (domain, count) in summary.domains() {
        writeln!(out, "  {count:>5}  {domain}")?;
    }
    writeln!(out, "methods:")?;
    for (method, count) in &summary.methods {
        writeln!(out, "  {count:>5}  {method}")?;
    }
    Ok(out)
}

/// List the pairs a replay would send
///
/// # Errors
///
/// Fails on unreadable input or a malformed log
pub async fn plan(log: &Path, config: Option<&Path>) -> Result<String> {
    let log = load_log(log).await?;
    let config = load_config(config).await?;
    let plan = replayer_for(&config).prepare(&log)?;
    render_plan(&plan)
}

fn render_plan(plan: &ReplayPlan) -> Result<String> {
    let mut out = String::new();
    for (index, pair) in plan.scheduled().iter().enumerate() {
        let marker = if pair.is_answered() { ' ' } else { '?' };
        writeln!(out, "{index:>5} {marker} {:<8} {}", pair.id(), pair.method())?;
    }
    writeln!(
        out,
        "{} scheduled, {} filtered out, {} total",
        plan.len(),
        plan.skipped(),
        plan.total()
    )?;
    Ok(out)
}

/// Replay a log against its own recorded responses
///
/// # Errors
///
/// Fails on unreadable input, a malformed log, or a replay error
pub async fn rehearse(
    log: &Path,
    config: Option<&Path>,
    pauses: bool,
    cancel: CancellationToken,
) -> Result<String> {
    let log = load_log(log).await?;
    let config = load_config(config).await?;

    let mut hooks = HookChain::new().with(TraceHooks);
    if pauses {
        hooks = hooks.with(config.delay_hooks());
    }
    let replayer = replayer_for(&config)
        .with_hooks(hooks)
        .with_cancellation(cancel);

    let plan = replayer.prepare(&log)?;
    let session = ScriptedSession::from_pairs(plan.scheduled());
    let outcome = replayer.replay(&plan, &session).await?;
    render_outcome(&outcome)
}

fn render_outcome(outcome: &ReplayOutcome) -> Result<String> {
    let mut out = String::new();
    match outcome.status() {
        ReplayStatus::Completed => writeln!(out, "completed: {} sent", outcome.sent())?,
        ReplayStatus::Cancelled { next_index } => writeln!(
            out,
            "cancelled before pair {next_index}: {} sent",
            outcome.sent()
        )?,
    }
    for kind in IdentifierKind::ALL {
        let mapping = outcome.table().mapping(kind);
        if mapping.is_empty() {
            continue;
        }
        writeln!(out, "{kind} ids:")?;
        for (old, new) in mapping.iter() {
            writeln!(out, "  {old} -> {new}")?;
        }
    }
    if !outcome.warnings().is_empty() {
        writeln!(out, "warnings:")?;
        for warning in outcome.warnings() {
            writeln!(out, "  {warning}")?;
        }
    }
    Ok(out)
}
