//! At-a-glance statistics for a recorded log.

use crate::entry::Direction;
use crate::load::RecordedLog;
use indexmap::IndexMap;
use protoreplay_core::CorrelationId;
use serde::Serialize;
use std::collections::HashSet;

/// Summary of a recorded log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    /// Number of `send` entries
    pub requests: usize,
    /// Number of `recv` entries
    pub responses: usize,
    /// Requests whose response was never recorded
    pub unanswered: Vec<CorrelationId>,
    /// Responses with no matching request
    pub orphaned: Vec<CorrelationId>,
    /// Entries that were neither `send` nor `recv`
    pub ignored: usize,
    /// Request count per method, in first-seen order
    pub methods: IndexMap<String, usize>,
}

impl LogSummary {
    /// Summarize a log
    #[must_use]
    pub fn of(log: &RecordedLog) -> Self {
        let entries = log.entries();
        let sent: HashSet<CorrelationId> = entries
            .iter()
            .filter(|e| e.direction == Direction::Send)
            .map(|e| e.id)
            .collect();
        let received: HashSet<CorrelationId> = entries
            .iter()
            .filter(|e| e.direction == Direction::Recv)
            .map(|e| e.id)
            .collect();

        let mut methods: IndexMap<String, usize> = IndexMap::new();
        let mut unanswered = Vec::new();
        let mut orphaned = Vec::new();
        let mut requests = 0;
        let mut responses = 0;

        for entry in entries {
            match entry.direction {
                Direction::Send => {
                    requests += 1;
                    if let Some(method) = &entry.method {
                        *methods.entry(method.clone()).or_insert(0) += 1;
                    }
                    if !received.contains(&entry.id) {
                        unanswered.push(entry.id);
                    }
                }
                Direction::Recv => {
                    responses += 1;
                    if !sent.contains(&entry.id) {
                        orphaned.push(entry.id);
                    }
                }
            }
        }

        Self {
            requests,
            responses,
            unanswered,
            orphaned,
            ignored: log.ignored(),
            methods,
        }
    }

    /// Request count per protocol domain (the part before the first `.`)
    #[must_use]
    pub fn domains(&self) -> IndexMap<String, usize> {
        let mut domains: IndexMap<String, usize> = IndexMap::new();
        for (method, count) in &self.methods {
            let domain = method.split('.').next().unwrap_or(method);
            *domains.entry(domain.to_string()).or_insert(0) += count;
        }
        domains
    }
}
