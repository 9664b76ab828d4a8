//! Run registry
//!
//! Tracks every background run cycle by audit id. Launching a cycle while
//! another one for the same audit is still advancing is allowed; the
//! registry only makes the overlap visible. Both cycles then race over the
//! same check list and the last writer for a given check wins.

use crate::types::{AuditId, AuditStatus, RunId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// How a run cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    /// Every check terminal, audit finalized with this status
    Finalized(AuditStatus),
    /// Cycle reached the end but the list was not fully terminal
    Unsettled,
    /// Audit or check list vanished mid-cycle
    Abandoned,
}

/// Handle to one background run cycle
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub run_id: RunId,
    pub audit_id: AuditId,
    pub started_at: DateTime<Utc>,
    outcome: watch::Receiver<Option<CycleOutcome>>,
    abort: AbortHandle,
}

impl RunHandle {
    pub(crate) fn new(
        run_id: RunId,
        audit_id: AuditId,
        outcome: watch::Receiver<Option<CycleOutcome>>,
        abort: AbortHandle,
    ) -> Self {
        Self {
            run_id,
            audit_id,
            started_at: Utc::now(),
            outcome,
            abort,
        }
    }

    /// Outcome, once the cycle has ended
    #[must_use]
    pub fn outcome(&self) -> Option<CycleOutcome> {
        *self.outcome.borrow()
    }

    /// Ended normally or was torn down
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.outcome().is_some() || self.abort.is_finished()
    }

    /// Wait for the cycle to end; `None` if it was torn down first
    pub async fn wait(&self) -> Option<CycleOutcome> {
        let mut rx = self.outcome.clone();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => *outcome,
            Err(_) => None,
        };
        outcome
    }
}

/// Background cycles keyed by audit id
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: DashMap<AuditId, Vec<RunHandle>>,
}

impl RunRegistry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new cycle
    pub fn register(&self, handle: RunHandle) {
        self.runs
            .entry(handle.audit_id.clone())
            .or_default()
            .push(handle);
    }

    /// Cycles for an audit that are still advancing
    #[must_use]
    pub fn active_runs(&self, audit_id: &AuditId) -> Vec<RunHandle> {
        let Some(mut runs) = self.runs.get_mut(audit_id) else {
            return Vec::new();
        };
        runs.retain(|run| !run.is_finished());
        runs.clone()
    }

    /// Cycles still advancing across all audits
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.runs
            .iter()
            .map(|entry| entry.value().iter().filter(|run| !run.is_finished()).count())
            .sum()
    }

    /// Wait until no cycle for the audit is advancing, including cycles
    /// launched while waiting. Returns the outcomes observed.
    pub async fn wait_idle(&self, audit_id: &AuditId) -> Vec<Option<CycleOutcome>> {
        let mut outcomes = Vec::new();
        loop {
            let pending: Vec<RunHandle> = match self.runs.get(audit_id) {
                Some(runs) => runs.clone(),
                None => return outcomes,
            };
            if pending.is_empty() {
                return outcomes;
            }
            let waits = pending.iter().map(RunHandle::wait);
            outcomes.extend(futures::future::join_all(waits).await);

            // drop what we just awaited; anything newer goes round again
            if let Some(mut runs) = self.runs.get_mut(audit_id) {
                runs.retain(|run| !pending.iter().any(|p| p.run_id == run.run_id));
            }
        }
    }

    /// Abort every cycle (process teardown)
    pub fn shutdown(&self) -> usize {
        let mut aborted = 0;
        for entry in &self.runs {
            for run in entry.value().iter().filter(|run| !run.is_finished()) {
                run.abort.abort();
                aborted += 1;
            }
        }
        self.runs.clear();
        aborted
    }
}
