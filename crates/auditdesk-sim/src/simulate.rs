//! Desk simulator
//!
//! Creates audits, runs them, follows each run by polling until it settles,
//! and checks the progress and finalization invariants on everything it
//! observes.

use auditdesk_core::accounting::{progress_of, settled_status};
use auditdesk_core::prelude::*;
use auditdesk_core::AuditError;
use chrono::{Duration as Days, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

/// Attempts per call before a simulated fault is given up on
pub(crate) const MAX_ATTEMPTS: u32 = 5;

/// Simulator configuration
#[derive(Debug, Clone)]
pub(crate) struct SimulationConfig {
    /// Audits to create and run
    pub(crate) audits: usize,
    /// Template for every created audit
    pub(crate) template_id: TemplateId,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            audits: 5,
            template_id: TemplateId::from("tpl_5"),
        }
    }
}

/// An invariant broken by an observed snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Violation {
    /// IN_PROGRESS audit whose progress disagrees with its checks
    ProgressMismatch {
        audit_id: AuditId,
        reported: u8,
        expected: u8,
    },
    /// Settled status disagrees with the check outcomes
    WrongFinalStatus {
        audit_id: AuditId,
        status: AuditStatus,
        expected: Option<AuditStatus>,
    },
    /// Settled audit not at 100%
    IncompleteProgress { audit_id: AuditId, progress: u8 },
    /// Polling ended on an audit that never settled
    NeverSettled { audit_id: AuditId },
}

/// Per-audit result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuditOutcome {
    pub(crate) audit_id: AuditId,
    pub(crate) run_id: Option<RunId>,
    pub(crate) status: Option<AuditStatus>,
    pub(crate) checks: usize,
    pub(crate) failed_checks: usize,
    pub(crate) polls: u32,
}

/// Simulation statistics
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SimulationStats {
    pub(crate) audits_created: usize,
    pub(crate) runs_started: usize,
    pub(crate) done: usize,
    pub(crate) blocked: usize,
    pub(crate) faults_retried: u32,
    pub(crate) calls_abandoned: usize,
    pub(crate) elapsed_ms: u128,
}

/// Simulation report
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SimulationReport {
    pub(crate) seed: Option<u64>,
    pub(crate) stats: SimulationStats,
    pub(crate) outcomes: Vec<AuditOutcome>,
    pub(crate) violations: Vec<Violation>,
}

impl SimulationReport {
    /// No invariant was violated and every call eventually went through
    #[must_use]
    pub(crate) fn passed(&self) -> bool {
        self.violations.is_empty() && self.stats.calls_abandoned == 0
    }

    /// Human-readable report
    #[must_use]
    pub(crate) fn generate_text(&self) -> String {
        let mut report = String::new();
        report.push_str("=== AuditDesk Simulation Report ===\n\n");
        match self.seed {
            Some(seed) => report.push_str(&format!("Seed: {seed}\n")),
            None => report.push_str("Seed: entropy\n"),
        }
        report.push_str(&format!("Audits Created: {}\n", self.stats.audits_created));
        report.push_str(&format!("Runs Started: {}\n", self.stats.runs_started));
        report.push_str(&format!("Done: {}\n", self.stats.done));
        report.push_str(&format!("Blocked: {}\n", self.stats.blocked));
        report.push_str(&format!("Faults Retried: {}\n", self.stats.faults_retried));
        report.push_str(&format!("Calls Abandoned: {}\n", self.stats.calls_abandoned));
        report.push_str(&format!("Elapsed: {}ms\n", self.stats.elapsed_ms));

        if !self.outcomes.is_empty() {
            report.push_str("\n=== Audits ===\n");
            for outcome in &self.outcomes {
                let status = outcome.status.map_or("UNKNOWN", AuditStatus::as_str);
                report.push_str(&format!(
                    "{}  {:<11} {}/{} KO, {} polls\n",
                    outcome.audit_id, status, outcome.failed_checks, outcome.checks, outcome.polls
                ));
            }
        }

        if !self.violations.is_empty() {
            report.push_str("\n=== Violations ===\n");
            for (i, v) in self.violations.iter().enumerate() {
                report.push_str(&format!("{}. {v:?}\n", i + 1));
            }
        }

        report.push_str(&format!(
            "\n=== Result: {} ===\n",
            if self.passed() { "PASS" } else { "FAIL" }
        ));
        report
    }
}

/// Retry a desk call while it fails with a simulated fault.
///
/// Returns the result and the number of faults absorbed.
pub(crate) async fn with_retries<T, F, Fut>(mut call: F) -> (Result<T, AuditError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AuditError>>,
{
    let mut faults = 0;
    loop {
        match call().await {
            Err(err) if err.is_retryable() && faults + 1 < MAX_ATTEMPTS => {
                faults += 1;
                tracing::info!(attempt = faults, error = %err, "retrying after simulated fault");
            }
            result => return (result, faults),
        }
    }
}

/// Check one observed snapshot
#[must_use]
pub(crate) fn check_snapshot(snapshot: &AuditSnapshot) -> Vec<Violation> {
    let audit = &snapshot.audit;
    let audit_id = audit.id.clone();
    match audit.status {
        AuditStatus::Draft => Vec::new(),
        AuditStatus::InProgress => {
            let expected = progress_of(&snapshot.checks);
            if audit.progress == expected {
                Vec::new()
            } else {
                vec![Violation::ProgressMismatch {
                    audit_id,
                    reported: audit.progress,
                    expected,
                }]
            }
        }
        status => {
            let mut violations = Vec::new();
            let expected = settled_status(&snapshot.checks);
            if expected != Some(status) {
                violations.push(Violation::WrongFinalStatus {
                    audit_id: audit_id.clone(),
                    status,
                    expected,
                });
            }
            if audit.progress != 100 {
                violations.push(Violation::IncompleteProgress {
                    audit_id,
                    progress: audit.progress,
                });
            }
            violations
        }
    }
}

struct Tracked {
    outcome: AuditOutcome,
    violations: Vec<Violation>,
    faults: u32,
    abandoned: usize,
}

async fn follow(desk: &AuditDesk, index: usize, template_id: &TemplateId) -> Option<Tracked> {
    let owners = desk.owners();
    let processes = desk.processes();
    let new = NewAudit {
        name: format!("Simulated audit {}", index + 1),
        process: processes[index % processes.len()].clone(),
        owner: owners[index % owners.len()].clone(),
        target_date: Utc::now().date_naive() + Days::days(30),
        template_id: template_id.clone(),
    };

    let (created, mut faults) = with_retries(|| desk.create_audit(new.clone())).await;
    let audit = match created {
        Ok(audit) => audit,
        Err(err) => {
            tracing::error!(error = %err, "create failed");
            return None;
        }
    };

    let (run, run_faults) = with_retries(|| desk.run_audit(&audit.id)).await;
    faults += run_faults;
    let mut tracked = Tracked {
        outcome: AuditOutcome {
            audit_id: audit.id.clone(),
            run_id: None,
            status: None,
            checks: 0,
            failed_checks: 0,
            polls: 0,
        },
        violations: Vec::new(),
        faults,
        abandoned: 0,
    };
    match run {
        Ok(receipt) => tracked.outcome.run_id = Some(receipt.run_id),
        Err(err) => {
            tracing::error!(audit_id = %audit.id, error = %err, "run failed");
            tracked.abandoned += 1;
            return Some(tracked);
        }
    }

    // poll on interval, checking every snapshot seen along the way
    let interval = desk.config().poll_interval();
    loop {
        let Some(snapshot) = desk.live_snapshot(&audit.id) else {
            tracked.violations.push(Violation::NeverSettled {
                audit_id: audit.id.clone(),
            });
            break;
        };
        tracked.outcome.polls += 1;
        tracked.violations.extend(check_snapshot(&snapshot));
        if snapshot.audit.status != AuditStatus::InProgress {
            tracked.outcome.status = Some(snapshot.audit.status);
            tracked.outcome.checks = snapshot.checks.len();
            tracked.outcome.failed_checks = snapshot.failed_count();
            break;
        }
        tokio::time::sleep(interval).await;
    }
    Some(tracked)
}

/// Run a simulation against `desk`
pub(crate) async fn run_simulation(desk: &AuditDesk, config: &SimulationConfig) -> SimulationReport {
    let started = Instant::now();
    tracing::info!(audits = config.audits, template_id = %config.template_id, "simulation started");

    let runs = (0..config.audits).map(|i| follow(desk, i, &config.template_id));
    let results = join_all(runs).await;

    let mut stats = SimulationStats::default();
    let mut outcomes = Vec::new();
    let mut violations = Vec::new();
    for result in results {
        let Some(tracked) = result else {
            stats.calls_abandoned += 1;
            continue;
        };
        stats.audits_created += 1;
        stats.faults_retried += tracked.faults;
        stats.calls_abandoned += tracked.abandoned;
        if tracked.outcome.run_id.is_some() {
            stats.runs_started += 1;
        }
        match tracked.outcome.status {
            Some(AuditStatus::Done) => stats.done += 1,
            Some(AuditStatus::Blocked) => stats.blocked += 1,
            _ => {}
        }
        outcomes.push(tracked.outcome);
        violations.extend(tracked.violations);
    }
    stats.elapsed_ms = started.elapsed().as_millis();

    tracing::info!(
        done = stats.done,
        blocked = stats.blocked,
        violations = violations.len(),
        "simulation finished"
    );

    SimulationReport {
        seed: desk.config().rng_seed,
        stats,
        outcomes,
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn instant_simulation_passes() {
        let desk = AuditDesk::empty(DeskConfig::instant().with_rng_seed(3)).unwrap();
        let config = SimulationConfig {
            audits: 4,
            ..SimulationConfig::default()
        };

        let report = run_simulation(&desk, &config).await;
        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.audits_created, 4);
        assert_eq!(report.stats.done + report.stats.blocked, 4);
        assert!(report.outcomes.iter().all(|o| o.checks == 12));
    }

    #[tokio::test]
    async fn retries_absorb_faults_up_to_the_limit() {
        let mut calls = 0;
        let (result, faults) = with_retries(|| {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(AuditError::SimulatedFault {
                        operation: "GET /templates".to_string(),
                        status: 500,
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
        assert_eq!(faults, 2);

        let (result, faults): (Result<(), _>, _) = with_retries(|| async {
            Err(AuditError::SimulatedFault {
                operation: "POST /audits".to_string(),
                status: 500,
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(faults, MAX_ATTEMPTS - 1);
    }

    #[test]
    fn detects_inconsistent_snapshots() {
        let desk = AuditDesk::seeded(DeskConfig::instant().with_rng_seed(12)).unwrap();
        let mut snapshot = desk.live_snapshot(&AuditId::from("aud_1001")).unwrap();
        assert!(check_snapshot(&snapshot).is_empty());

        snapshot.audit.status = AuditStatus::Done;
        snapshot.audit.progress = 40;
        if let Some(first) = snapshot.checks.first_mut() {
            first.status = CheckStatus::Pending;
        }
        let violations = check_snapshot(&snapshot);
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn failing_report_says_so() {
        let report = SimulationReport {
            seed: Some(1),
            stats: SimulationStats::default(),
            outcomes: Vec::new(),
            violations: vec![Violation::NeverSettled {
                audit_id: AuditId::from("aud_1"),
            }],
        };
        assert!(!report.passed());
        assert!(report.generate_text().contains("=== Result: FAIL ==="));
    }
}
