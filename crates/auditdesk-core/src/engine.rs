//! Execution engine
//!
//! Advances one audit's checks through PENDING → QUEUED → RUNNING → OK/KO,
//! strictly in check order, one check at a time. Each cycle is a detached
//! tokio task tracked by the [`RunRegistry`].
//!
//! - Reads and writes go straight to the store, never through the injector
//! - A check that is no longer PENDING when the cycle reaches it is skipped
//! - Each later write lands only while the check still holds the status the
//!   cycle last wrote; a reset or a racing cycle takes the check over
//! - Progress is reconciled after every terminal outcome
//!
//! The cycle has no caller to report to, so a vanished audit or check ends
//! it as [`CycleOutcome::Abandoned`] instead of an error.

use crate::accounting::{reconcile, Reconciled};
use crate::config::{DelayRange, EngineConfig};
use crate::dice::Dice;
use crate::registry::{CycleOutcome, RunHandle, RunRegistry};
use crate::store::EntityStore;
use crate::types::{AuditId, Check, CheckId, CheckStatus, RunId};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;

/// Terminal outcome of evaluating one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl From<Verdict> for CheckStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => CheckStatus::Ok,
            Verdict::Fail => CheckStatus::Ko,
        }
    }
}

/// Decides the outcome of a RUNNING check
///
/// Implement this to replace the random outcome draw.
#[async_trait]
pub trait CheckEvaluator: Send + Sync {
    /// Evaluate a single check
    async fn evaluate(&self, audit_id: &AuditId, check: &Check) -> Verdict;
}

/// KO with a fixed probability, independently per check
#[derive(Debug)]
pub struct RandomEvaluator {
    dice: Arc<Dice>,
    ko_probability: f64,
}

impl RandomEvaluator {
    #[must_use]
    pub fn new(dice: Arc<Dice>, ko_probability: f64) -> Self {
        Self {
            dice,
            ko_probability,
        }
    }
}

#[async_trait]
impl CheckEvaluator for RandomEvaluator {
    async fn evaluate(&self, _audit_id: &AuditId, _check: &Check) -> Verdict {
        if self.dice.chance(self.ko_probability) {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }
}

/// Same verdict for every check
#[derive(Debug, Clone, Copy)]
pub struct FixedEvaluator(pub Verdict);

#[async_trait]
impl CheckEvaluator for FixedEvaluator {
    async fn evaluate(&self, _audit_id: &AuditId, _check: &Check) -> Verdict {
        self.0
    }
}

/// Why the cycle did not advance a check
enum Step {
    Skipped(CheckStatus),
    Missing,
}

struct EngineInner {
    store: Arc<EntityStore>,
    dice: Arc<Dice>,
    config: EngineConfig,
    evaluator: Arc<dyn CheckEvaluator>,
    registry: RunRegistry,
}

/// Spawns and tracks background run cycles
#[derive(Clone)]
pub struct ExecutionEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("config", &self.inner.config)
            .field("active_runs", &self.inner.registry.active_count())
            .finish_non_exhaustive()
    }
}

impl ExecutionEngine {
    /// Engine drawing outcomes from `config.ko_probability`
    #[must_use]
    pub fn new(store: Arc<EntityStore>, dice: Arc<Dice>, config: EngineConfig) -> Self {
        let evaluator = Arc::new(RandomEvaluator::new(Arc::clone(&dice), config.ko_probability));
        Self::with_evaluator(store, dice, config, evaluator)
    }

    /// Engine with a custom check evaluator
    #[must_use]
    pub fn with_evaluator(
        store: Arc<EntityStore>,
        dice: Arc<Dice>,
        config: EngineConfig,
        evaluator: Arc<dyn CheckEvaluator>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                dice,
                config,
                evaluator,
                registry: RunRegistry::new(),
            }),
        }
    }

    /// Start a background cycle; returns how many cycles for the same audit
    /// were already advancing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn launch(&self, audit_id: &AuditId, run_id: RunId) -> usize {
        let overlapping = self.inner.registry.active_runs(audit_id).len();
        if overlapping > 0 {
            tracing::warn!(
                audit_id = %audit_id,
                run_id = %run_id,
                overlapping,
                "run launched while another cycle is advancing; cycles will race"
            );
        }

        let (tx, rx) = watch::channel(None);
        let inner = Arc::clone(&self.inner);
        let task_audit = audit_id.clone();
        let task = tokio::spawn(async move {
            let outcome = run_cycle(&inner, &task_audit, run_id).await;
            tx.send_replace(Some(outcome));
        });

        self.inner
            .registry
            .register(RunHandle::new(run_id, audit_id.clone(), rx, task.abort_handle()));
        overlapping
    }

    /// Registry of launched cycles
    #[must_use]
    pub fn registry(&self) -> &RunRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Store the engine advances
    #[must_use]
    pub fn store(&self) -> Arc<EntityStore> {
        Arc::clone(&self.inner.store)
    }
}

async fn pause(dice: &Dice, range: DelayRange) {
    let wait = dice.delay(range);
    if wait.is_zero() {
        // still a suspension point so concurrent cycles interleave
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(wait).await;
    }
}

/// Move a check from `expected` to `next`, the status this cycle last wrote.
///
/// Anything else in the slot means a racing cycle or a reset took the check
/// over, and the write is skipped.
fn advance(
    store: &EntityStore,
    audit_id: &AuditId,
    check_id: &CheckId,
    expected: CheckStatus,
    next: CheckStatus,
) -> Option<Result<Reconciled, Step>> {
    store.try_modify(audit_id, |audit, checks| {
        let now = Utc::now();
        let Some(check) = checks.iter_mut().find(|c| &c.id == check_id) else {
            return Err(Step::Missing);
        };
        if check.status != expected {
            return Err(Step::Skipped(check.status));
        }
        check.status = next;
        check.updated_at = now;
        if next.is_terminal() {
            Ok(reconcile(audit, checks, now))
        } else {
            Ok(Reconciled::Skipped)
        }
    })
}

async fn run_cycle(inner: &EngineInner, audit_id: &AuditId, run_id: RunId) -> CycleOutcome {
    let Some(order) = inner.store.checks(audit_id) else {
        tracing::debug!(audit_id = %audit_id, run_id = %run_id, "audit vanished before cycle start");
        return CycleOutcome::Abandoned;
    };
    let order: Vec<CheckId> = order.into_iter().map(|c| c.id).collect();
    tracing::info!(audit_id = %audit_id, run_id = %run_id, checks = order.len(), "run cycle started");

    for check_id in &order {
        pause(&inner.dice, inner.config.queue_delay).await;

        match advance(&inner.store, audit_id, check_id, CheckStatus::Pending, CheckStatus::Queued) {
            Some(Ok(_)) => {
                tracing::debug!(audit_id = %audit_id, check_id = %check_id, run_id = %run_id, "check queued");
            }
            Some(Err(Step::Skipped(status))) => {
                skipped(audit_id, check_id, run_id, status);
                continue;
            }
            Some(Err(Step::Missing)) | None => return abandon(audit_id, run_id),
        }

        pause(&inner.dice, inner.config.start_delay).await;
        match advance(&inner.store, audit_id, check_id, CheckStatus::Queued, CheckStatus::Running) {
            Some(Ok(_)) => {
                tracing::debug!(audit_id = %audit_id, check_id = %check_id, run_id = %run_id, "check running");
            }
            Some(Err(Step::Skipped(status))) => {
                skipped(audit_id, check_id, run_id, status);
                continue;
            }
            Some(Err(Step::Missing)) | None => return abandon(audit_id, run_id),
        }

        pause(&inner.dice, inner.config.finish_delay).await;
        let Some(check) = inner
            .store
            .snapshot(audit_id)
            .and_then(|snap| snap.check(check_id).cloned())
        else {
            return abandon(audit_id, run_id);
        };
        let status = CheckStatus::from(inner.evaluator.evaluate(audit_id, &check).await);
        match advance(&inner.store, audit_id, check_id, CheckStatus::Running, status) {
            Some(Ok(reconciled)) => {
                tracing::debug!(
                    audit_id = %audit_id,
                    check_id = %check_id,
                    run_id = %run_id,
                    status = %status,
                    reconciled = ?reconciled,
                    "check settled"
                );
            }
            Some(Err(Step::Skipped(current))) => skipped(audit_id, check_id, run_id, current),
            Some(Err(Step::Missing)) | None => return abandon(audit_id, run_id),
        }
    }

    let outcome = inner
        .store
        .modify(audit_id, |audit, checks| reconcile(audit, checks, Utc::now()))
        .map_or(CycleOutcome::Abandoned, |reconciled| match reconciled {
            Reconciled::Finalized(status) => CycleOutcome::Finalized(status),
            Reconciled::Progressed(_) | Reconciled::Skipped => CycleOutcome::Unsettled,
        });
    tracing::info!(audit_id = %audit_id, run_id = %run_id, outcome = ?outcome, "run cycle finished");
    outcome
}

fn skipped(audit_id: &AuditId, check_id: &CheckId, run_id: RunId, status: CheckStatus) {
    tracing::debug!(
        audit_id = %audit_id,
        check_id = %check_id,
        run_id = %run_id,
        status = %status,
        "check taken over elsewhere, skipped"
    );
}

fn abandon(audit_id: &AuditId, run_id: RunId) -> CycleOutcome {
    tracing::debug!(audit_id = %audit_id, run_id = %run_id, "audit or check vanished, cycle abandoned");
    CycleOutcome::Abandoned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Audit, AuditStatus, Owner, Priority, TemplateId};
    use chrono::NaiveDate;
    use std::time::Duration;

    fn seed_store(n: usize) -> (Arc<EntityStore>, AuditId) {
        let store = Arc::new(EntityStore::new());
        let id = AuditId::from("aud_1");
        let now = Utc::now();
        let audit = Audit {
            id: id.clone(),
            name: "Engine audit".to_string(),
            process: "IT".to_string(),
            status: AuditStatus::InProgress,
            progress: 0,
            owner: Owner::new("u_1", "Ana"),
            target_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            created_at: now,
            updated_at: now,
            template_id: TemplateId::from("tpl_1"),
        };
        let checks = (1..=n)
            .map(|i| Check::pending(CheckId::for_audit(&id, i), format!("Control {i}"), Priority::Low, now))
            .collect();
        store.push_back(audit, checks);
        (store, id)
    }

    fn engine(store: &Arc<EntityStore>, verdict: Verdict) -> ExecutionEngine {
        ExecutionEngine::with_evaluator(
            Arc::clone(store),
            Arc::new(Dice::seeded(3)),
            EngineConfig::default(),
            Arc::new(FixedEvaluator(verdict)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn all_pass_finalizes_done() {
        let (store, id) = seed_store(3);
        let engine = engine(&store, Verdict::Pass);
        assert_eq!(engine.launch(&id, RunId::new()), 0);

        let outcomes = engine.registry().wait_idle(&id).await;
        assert_eq!(outcomes, vec![Some(CycleOutcome::Finalized(AuditStatus::Done))]);

        let snap = store.snapshot(&id).unwrap();
        assert_eq!(snap.audit.status, AuditStatus::Done);
        assert_eq!(snap.audit.progress, 100);
        assert!(snap.checks.iter().all(|c| c.status == CheckStatus::Ok));
    }

    #[tokio::test(start_paused = true)]
    async fn any_fail_finalizes_blocked() {
        let (store, id) = seed_store(2);
        let engine = engine(&store, Verdict::Fail);
        engine.launch(&id, RunId::new());
        engine.registry().wait_idle(&id).await;

        let snap = store.snapshot(&id).unwrap();
        assert_eq!(snap.audit.status, AuditStatus::Blocked);
        assert_eq!(snap.failed_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_pending_checks_are_left_alone() {
        let (store, id) = seed_store(3);
        let manual = CheckId::for_audit(&id, 2);
        store.modify(&id, |_, checks| checks[1].status = CheckStatus::Ko);

        let engine = engine(&store, Verdict::Pass);
        engine.launch(&id, RunId::new());
        engine.registry().wait_idle(&id).await;

        let snap = store.snapshot(&id).unwrap();
        assert_eq!(snap.check(&manual).unwrap().status, CheckStatus::Ko);
        assert_eq!(snap.audit.status, AuditStatus::Blocked);
    }

    #[tokio::test(start_paused = true)]
    async fn check_taken_over_after_queueing_is_not_overwritten() {
        let (store, id) = seed_store(1);
        let check = CheckId::for_audit(&id, 1);
        let engine = ExecutionEngine::with_evaluator(
            Arc::clone(&store),
            Arc::new(Dice::seeded(3)),
            EngineConfig {
                ko_probability: 0.0,
                queue_delay: DelayRange::fixed(100),
                start_delay: DelayRange::fixed(1000),
                finish_delay: DelayRange::fixed(1000),
            },
            Arc::new(FixedEvaluator(Verdict::Fail)),
        );
        engine.launch(&id, RunId::new());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.snapshot(&id).unwrap().check(&check).unwrap().status, CheckStatus::Queued);
        store.modify(&id, |_, checks| checks[0].status = CheckStatus::Ok);

        // past the start delay: not dragged back to RUNNING
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(store.snapshot(&id).unwrap().check(&check).unwrap().status, CheckStatus::Ok);

        let outcomes = engine.registry().wait_idle(&id).await;
        assert_eq!(outcomes, vec![Some(CycleOutcome::Finalized(AuditStatus::Done))]);

        let snap = store.snapshot(&id).unwrap();
        assert_eq!(snap.check(&check).unwrap().status, CheckStatus::Ok);
        assert_eq!(snap.audit.status, AuditStatus::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_audit_is_abandoned() {
        let store = Arc::new(EntityStore::new());
        let engine = engine(&store, Verdict::Pass);
        let id = AuditId::from("aud_missing");
        engine.launch(&id, RunId::new());

        let outcomes = engine.registry().wait_idle(&id).await;
        assert_eq!(outcomes, vec![Some(CycleOutcome::Abandoned)]);
    }

    #[tokio::test(start_paused = true)]
    async fn checks_advance_in_order() {
        let (store, id) = seed_store(3);
        let engine = engine(&store, Verdict::Pass);
        let mut rx = store.subscribe(&id);
        engine.launch(&id, RunId::new());

        let mut settled_order = Vec::new();
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone().unwrap();
            for check in snap.checks.iter().filter(|c| c.status.is_terminal()) {
                if !settled_order.contains(&check.id) {
                    settled_order.push(check.id.clone());
                }
            }
            // at most one check in flight at a time
            let in_flight = snap
                .checks
                .iter()
                .filter(|c| matches!(c.status, CheckStatus::Queued | CheckStatus::Running))
                .count();
            assert!(in_flight <= 1);
            if snap.audit.status.is_terminal() {
                break;
            }
        }
        let expected: Vec<CheckId> = (1..=3).map(|i| CheckId::for_audit(&id, i)).collect();
        assert_eq!(settled_order, expected);
    }
}
