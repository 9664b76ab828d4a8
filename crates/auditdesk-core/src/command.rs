//! Command service
//!
//! Mutating operations, each wrapped by the [`FaultInjector`]. Existence is
//! checked after the injected delay and before the fault draw; transition
//! rules are checked after it.
//!
//! Manual check updates feed the same [`reconcile`] rule as the execution
//! engine, so an override participates in progress and finalization.

use crate::accounting::reconcile;
use crate::engine::ExecutionEngine;
use crate::error::{AuditError, Result};
use crate::injector::{FaultInjector, Operation};
use crate::seed::materialize_checks;
use crate::store::EntityStore;
use crate::types::{
    Audit, AuditId, AuditStatus, Check, CheckId, CheckPatch, CheckStatus, NewAudit, RunId,
    RunReceipt, Template,
};
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CommandService {
    store: Arc<EntityStore>,
    injector: Arc<FaultInjector>,
    templates: Arc<Vec<Template>>,
    engine: ExecutionEngine,
}

impl CommandService {
    #[must_use]
    pub fn new(
        store: Arc<EntityStore>,
        injector: Arc<FaultInjector>,
        templates: Arc<Vec<Template>>,
        engine: ExecutionEngine,
    ) -> Self {
        Self {
            store,
            injector,
            templates,
            engine,
        }
    }

    /// Create a DRAFT audit with a PENDING check list materialized from its
    /// template, at the head of the collection.
    ///
    /// # Errors
    /// `AuditError::SimulatedFault`
    pub async fn create_audit(&self, new: NewAudit) -> Result<Audit> {
        self.injector.gate(Operation::CreateAudit).await?;

        let now = Utc::now();
        let id = AuditId::generate();
        let template = self.templates.iter().find(|t| t.id == new.template_id);
        if template.is_none() {
            tracing::debug!(template_id = %new.template_id, "unknown template, using generic checks");
        }
        let checks = materialize_checks(&id, template, now);

        let audit = Audit {
            id,
            name: new.name,
            process: new.process,
            status: AuditStatus::Draft,
            progress: 0,
            owner: new.owner,
            target_date: new.target_date,
            created_at: now,
            updated_at: now,
            template_id: new.template_id,
        };
        tracing::info!(audit_id = %audit.id, checks = checks.len(), "audit created");
        let snapshot = self.store.insert_front(audit, checks);
        Ok(snapshot.audit)
    }

    /// Apply a partial update to one check, then reconcile its audit.
    ///
    /// Returns the check as stored after the update.
    ///
    /// # Errors
    /// - `AuditError::AuditNotFound` / `AuditError::CheckNotFound`
    /// - `AuditError::SimulatedFault`
    /// - `AuditError::AuditNotRunning` when the status changes on an audit not in progress
    /// - `AuditError::IllegalTransition` when the check is no longer pending or the
    ///   status would move backwards
    pub async fn update_check(
        &self,
        audit_id: &AuditId,
        check_id: &CheckId,
        patch: CheckPatch,
    ) -> Result<Check> {
        self.injector.delay(Operation::UpdateCheck).await;
        self.store.ensure_check(audit_id, check_id)?;
        self.injector.maybe_fail(Operation::UpdateCheck)?;

        let (check, reconciled) = self
            .store
            .try_modify(audit_id, |audit, checks| {
                let now = Utc::now();
                let check = checks
                    .iter_mut()
                    .find(|c| &c.id == check_id)
                    .ok_or_else(|| AuditError::CheckNotFound {
                        audit_id: audit_id.clone(),
                        check_id: check_id.clone(),
                    })?;

                // overrides only land on pending checks of an audit in progress;
                // queued and running checks belong to a cycle
                if let Some(next) = patch.status.filter(|next| *next != check.status) {
                    if audit.status != AuditStatus::InProgress {
                        return Err(AuditError::AuditNotRunning {
                            audit_id: audit_id.clone(),
                            status: audit.status,
                        });
                    }
                    if check.status != CheckStatus::Pending || !check.status.can_advance_to(next) {
                        return Err(AuditError::IllegalTransition {
                            check_id: check_id.clone(),
                            from: check.status,
                            to: next,
                        });
                    }
                    check.status = next;
                }
                if let Some(evidence) = patch.evidence {
                    check.evidence = evidence;
                }
                if let Some(reviewed) = patch.reviewed {
                    check.reviewed = reviewed;
                }
                check.updated_at = now;
                let updated = check.clone();

                let reconciled = reconcile(audit, checks, now);
                Ok((updated, reconciled))
            })
            .ok_or_else(|| AuditError::AuditNotFound(audit_id.clone()))??;

        tracing::info!(
            audit_id = %audit_id,
            check_id = %check_id,
            status = %check.status,
            reconciled = ?reconciled,
            "check updated"
        );
        Ok(check)
    }

    /// Reset every check to PENDING, mark the audit IN_PROGRESS and start a
    /// background cycle. Returns immediately.
    ///
    /// Running an audit whose previous cycle is still advancing starts a
    /// second cycle racing over the same checks; the receipt reports the
    /// overlap.
    ///
    /// # Errors
    /// `AuditError::AuditNotFound`, otherwise `AuditError::SimulatedFault`
    pub async fn run_audit(&self, audit_id: &AuditId) -> Result<RunReceipt> {
        self.injector.delay(Operation::RunAudit).await;
        self.store.ensure_audit(audit_id)?;
        self.injector.maybe_fail(Operation::RunAudit)?;

        self.store
            .modify(audit_id, |audit, checks| {
                let now = Utc::now();
                for check in checks.iter_mut() {
                    check.status = CheckStatus::Pending;
                    check.updated_at = now;
                }
                audit.status = AuditStatus::InProgress;
                audit.progress = 0;
                audit.updated_at = now;
            })
            .ok_or_else(|| AuditError::AuditNotFound(audit_id.clone()))?;

        let run_id = RunId::new();
        let overlapping_cycles = self.engine.launch(audit_id, run_id);
        tracing::info!(audit_id = %audit_id, run_id = %run_id, overlapping_cycles, "audit run started");

        Ok(RunReceipt {
            run_id,
            audit_id: audit_id.clone(),
            overlapping_cycles,
        })
    }
}
