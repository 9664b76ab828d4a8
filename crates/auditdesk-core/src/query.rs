//! Query service
//!
//! Read-only operations. Every call goes through the [`FaultInjector`] and
//! returns copies, never references into the store.

use crate::error::{AuditError, Result};
use crate::injector::{FaultInjector, Operation};
use crate::listing::{select, AuditFilters};
use crate::store::EntityStore;
use crate::types::{Audit, AuditId, AuditSnapshot, Page, Template};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct QueryService {
    store: Arc<EntityStore>,
    injector: Arc<FaultInjector>,
    templates: Arc<Vec<Template>>,
    default_page_size: usize,
}

impl QueryService {
    #[must_use]
    pub fn new(
        store: Arc<EntityStore>,
        injector: Arc<FaultInjector>,
        templates: Arc<Vec<Template>>,
        default_page_size: usize,
    ) -> Self {
        Self {
            store,
            injector,
            templates,
            default_page_size,
        }
    }

    /// Filter, sort, then page the audit collection
    ///
    /// # Errors
    /// `AuditError::SimulatedFault`
    pub async fn list_audits(&self, filters: &AuditFilters) -> Result<Page<Audit>> {
        self.injector.gate(Operation::ListAudits).await?;
        let page = select(self.store.audits(), filters, self.default_page_size);
        tracing::debug!(total = page.total, page = page.page, returned = page.items.len(), "listed audits");
        Ok(page)
    }

    /// One audit with its ordered checks
    ///
    /// # Errors
    /// `AuditError::AuditNotFound` for an unknown id (regardless of the
    /// fault draw), otherwise `AuditError::SimulatedFault`
    pub async fn get_audit(&self, audit_id: &AuditId) -> Result<AuditSnapshot> {
        self.injector.delay(Operation::GetAudit).await;
        self.store.ensure_audit(audit_id)?;
        self.injector.maybe_fail(Operation::GetAudit)?;
        self.store
            .snapshot(audit_id)
            .ok_or_else(|| AuditError::AuditNotFound(audit_id.clone()))
    }

    /// Template catalog
    ///
    /// # Errors
    /// `AuditError::SimulatedFault`
    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        self.injector.gate(Operation::ListTemplates).await?;
        Ok(Vec::clone(&self.templates))
    }
}
