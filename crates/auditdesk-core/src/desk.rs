//! Audit desk facade
//!
//! Owns the store, injector, engine and catalog, and exposes the full
//! query/command surface in one cheaply cloneable handle.

use crate::command::CommandService;
use crate::config::DeskConfig;
use crate::dice::Dice;
use crate::engine::{CheckEvaluator, ExecutionEngine};
use crate::error::Result;
use crate::feed::Subscription;
use crate::injector::FaultInjector;
use crate::listing::AuditFilters;
use crate::query::QueryService;
use crate::registry::{CycleOutcome, RunHandle};
use crate::seed;
use crate::store::EntityStore;
use crate::types::{
    Audit, AuditId, AuditSnapshot, Check, CheckId, CheckPatch, NewAudit, Owner, Page, RunReceipt,
    Template,
};
use std::sync::Arc;

#[derive(Debug)]
struct DeskInner {
    config: DeskConfig,
    store: Arc<EntityStore>,
    engine: ExecutionEngine,
    queries: QueryService,
    commands: CommandService,
}

/// In-process audit backend
#[derive(Debug, Clone)]
pub struct AuditDesk {
    inner: Arc<DeskInner>,
}

/// Assembles an [`AuditDesk`]
pub struct DeskBuilder {
    config: DeskConfig,
    templates: Vec<Template>,
    evaluator: Option<Arc<dyn CheckEvaluator>>,
    seeded: bool,
}

impl DeskBuilder {
    /// Replace the template catalog
    #[must_use]
    pub fn templates(mut self, templates: Vec<Template>) -> Self {
        self.templates = templates;
        self
    }

    /// Decide check outcomes with `evaluator` instead of the KO probability
    #[must_use]
    pub fn evaluator(mut self, evaluator: Arc<dyn CheckEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Load the generated seed dataset (built-in catalog ids)
    #[must_use]
    pub fn seeded(mut self, seeded: bool) -> Self {
        self.seeded = seeded;
        self
    }

    /// Validate the config and build the desk
    ///
    /// # Errors
    /// `AuditError::Config` if the configuration is invalid
    pub fn build(self) -> Result<AuditDesk> {
        let Self {
            config,
            templates,
            evaluator,
            seeded,
        } = self;
        config.validate()?;

        let dice = Arc::new(Dice::new(config.rng_seed));
        let store = Arc::new(EntityStore::new());
        if seeded {
            for (audit, checks) in seed::generate_audits(config.seed_audits, &dice) {
                store.push_back(audit, checks);
            }
            tracing::info!(audits = store.len(), "desk seeded");
        }

        let engine = match evaluator {
            Some(evaluator) => ExecutionEngine::with_evaluator(
                Arc::clone(&store),
                Arc::clone(&dice),
                config.engine,
                evaluator,
            ),
            None => ExecutionEngine::new(Arc::clone(&store), Arc::clone(&dice), config.engine),
        };
        let injector = Arc::new(FaultInjector::new(config.clone(), dice));
        let templates = Arc::new(templates);

        let queries = QueryService::new(
            Arc::clone(&store),
            Arc::clone(&injector),
            Arc::clone(&templates),
            config.default_page_size,
        );
        let commands = CommandService::new(Arc::clone(&store), injector, templates, engine.clone());

        Ok(AuditDesk {
            inner: Arc::new(DeskInner {
                config,
                store,
                engine,
                queries,
                commands,
            }),
        })
    }
}

impl AuditDesk {
    /// Builder starting from the built-in catalog, no audits
    #[must_use]
    pub fn builder(config: DeskConfig) -> DeskBuilder {
        DeskBuilder {
            config,
            templates: seed::templates(),
            evaluator: None,
            seeded: false,
        }
    }

    /// Desk loaded with the generated seed dataset
    ///
    /// # Errors
    /// `AuditError::Config` if the configuration is invalid
    pub fn seeded(config: DeskConfig) -> Result<Self> {
        Self::builder(config).seeded(true).build()
    }

    /// Desk with the catalog but no audits
    ///
    /// # Errors
    /// `AuditError::Config` if the configuration is invalid
    pub fn empty(config: DeskConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Empty desk whose engine decides outcomes with `evaluator`
    ///
    /// # Errors
    /// `AuditError::Config` if the configuration is invalid
    pub fn with_evaluator(config: DeskConfig, evaluator: Arc<dyn CheckEvaluator>) -> Result<Self> {
        Self::builder(config).evaluator(evaluator).build()
    }

    /// See [`QueryService::list_audits`]
    ///
    /// # Errors
    /// `AuditError::SimulatedFault`
    pub async fn list_audits(&self, filters: &AuditFilters) -> Result<Page<Audit>> {
        self.inner.queries.list_audits(filters).await
    }

    /// See [`QueryService::get_audit`]
    ///
    /// # Errors
    /// `AuditError::AuditNotFound` or `AuditError::SimulatedFault`
    pub async fn get_audit(&self, audit_id: &AuditId) -> Result<AuditSnapshot> {
        self.inner.queries.get_audit(audit_id).await
    }

    /// See [`QueryService::list_templates`]
    ///
    /// # Errors
    /// `AuditError::SimulatedFault`
    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        self.inner.queries.list_templates().await
    }

    /// See [`CommandService::create_audit`]
    ///
    /// # Errors
    /// `AuditError::SimulatedFault`
    pub async fn create_audit(&self, new: NewAudit) -> Result<Audit> {
        self.inner.commands.create_audit(new).await
    }

    /// See [`CommandService::run_audit`]
    ///
    /// # Errors
    /// `AuditError::AuditNotFound` or `AuditError::SimulatedFault`
    pub async fn run_audit(&self, audit_id: &AuditId) -> Result<RunReceipt> {
        self.inner.commands.run_audit(audit_id).await
    }

    /// See [`CommandService::update_check`]
    ///
    /// # Errors
    /// Not-found, `AuditError::AuditNotRunning`, `AuditError::IllegalTransition` or
    /// `AuditError::SimulatedFault`
    pub async fn update_check(
        &self,
        audit_id: &AuditId,
        check_id: &CheckId,
        patch: CheckPatch,
    ) -> Result<Check> {
        self.inner.commands.update_check(audit_id, check_id, patch).await
    }

    /// Current state straight from the store, bypassing the injector.
    /// `None` for an unknown id.
    #[must_use]
    pub fn live_snapshot(&self, audit_id: &AuditId) -> Option<AuditSnapshot> {
        self.inner.store.snapshot(audit_id)
    }

    /// Push-based alternative to polling [`live_snapshot`](Self::live_snapshot)
    #[must_use]
    pub fn subscribe(&self, audit_id: &AuditId) -> Subscription {
        self.inner.store.subscribe(audit_id)
    }

    /// Wait for every cycle launched for the audit to end
    pub async fn wait_idle(&self, audit_id: &AuditId) -> Vec<Option<CycleOutcome>> {
        self.inner.engine.registry().wait_idle(audit_id).await
    }

    /// Cycles for the audit that are still advancing
    #[must_use]
    pub fn active_runs(&self, audit_id: &AuditId) -> Vec<RunHandle> {
        self.inner.engine.registry().active_runs(audit_id)
    }

    /// Abort every background cycle; returns how many were aborted
    pub fn shutdown(&self) -> usize {
        let aborted = self.inner.engine.registry().shutdown();
        self.inner.store.feed().prune();
        tracing::info!(aborted, "desk shut down");
        aborted
    }

    /// Number of audits in the store
    #[must_use]
    pub fn audit_count(&self) -> usize {
        self.inner.store.len()
    }

    #[must_use]
    pub fn owners(&self) -> Vec<Owner> {
        seed::owners()
    }

    #[must_use]
    pub fn processes(&self) -> Vec<String> {
        seed::PROCESSES.iter().map(ToString::to_string).collect()
    }

    #[must_use]
    pub fn config(&self) -> &DeskConfig {
        &self.inner.config
    }
}
