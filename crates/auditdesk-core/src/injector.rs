//! Latency and fault injection
//!
//! Sits in front of every query/command entry point. A call first waits a
//! randomized delay, then draws against the fault rate. Existence checks run
//! between the two, so a missing id fails with not-found regardless of the
//! fault draw.

use crate::config::{DelayRange, DeskConfig};
use crate::dice::Dice;
use crate::error::AuditError;
use std::sync::Arc;
use std::time::Duration;

/// Injector-wrapped operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListAudits,
    GetAudit,
    ListTemplates,
    CreateAudit,
    RunAudit,
    UpdateCheck,
}

impl Operation {
    /// Route label carried in fault messages
    #[must_use]
    pub fn route(self) -> &'static str {
        match self {
            Self::ListAudits => "GET /audits",
            Self::GetAudit => "GET /audits/:id",
            Self::ListTemplates => "GET /templates",
            Self::CreateAudit => "POST /audits",
            Self::RunAudit => "POST /audits/:id/run",
            Self::UpdateCheck => "PATCH /audits/:id/checks/:checkId",
        }
    }
}

/// Randomized delay plus randomized failure
#[derive(Debug)]
pub struct FaultInjector {
    config: DeskConfig,
    dice: Arc<Dice>,
}

impl FaultInjector {
    #[must_use]
    pub fn new(config: DeskConfig, dice: Arc<Dice>) -> Self {
        Self { config, dice }
    }

    /// Delay range applied to an operation
    #[must_use]
    pub fn latency_for(&self, op: Operation) -> DelayRange {
        let ops = &self.config.operation_latency;
        let over = match op {
            Operation::ListAudits => ops.list_audits,
            Operation::GetAudit => ops.get_audit,
            Operation::ListTemplates => ops.list_templates,
            Operation::CreateAudit => ops.create_audit,
            Operation::RunAudit => ops.run_audit,
            Operation::UpdateCheck => ops.update_check,
        };
        over.unwrap_or(self.config.latency)
    }

    /// Sleep for the operation's simulated network latency
    pub async fn delay(&self, op: Operation) -> Duration {
        let wait = self.dice.delay(self.latency_for(op));
        tracing::debug!(operation = op.route(), wait_ms = wait.as_millis() as u64, "injected latency");
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        wait
    }

    /// Draw against the fault rate
    ///
    /// # Errors
    /// `AuditError::SimulatedFault` with probability `fault_rate`
    pub fn maybe_fail(&self, op: Operation) -> Result<(), AuditError> {
        if self.dice.chance(self.config.fault_rate) {
            tracing::warn!(operation = op.route(), "injected fault");
            return Err(AuditError::SimulatedFault {
                operation: op.route().to_string(),
                status: self.config.fault_status,
            });
        }
        Ok(())
    }

    /// Delay then draw, for operations with no existence precondition
    ///
    /// # Errors
    /// `AuditError::SimulatedFault`
    pub async fn gate(&self, op: Operation) -> Result<(), AuditError> {
        self.delay(op).await;
        self.maybe_fail(op)
    }
}
