//! Error types for AuditDesk
//!
//! Provides error handling for:
//! - Simulated transient faults raised by the injector
//! - Missing audits and checks
//! - Check status patches that would move a check backwards
//! - Check status patches on audits that are not in progress
//! - Invalid configuration

use crate::types::{AuditId, AuditStatus, CheckId, CheckStatus};

/// Main desk error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// Injected fault, retry by explicit user action
    #[error("simulated error on {operation}, please try again (status {status})")]
    SimulatedFault {
        /// Route of the failed operation (`GET /audits`, ...)
        operation: String,
        /// HTTP-like status code
        status: u16,
    },

    /// Audit does not exist
    #[error("audit not found: {0}")]
    AuditNotFound(AuditId),

    /// Check does not exist in the audit
    #[error("check {check_id} not found in audit {audit_id}")]
    CheckNotFound {
        /// Owning audit
        audit_id: AuditId,
        /// Missing check
        check_id: CheckId,
    },

    /// Status patch would move a check backwards within its cycle
    #[error("check {check_id} cannot move from {from} to {to}")]
    IllegalTransition {
        /// Target check
        check_id: CheckId,
        /// Current status
        from: CheckStatus,
        /// Requested status
        to: CheckStatus,
    },

    /// Status patch on an audit that is not in progress
    #[error("audit {audit_id} is {status}, check statuses can only change while it is in progress")]
    AuditNotRunning {
        /// Target audit
        audit_id: AuditId,
        /// Current audit status
        status: AuditStatus,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// How a caller should present a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    /// Offer a retry, the same call may succeed
    Retry,
    /// Show a missing-resource state, retrying will not help
    Missing,
    /// Reject the input
    Reject,
}

impl AuditError {
    /// HTTP-like status code
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SimulatedFault { status, .. } => *status,
            Self::AuditNotFound(_) | Self::CheckNotFound { .. } => 404,
            Self::IllegalTransition { .. } | Self::AuditNotRunning { .. } => 409,
            Self::Config(_) => 400,
        }
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SimulatedFault { .. })
    }

    /// Check if error reports a missing resource
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AuditNotFound(_) | Self::CheckNotFound { .. })
    }

    /// User-visible treatment of this error
    #[must_use]
    pub fn affordance(&self) -> Affordance {
        if self.is_retryable() {
            Affordance::Retry
        } else if self.is_not_found() {
            Affordance::Missing
        } else {
            Affordance::Reject
        }
    }
}

/// Desk result alias
pub type Result<T, E = AuditError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_display_names_operation() {
        let err = AuditError::SimulatedFault {
            operation: "GET /audits".to_string(),
            status: 500,
        };
        assert!(err.to_string().contains("GET /audits"));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn not_found_is_not_retryable() {
        let err = AuditError::AuditNotFound(AuditId::from("aud_x"));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.affordance(), Affordance::Missing);
    }

    #[test]
    fn affordances() {
        let fault = AuditError::SimulatedFault {
            operation: "POST /audits".to_string(),
            status: 503,
        };
        assert_eq!(fault.affordance(), Affordance::Retry);
        assert_eq!(fault.status_code(), 503);

        let illegal = AuditError::IllegalTransition {
            check_id: CheckId::from("chk_1"),
            from: CheckStatus::Ok,
            to: CheckStatus::Pending,
        };
        assert_eq!(illegal.affordance(), Affordance::Reject);
        assert_eq!(illegal.status_code(), 409);

        let idle = AuditError::AuditNotRunning {
            audit_id: AuditId::from("aud_1"),
            status: AuditStatus::Draft,
        };
        assert_eq!(idle.affordance(), Affordance::Reject);
        assert_eq!(idle.status_code(), 409);
        assert!(idle.to_string().contains("DRAFT"));
    }
}
