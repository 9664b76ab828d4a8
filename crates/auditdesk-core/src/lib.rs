//! AuditDesk Core (auditdesk-core)
//!
//! In-process backend for a compliance audit desk:
//! 1. **Queries and commands**: list/get/create/run/update, each behind a
//!    latency and fault injector
//! 2. **Execution engine**: background cycles advancing every check of an
//!    audit to OK or KO, one at a time
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use auditdesk_core::prelude::*;
//!
//! let desk = AuditDesk::seeded(DeskConfig::new())?;
//! let page = desk.list_audits(&AuditFilters::new().with_query("iso")).await?;
//!
//! let receipt = desk.run_audit(&page.items[0].id).await?;
//! let settled = poll_until_settled(&desk, &receipt.audit_id, desk.config().poll_interval()).await;
//! ```

#![allow(missing_docs)]

pub mod accounting;
pub mod command;
pub mod config;
pub mod desk;
pub mod dice;
pub mod engine;
pub mod error;
pub mod feed;
pub mod injector;
pub mod listing;
pub mod observe;
pub mod query;
pub mod registry;
pub mod seed;
pub mod store;
pub mod types;

// Re-exports
pub use desk::AuditDesk;
pub use error::*;
pub use types::*;

/// Common imports
pub mod prelude {
    pub use crate::config::{DelayRange, DeskConfig, EngineConfig, OperationLatency};
    pub use crate::desk::AuditDesk;
    pub use crate::engine::{CheckEvaluator, FixedEvaluator, RandomEvaluator, Verdict};
    pub use crate::error::{Affordance, AuditError};
    pub use crate::listing::{AuditFilters, SortDirection, SortField, SortSpec};
    pub use crate::observe::poll_until_settled;
    pub use crate::registry::{CycleOutcome, RunHandle};
    pub use crate::types::{
        Audit, AuditId, AuditSnapshot, AuditStatus, Check, CheckId, CheckPatch, CheckStatus,
        NewAudit, Owner, OwnerId, Page, Priority, RunId, RunReceipt, Template, TemplateId,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
