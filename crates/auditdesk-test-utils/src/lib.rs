//! Testing utilities for AuditDesk workspace
//!
//! Shared fixtures and invariant assertions.

#![allow(missing_docs)]

use auditdesk_core::accounting::{progress_of, settled_status};
use auditdesk_core::config::DeskConfig;
use auditdesk_core::engine::{CheckEvaluator, FixedEvaluator, Verdict};
use auditdesk_core::seed::templates;
use auditdesk_core::{
    AuditDesk, AuditSnapshot, AuditStatus, CheckPreview, CheckStatus, NewAudit, Owner, Priority,
    Template, TemplateId,
};
use chrono::NaiveDate;
use std::sync::Arc;

/// Zero-latency, fault-free config with a fixed seed
pub fn instant_config() -> DeskConfig {
    DeskConfig::instant().with_rng_seed(42)
}

/// Seeded desk with no latency and no faults
pub fn instant_desk() -> AuditDesk {
    AuditDesk::seeded(instant_config()).unwrap()
}

/// Empty desk with no latency and no faults
pub fn empty_desk() -> AuditDesk {
    AuditDesk::empty(instant_config()).unwrap()
}

/// Empty desk whose checks all end with `verdict`
pub fn scripted_desk(config: DeskConfig, verdict: Verdict) -> AuditDesk {
    let evaluator: Arc<dyn CheckEvaluator> = Arc::new(FixedEvaluator(verdict));
    AuditDesk::with_evaluator(config, evaluator).unwrap()
}

/// Id of a catalog template with exactly `check_count` checks
pub fn template_with_checks(check_count: usize) -> Option<TemplateId> {
    templates()
        .into_iter()
        .find(|t| t.check_count == check_count)
        .map(|t| t.id)
}

/// Catalog template `tpl_small` with `check_count` checks and a 2-entry preview
pub fn small_template(check_count: usize) -> Template {
    Template {
        id: TemplateId::from("tpl_small"),
        name: "Small Review".to_string(),
        process: "Security".to_string(),
        check_count,
        checks_preview: vec![
            CheckPreview::new("Access review", Priority::High),
            CheckPreview::new("Log retention", Priority::Low),
        ],
    }
}

/// Empty desk whose catalog is the built-in one plus [`small_template`]
pub fn small_catalog_desk(config: DeskConfig, check_count: usize) -> AuditDesk {
    let mut catalog = templates();
    catalog.push(small_template(check_count));
    AuditDesk::builder(config).templates(catalog).build().unwrap()
}

/// Create payload for `template_id`
pub fn new_audit(name: &str, template_id: impl Into<TemplateId>) -> NewAudit {
    NewAudit {
        name: name.to_string(),
        process: "Security".to_string(),
        owner: Owner::new("u_1", "Ana López"),
        target_date: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
        template_id: template_id.into(),
    }
}

/// Assert the progress and finalization invariants on one snapshot
pub fn assert_progress_invariant(snapshot: &AuditSnapshot) {
    let audit = &snapshot.audit;
    match audit.status {
        AuditStatus::Draft => {}
        AuditStatus::InProgress => assert_eq!(
            audit.progress,
            progress_of(&snapshot.checks),
            "progress of {} does not match its checks",
            audit.id
        ),
        status => {
            assert_eq!(audit.progress, 100, "settled audit {} below 100%", audit.id);
            assert_eq!(
                settled_status(&snapshot.checks),
                Some(status),
                "audit {} settled as {status} but its checks disagree",
                audit.id
            );
        }
    }
}

/// Assert every check is terminal and the audit finalized consistently
pub fn assert_finalized(snapshot: &AuditSnapshot) {
    assert!(
        snapshot.checks.iter().all(|c| c.status.is_terminal()),
        "audit {} has non-terminal checks",
        snapshot.audit.id
    );
    let expected = if snapshot.checks.iter().any(|c| c.status == CheckStatus::Ko) {
        AuditStatus::Blocked
    } else {
        AuditStatus::Done
    };
    assert_eq!(snapshot.audit.status, expected);
    assert_eq!(snapshot.audit.progress, 100);
}
