//! Progress and finalization accounting
//!
//! Shared by manual check updates and the execution engine so both feed the
//! same rule: progress is the rounded share of terminal checks, and an audit
//! finalizes only once every check is terminal.

use crate::types::{Audit, AuditStatus, Check, CheckStatus};
use chrono::{DateTime, Utc};

/// `round(100 * terminal / total)`, rounding halves up; 0 for an empty list
#[must_use]
pub fn progress_of(checks: &[Check]) -> u8 {
    let total = checks.len();
    let terminal = checks.iter().filter(|c| c.status.is_terminal()).count();
    progress_ratio(terminal, total)
}

/// Rounded percentage of `done` over `total`
#[must_use]
pub fn progress_ratio(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    // (200d + t) / 2t == floor(100d/t + 1/2)
    let pct = (200 * done + total) / (2 * total);
    u8::try_from(pct).unwrap_or(100)
}

/// Terminal audit status for a fully terminal check list, `None` otherwise
#[must_use]
pub fn settled_status(checks: &[Check]) -> Option<AuditStatus> {
    if !checks.iter().all(|c| c.status.is_terminal()) {
        return None;
    }
    if checks.iter().any(|c| c.status == CheckStatus::Ko) {
        Some(AuditStatus::Blocked)
    } else {
        Some(AuditStatus::Done)
    }
}

/// What [`reconcile`] did to the audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// DRAFT audits are not accounted
    Skipped,
    /// Progress recomputed, checks still outstanding
    Progressed(u8),
    /// Every check terminal, audit finalized
    Finalized(AuditStatus),
}

/// Recompute progress and finalize when every check is terminal.
///
/// Idempotent. Never finalizes a partially terminal list, and leaves DRAFT
/// audits at progress 0.
pub fn reconcile(audit: &mut Audit, checks: &[Check], now: DateTime<Utc>) -> Reconciled {
    if !audit.status.is_accounted() {
        return Reconciled::Skipped;
    }

    let outcome = match settled_status(checks) {
        Some(status) => {
            audit.status = status;
            audit.progress = 100;
            Reconciled::Finalized(status)
        }
        None => {
            let progress = progress_of(checks);
            audit.progress = progress;
            Reconciled::Progressed(progress)
        }
    };
    audit.updated_at = now;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuditId, CheckId, Owner, Priority, TemplateId};
    use chrono::NaiveDate;

    fn audit(status: AuditStatus) -> Audit {
        let now = Utc::now();
        Audit {
            id: AuditId::from("aud_1"),
            name: "Quarterly close".to_string(),
            process: "Finance".to_string(),
            status,
            progress: 0,
            owner: Owner::new("u_1", "Ana"),
            target_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            created_at: now,
            updated_at: now,
            template_id: TemplateId::from("tpl_7"),
        }
    }

    fn checks(statuses: &[CheckStatus]) -> Vec<Check> {
        let audit_id = AuditId::from("aud_1");
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut c = Check::pending(
                    CheckId::for_audit(&audit_id, i + 1),
                    format!("Control {}", i + 1),
                    Priority::Medium,
                    Utc::now(),
                );
                c.status = *s;
                c
            })
            .collect()
    }

    #[test]
    fn ratio_rounds_half_up() {
        assert_eq!(progress_ratio(0, 3), 0);
        assert_eq!(progress_ratio(1, 3), 33);
        assert_eq!(progress_ratio(2, 3), 67);
        assert_eq!(progress_ratio(1, 8), 13);
        assert_eq!(progress_ratio(3, 3), 100);
        assert_eq!(progress_ratio(0, 0), 0);
    }

    #[test]
    fn partial_list_only_progresses() {
        use CheckStatus::*;
        let mut a = audit(AuditStatus::InProgress);
        let list = checks(&[Ko, Pending, Pending]);

        assert_eq!(reconcile(&mut a, &list, Utc::now()), Reconciled::Progressed(33));
        assert_eq!(a.status, AuditStatus::InProgress);
        assert_eq!(a.progress, 33);
    }

    #[test]
    fn full_list_finalizes() {
        use CheckStatus::*;
        let mut a = audit(AuditStatus::InProgress);
        assert_eq!(
            reconcile(&mut a, &checks(&[Ok, Ok, Ok]), Utc::now()),
            Reconciled::Finalized(AuditStatus::Done)
        );
        assert_eq!(a.progress, 100);

        let mut b = audit(AuditStatus::InProgress);
        assert_eq!(
            reconcile(&mut b, &checks(&[Ok, Ko, Ok]), Utc::now()),
            Reconciled::Finalized(AuditStatus::Blocked)
        );
    }

    #[test]
    fn reconcile_is_idempotent() {
        use CheckStatus::*;
        let list = checks(&[Ok, Ko]);
        let mut a = audit(AuditStatus::InProgress);
        let first = reconcile(&mut a, &list, Utc::now());
        let second = reconcile(&mut a, &list, Utc::now());
        assert_eq!(first, second);
        assert_eq!(a.status, AuditStatus::Blocked);
    }

    #[test]
    fn draft_is_skipped() {
        let mut a = audit(AuditStatus::Draft);
        let list = checks(&[CheckStatus::Ok]);
        assert_eq!(reconcile(&mut a, &list, Utc::now()), Reconciled::Skipped);
        assert_eq!(a.progress, 0);
        assert_eq!(a.status, AuditStatus::Draft);
    }

    #[test]
    fn empty_list_settles_done() {
        assert_eq!(settled_status(&[]), Some(AuditStatus::Done));
    }
}
