//! Poll-on-interval observer
//!
//! Re-reads an audit through [`AuditDesk::live_snapshot`] until it leaves
//! IN_PROGRESS. The audit may already have settled between two polls; the
//! poller just stops at the first read that is not IN_PROGRESS.

use crate::desk::AuditDesk;
use crate::types::{AuditId, AuditSnapshot, AuditStatus};
use std::time::Duration;

/// Poll until the audit is no longer IN_PROGRESS.
///
/// Returns the last snapshot read, or `None` if the audit does not exist.
pub async fn poll_until_settled(
    desk: &AuditDesk,
    audit_id: &AuditId,
    interval: Duration,
) -> Option<AuditSnapshot> {
    let mut polls = 0u32;
    loop {
        let snapshot = desk.live_snapshot(audit_id)?;
        polls += 1;
        if snapshot.audit.status != AuditStatus::InProgress {
            tracing::debug!(audit_id = %audit_id, polls, status = %snapshot.audit.status, "polling stopped");
            return Some(snapshot);
        }
        tokio::time::sleep(interval).await;
    }
}
