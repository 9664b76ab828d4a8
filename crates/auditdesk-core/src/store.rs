//! Entity store
//!
//! The single source of truth for audits and their checks. Records are held
//! behind `Arc` and replaced copy-on-write, so a snapshot handed out earlier
//! never changes underneath its holder. An audit and its checks are always
//! mutated together inside one write section, so a reader sees an audit
//! either fully before or fully after a transition.
//!
//! The lock is a `parking_lot::RwLock` and is never held across an `.await`.

use crate::error::AuditError;
use crate::feed::{LiveFeed, Subscription};
use crate::types::{Audit, AuditId, AuditSnapshot, Check, CheckId};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Record {
    audit: Arc<Audit>,
    checks: Arc<Vec<Check>>,
    revision: u64,
}

impl Record {
    fn snapshot(&self) -> AuditSnapshot {
        AuditSnapshot {
            audit: Audit::clone(&self.audit),
            checks: Vec::clone(&self.checks),
            revision: self.revision,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    /// Most recent first
    order: VecDeque<AuditId>,
    records: HashMap<AuditId, Record>,
}

/// In-memory audit/check store
#[derive(Debug, Default)]
pub struct EntityStore {
    tables: RwLock<Tables>,
    feed: LiveFeed,
}

impl EntityStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an audit at the head of the collection (most recent first)
    pub fn insert_front(&self, audit: Audit, checks: Vec<Check>) -> AuditSnapshot {
        self.insert(audit, checks, true)
    }

    /// Append an audit at the tail (seed loading keeps dataset order)
    pub fn push_back(&self, audit: Audit, checks: Vec<Check>) -> AuditSnapshot {
        self.insert(audit, checks, false)
    }

    fn insert(&self, audit: Audit, checks: Vec<Check>, front: bool) -> AuditSnapshot {
        let id = audit.id.clone();
        let mut tables = self.tables.write();

        let previous = tables.records.get(&id).map(|r| r.revision);
        let revision = match previous {
            Some(prev) => {
                tables.order.retain(|existing| existing != &id);
                prev + 1
            }
            None => 0,
        };
        if front {
            tables.order.push_front(id.clone());
        } else {
            tables.order.push_back(id.clone());
        }

        let record = Record {
            audit: Arc::new(audit),
            checks: Arc::new(checks),
            revision,
        };
        let snapshot = record.snapshot();
        tables.records.insert(id, record);
        self.feed.publish(snapshot.clone());
        snapshot
    }

    /// Number of audits
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, audit_id: &AuditId) -> bool {
        self.tables.read().records.contains_key(audit_id)
    }

    /// Fail with not-found unless the audit exists
    ///
    /// # Errors
    /// `AuditError::AuditNotFound`
    pub fn ensure_audit(&self, audit_id: &AuditId) -> Result<(), AuditError> {
        if self.contains(audit_id) {
            Ok(())
        } else {
            Err(AuditError::AuditNotFound(audit_id.clone()))
        }
    }

    /// Fail with not-found unless the audit and the check both exist
    ///
    /// # Errors
    /// `AuditError::AuditNotFound` or `AuditError::CheckNotFound`
    pub fn ensure_check(&self, audit_id: &AuditId, check_id: &CheckId) -> Result<(), AuditError> {
        let tables = self.tables.read();
        let record = tables
            .records
            .get(audit_id)
            .ok_or_else(|| AuditError::AuditNotFound(audit_id.clone()))?;
        if record.checks.iter().any(|c| &c.id == check_id) {
            Ok(())
        } else {
            Err(AuditError::CheckNotFound {
                audit_id: audit_id.clone(),
                check_id: check_id.clone(),
            })
        }
    }

    /// Copies of every audit, most recent first
    #[must_use]
    pub fn audits(&self) -> Vec<Audit> {
        let tables = self.tables.read();
        tables
            .order
            .iter()
            .filter_map(|id| tables.records.get(id))
            .map(|record| Audit::clone(&record.audit))
            .collect()
    }

    /// Copy of one audit and its checks
    #[must_use]
    pub fn snapshot(&self, audit_id: &AuditId) -> Option<AuditSnapshot> {
        self.tables.read().records.get(audit_id).map(Record::snapshot)
    }

    /// Copy of an audit's checks, in order
    #[must_use]
    pub fn checks(&self, audit_id: &AuditId) -> Option<Vec<Check>> {
        self.tables
            .read()
            .records
            .get(audit_id)
            .map(|record| Vec::clone(&record.checks))
    }

    /// Current revision of an audit
    #[must_use]
    pub fn revision(&self, audit_id: &AuditId) -> Option<u64> {
        self.tables.read().records.get(audit_id).map(|r| r.revision)
    }

    /// Mutate an audit and its checks as one atomic step.
    ///
    /// The closure edits private copies; they replace the stored record
    /// when it returns. Returns `None` if the audit does not exist.
    pub fn modify<R>(
        &self,
        audit_id: &AuditId,
        f: impl FnOnce(&mut Audit, &mut Vec<Check>) -> R,
    ) -> Option<R> {
        let mut tables = self.tables.write();
        let record = tables.records.get_mut(audit_id)?;

        let result = f(
            Arc::make_mut(&mut record.audit),
            Arc::make_mut(&mut record.checks),
        );
        record.revision += 1;

        if self.feed.is_watched(audit_id) {
            self.feed.publish(record.snapshot());
        }
        Some(result)
    }

    /// Like [`modify`](Self::modify), but the edit is committed only when
    /// the closure returns `Ok`. A rejected edit leaves the record and its
    /// revision untouched.
    pub fn try_modify<R, E>(
        &self,
        audit_id: &AuditId,
        f: impl FnOnce(&mut Audit, &mut Vec<Check>) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        let mut tables = self.tables.write();
        let record = tables.records.get_mut(audit_id)?;

        let mut audit = Arc::clone(&record.audit);
        let mut checks = Arc::clone(&record.checks);
        let result = f(Arc::make_mut(&mut audit), Arc::make_mut(&mut checks));
        if result.is_ok() {
            record.audit = audit;
            record.checks = checks;
            record.revision += 1;
            if self.feed.is_watched(audit_id) {
                self.feed.publish(record.snapshot());
            }
        }
        Some(result)
    }

    /// Subscribe to every snapshot published for an audit
    pub fn subscribe(&self, audit_id: &AuditId) -> Subscription {
        let tables = self.tables.read();
        let current = tables.records.get(audit_id).map(Record::snapshot);
        self.feed.subscribe(audit_id, current)
    }

    /// Live feed backing subscriptions
    #[must_use]
    pub fn feed(&self) -> &LiveFeed {
        &self.feed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuditStatus, CheckStatus, Owner, Priority, TemplateId};
    use chrono::{NaiveDate, Utc};

    fn audit(id: &str) -> Audit {
        let now = Utc::now();
        Audit {
            id: AuditId::from(id),
            name: format!("Audit {id}"),
            process: "IT".to_string(),
            status: AuditStatus::Draft,
            progress: 0,
            owner: Owner::new("u_1", "Ana"),
            target_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            created_at: now,
            updated_at: now,
            template_id: TemplateId::from("tpl_8"),
        }
    }

    fn checks(id: &str, n: usize) -> Vec<Check> {
        let audit_id = AuditId::from(id);
        (1..=n)
            .map(|i| {
                Check::pending(
                    CheckId::for_audit(&audit_id, i),
                    format!("Control {i}"),
                    Priority::High,
                    Utc::now(),
                )
            })
            .collect()
    }

    #[test]
    fn insert_front_orders_newest_first() {
        let store = EntityStore::new();
        store.push_back(audit("aud_1"), checks("aud_1", 1));
        store.push_back(audit("aud_2"), checks("aud_2", 1));
        store.insert_front(audit("aud_3"), checks("aud_3", 1));

        let ids: Vec<String> = store.audits().into_iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec!["aud_3", "aud_1", "aud_2"]);
    }

    #[test]
    fn snapshots_are_not_affected_by_later_mutation() {
        let store = EntityStore::new();
        store.push_back(audit("aud_1"), checks("aud_1", 2));
        let before = store.snapshot(&AuditId::from("aud_1")).unwrap();

        store
            .modify(&AuditId::from("aud_1"), |a, cs| {
                a.status = AuditStatus::InProgress;
                cs[0].status = CheckStatus::Queued;
            })
            .unwrap();

        let after = store.snapshot(&AuditId::from("aud_1")).unwrap();
        assert_eq!(before.audit.status, AuditStatus::Draft);
        assert_eq!(before.checks[0].status, CheckStatus::Pending);
        assert_eq!(after.checks[0].status, CheckStatus::Queued);
        assert_eq!(after.revision, before.revision + 1);
    }

    #[test]
    fn modify_missing_audit_is_none() {
        let store = EntityStore::new();
        assert!(store.modify(&AuditId::from("nope"), |_, _| ()).is_none());
    }

    #[test]
    fn rejected_edit_is_not_committed() {
        let store = EntityStore::new();
        store.push_back(audit("aud_1"), checks("aud_1", 1));
        let id = AuditId::from("aud_1");

        let rejected: Option<Result<(), &str>> = store.try_modify(&id, |a, cs| {
            a.progress = 99;
            cs[0].status = CheckStatus::Ok;
            Err("nope")
        });
        assert_eq!(rejected, Some(Err("nope")));

        let snap = store.snapshot(&id).unwrap();
        assert_eq!(snap.revision, 0);
        assert_eq!(snap.audit.progress, 0);
        assert_eq!(snap.checks[0].status, CheckStatus::Pending);

        let accepted: Option<Result<u8, ()>> = store.try_modify(&id, |a, _| {
            a.progress = 10;
            Ok(a.progress)
        });
        assert_eq!(accepted, Some(Ok(10)));
        assert_eq!(store.revision(&id), Some(1));
    }

    #[test]
    fn ensure_check_distinguishes_misses() {
        let store = EntityStore::new();
        store.push_back(audit("aud_1"), checks("aud_1", 1));

        assert!(store
            .ensure_check(&AuditId::from("aud_1"), &CheckId::from("chk_aud_1_1"))
            .is_ok());
        assert!(matches!(
            store.ensure_check(&AuditId::from("aud_1"), &CheckId::from("chk_aud_1_9")),
            Err(AuditError::CheckNotFound { .. })
        ));
        assert!(matches!(
            store.ensure_check(&AuditId::from("aud_9"), &CheckId::from("chk_aud_1_1")),
            Err(AuditError::AuditNotFound(_))
        ));
    }

    #[test]
    fn subscribers_see_mutations() {
        let store = EntityStore::new();
        store.push_back(audit("aud_1"), checks("aud_1", 1));
        let id = AuditId::from("aud_1");
        let mut rx = store.subscribe(&id);
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().revision, 0);

        store.modify(&id, |a, _| a.progress = 50);

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone().unwrap();
        assert_eq!(seen.audit.progress, 50);
        assert_eq!(seen.revision, 1);
    }
}
