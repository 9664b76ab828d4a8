//! Live feed of audit snapshots
//!
//! Push-based counterpart to polling: observers subscribe per audit id and
//! receive every snapshot the store publishes for it.

use crate::types::{AuditId, AuditSnapshot};
use dashmap::DashMap;
use tokio::sync::watch;

/// Receiver side of a subscription; holds `None` until the audit exists
pub type Subscription = watch::Receiver<Option<AuditSnapshot>>;

/// Per-audit watch channels
#[derive(Debug, Default)]
pub struct LiveFeed {
    channels: DashMap<AuditId, watch::Sender<Option<AuditSnapshot>>>,
}

impl LiveFeed {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to an audit, seeding the channel with `current`.
    ///
    /// A channel nobody listened to may have missed publishes, so it is
    /// refreshed before the new receiver is handed out.
    pub fn subscribe(&self, audit_id: &AuditId, current: Option<AuditSnapshot>) -> Subscription {
        let tx = self
            .channels
            .entry(audit_id.clone())
            .or_insert_with(|| watch::channel(None).0);
        if tx.receiver_count() == 0 {
            tx.send_replace(current);
        }
        tx.subscribe()
    }

    /// Whether anyone is listening for this audit
    #[must_use]
    pub fn is_watched(&self, audit_id: &AuditId) -> bool {
        self.channels
            .get(audit_id)
            .is_some_and(|tx| tx.receiver_count() > 0)
    }

    /// Publish a snapshot to the audit's subscribers, if any
    pub fn publish(&self, snapshot: AuditSnapshot) {
        if let Some(tx) = self.channels.get(&snapshot.audit.id) {
            tx.send_replace(Some(snapshot));
        }
    }

    /// Drop channels nobody listens to any more
    pub fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
        before - self.channels.len()
    }

    /// Number of audits with an open channel
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_audit_yields_none() {
        let feed = LiveFeed::new();
        let rx = feed.subscribe(&AuditId::from("aud_missing"), None);
        assert!(rx.borrow().is_none());
        assert!(feed.is_watched(&AuditId::from("aud_missing")));
    }

    #[test]
    fn prune_drops_closed_channels() {
        let feed = LiveFeed::new();
        let rx = feed.subscribe(&AuditId::from("aud_1"), None);
        let _kept = feed.subscribe(&AuditId::from("aud_2"), None);
        drop(rx);

        assert_eq!(feed.prune(), 1);
        assert_eq!(feed.channel_count(), 1);
        assert!(!feed.is_watched(&AuditId::from("aud_1")));
    }
}
