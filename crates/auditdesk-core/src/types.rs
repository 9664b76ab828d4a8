//! Core types for AuditDesk
//!
//! Defines the entities the desk hands out and accepts:
//! - Identifiers (audits, checks, templates, owners, runs)
//! - Audit and check lifecycles
//! - Catalog entries (owners, templates)
//! - Request and response shapes for the query/command surface

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw identifier
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Audit identifier (`aud_...`)
    AuditId
);
string_id!(
    /// Check identifier, scoped to its owning audit (`chk_<audit>_<n>`)
    CheckId
);
string_id!(
    /// Template identifier (`tpl_...`)
    TemplateId
);
string_id!(
    /// Owner identifier (`u_...`)
    OwnerId
);

impl AuditId {
    /// Generate a fresh audit id
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("aud_{}", Ulid::new().to_string().to_lowercase()))
    }
}

impl CheckId {
    /// Id of the `ordinal`-th (1-based) check of an audit
    #[must_use]
    pub fn for_audit(audit_id: &AuditId, ordinal: usize) -> Self {
        Self(format!("chk_{audit_id}_{ordinal}"))
    }
}

/// Run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run_{}", self.0.to_string().to_lowercase())
    }
}

/// Audit lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    /// Created, never run
    Draft,
    /// A run cycle has been started
    InProgress,
    /// Every check finished and none failed
    Done,
    /// Every check finished and at least one failed
    Blocked,
}

impl AuditStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [AuditStatus; 4] = [
        AuditStatus::Draft,
        AuditStatus::InProgress,
        AuditStatus::Done,
        AuditStatus::Blocked,
    ];

    /// DONE or BLOCKED
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Blocked)
    }

    /// Whether progress must be derivable from the checks
    #[inline]
    #[must_use]
    pub fn is_accounted(self) -> bool {
        !matches!(self, Self::Draft)
    }

    /// Wire name (`IN_PROGRESS`, ...)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
            Self::Blocked => "BLOCKED",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown audit status: {s}"))
    }
}

/// Check lifecycle within one run cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    /// Waiting for the engine
    Pending,
    /// Picked up by the engine
    Queued,
    /// Being evaluated
    Running,
    /// Passed
    Ok,
    /// Failed
    Ko,
}

impl CheckStatus {
    /// OK or KO
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ok | Self::Ko)
    }

    /// Position along PENDING → QUEUED → RUNNING → {OK|KO}
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Queued => 1,
            Self::Running => 2,
            Self::Ok | Self::Ko => 3,
        }
    }

    /// Whether `next` is reachable from `self` without a run reset.
    ///
    /// Staying put is allowed; terminal states only allow themselves.
    #[must_use]
    pub fn can_advance_to(self, next: CheckStatus) -> bool {
        if self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Ok => "OK",
            Self::Ko => "KO",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Check priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Audit owner (immutable, referenced by audits)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
}

impl Owner {
    #[must_use]
    pub fn new(id: impl Into<OwnerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Representative check shown in a template preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPreview {
    pub title: String,
    pub priority: Priority,
}

impl CheckPreview {
    #[must_use]
    pub fn new(title: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            priority,
        }
    }
}

/// Catalog entry defining the shape of an audit's checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub process: String,
    pub check_count: usize,
    pub checks_preview: Vec<CheckPreview>,
}

/// Top-level unit of compliance work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub id: AuditId,
    pub name: String,
    pub process: String,
    pub status: AuditStatus,
    /// 0..=100
    pub progress: u8,
    pub owner: Owner,
    pub target_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub template_id: TemplateId,
}

/// Single evaluable control item, owned by one audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: CheckId,
    pub title: String,
    pub priority: Priority,
    pub status: CheckStatus,
    pub evidence: String,
    pub reviewed: bool,
    pub updated_at: DateTime<Utc>,
}

impl Check {
    /// Fresh PENDING check with empty evidence
    #[must_use]
    pub fn pending(
        id: CheckId,
        title: impl Into<String>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            priority,
            status: CheckStatus::Pending,
            evidence: String::new(),
            reviewed: false,
            updated_at: now,
        }
    }
}

/// Defensive copy of one audit and its ordered checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSnapshot {
    pub audit: Audit,
    pub checks: Vec<Check>,
    /// Bumped on every store mutation of this audit
    pub revision: u64,
}

impl AuditSnapshot {
    /// Number of OK/KO checks
    #[must_use]
    pub fn terminal_count(&self) -> usize {
        self.checks.iter().filter(|c| c.status.is_terminal()).count()
    }

    /// Number of KO checks
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Ko)
            .count()
    }

    /// Look up a check by id
    #[must_use]
    pub fn check(&self, check_id: &CheckId) -> Option<&Check> {
        self.checks.iter().find(|c| &c.id == check_id)
    }
}

/// Payload for creating an audit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAudit {
    pub name: String,
    pub process: String,
    pub owner: Owner,
    pub target_date: NaiveDate,
    pub template_id: TemplateId,
}

/// Partial update applied to one check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CheckStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed: Option<bool>,
}

impl CheckPatch {
    /// Patch that only sets the status
    #[must_use]
    pub fn status(status: CheckStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// With evidence text
    #[must_use]
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// With reviewed flag
    #[must_use]
    pub fn with_reviewed(mut self, reviewed: bool) -> Self {
        self.reviewed = Some(reviewed);
        self
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.evidence.is_none() && self.reviewed.is_none()
    }
}

/// Result of launching a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReceipt {
    pub run_id: RunId,
    pub audit_id: AuditId,
    /// Cycles for the same audit that were still advancing at launch
    pub overlapping_cycles: usize,
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}
