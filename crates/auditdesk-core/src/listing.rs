//! Audit listing: filter, then sort, then slice
//!
//! Pure functions over a vector of audits, so the paging and ordering rules
//! can be tested without the injector in front.

use crate::types::{Audit, AuditStatus, OwnerId, Page};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Sortable audit attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    Name,
    UpdatedAt,
    TargetDate,
    Progress,
    /// Unknown key, order left untouched
    Unsorted,
}

impl SortField {
    fn wire(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::UpdatedAt => "updatedAt",
            Self::TargetDate => "targetDate",
            Self::Progress => "progress",
            Self::Unsorted => "none",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort key plus direction, written `<field>_<dir>` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    #[must_use]
    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Same key, opposite direction
    #[must_use]
    pub fn reversed(self) -> Self {
        let direction = match self.direction {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        };
        Self { direction, ..self }
    }

    fn compare(self, a: &Audit, b: &Audit) -> Ordering {
        let ord = match self.field {
            SortField::Name => a.name.cmp(&b.name),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortField::TargetDate => a.target_date.cmp(&b.target_date),
            SortField::Progress => a.progress.cmp(&b.progress),
            SortField::Unsorted => Ordering::Equal,
        };
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::new(SortField::UpdatedAt, SortDirection::Desc)
    }
}

impl FromStr for SortSpec {
    type Err = std::convert::Infallible;

    /// Never fails: unknown fields sort nothing, unknown directions descend
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, dir) = s.split_once('_').unwrap_or((s, ""));
        let field = match field {
            "name" => SortField::Name,
            "updatedAt" => SortField::UpdatedAt,
            "targetDate" => SortField::TargetDate,
            "progress" => SortField::Progress,
            _ => SortField::Unsorted,
        };
        let direction = if dir == "asc" {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        Ok(Self::new(field, direction))
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}_{dir}", self.field.wire())
    }
}

/// Listing filters; `None`/empty fields do not filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFilters {
    /// Case-insensitive substring over name and process
    pub query: Option<String>,
    pub statuses: Vec<AuditStatus>,
    pub process: Option<String>,
    pub owner_id: Option<OwnerId>,
    pub sort: Option<SortSpec>,
    /// 1-based
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl AuditFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = AuditStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_process(mut self, process: impl Into<String>) -> Self {
        self.process = Some(process.into());
        self
    }

    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<OwnerId>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Whether an audit passes every filter
    #[must_use]
    pub fn matches(&self, audit: &Audit) -> bool {
        if let Some(q) = self.query.as_deref().filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            if !audit.name.to_lowercase().contains(&q) && !audit.process.to_lowercase().contains(&q)
            {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&audit.status) {
            return false;
        }
        if let Some(process) = self.process.as_deref().filter(|p| !p.is_empty()) {
            if audit.process != process {
                return false;
            }
        }
        if let Some(owner) = self.owner_id.as_ref().filter(|o| !o.as_str().is_empty()) {
            if &audit.owner.id != owner {
                return false;
            }
        }
        true
    }
}

/// Filter, sort (stable), then slice one page
#[must_use]
pub fn select(audits: Vec<Audit>, filters: &AuditFilters, default_page_size: usize) -> Page<Audit> {
    let mut matched: Vec<Audit> = audits.into_iter().filter(|a| filters.matches(a)).collect();

    let sort = filters.sort.unwrap_or_default();
    if sort.field != SortField::Unsorted {
        // sort_by is stable: ties keep insertion order
        matched.sort_by(|a, b| sort.compare(a, b));
    }

    let page = filters.page.unwrap_or(1).max(1);
    let page_size = filters.page_size.unwrap_or(default_page_size);
    let total = matched.len();

    let start = (page - 1).saturating_mul(page_size).min(total);
    let end = start.saturating_add(page_size).min(total);
    let items = matched.drain(start..end).collect();

    Page {
        items,
        total,
        page,
        page_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuditId, Owner, TemplateId};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn audit(i: i64, name: &str, process: &str, status: AuditStatus, progress: u8) -> Audit {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Audit {
            id: AuditId(format!("aud_{i}")),
            name: name.to_string(),
            process: process.to_string(),
            status,
            progress,
            owner: Owner::new(format!("u_{}", i % 3), "Owner"),
            target_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap() + Duration::days(i),
            created_at: base,
            updated_at: base + Duration::hours(i),
            template_id: TemplateId::from("tpl_1"),
        }
    }

    fn sample() -> Vec<Audit> {
        vec![
            audit(0, "Vendor review", "Procurement", AuditStatus::Draft, 0),
            audit(1, "Access control", "Security", AuditStatus::Done, 100),
            audit(2, "Payroll audit", "HR", AuditStatus::InProgress, 40),
            audit(3, "Invoice audit", "Procurement", AuditStatus::Blocked, 100),
            audit(4, "Patch levels", "IT", AuditStatus::InProgress, 40),
        ]
    }

    fn ids(page: &Page<Audit>) -> Vec<&str> {
        page.items.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn parses_wire_sort() {
        let spec: SortSpec = "progress_asc".parse().unwrap();
        assert_eq!(spec, SortSpec::new(SortField::Progress, SortDirection::Asc));
        assert_eq!(spec.to_string(), "progress_asc");

        let unknown: SortSpec = "colour_asc".parse().unwrap();
        assert_eq!(unknown.field, SortField::Unsorted);

        let odd_dir: SortSpec = "name_sideways".parse().unwrap();
        assert_eq!(odd_dir.direction, SortDirection::Desc);
    }

    #[test]
    fn default_sort_is_updated_desc() {
        let page = select(sample(), &AuditFilters::new(), 10);
        assert_eq!(ids(&page), vec!["aud_4", "aud_3", "aud_2", "aud_1", "aud_0"]);
        assert_eq!(page.total, 5);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn text_query_matches_name_or_process() {
        let filters = AuditFilters::new()
            .with_query("PROCUREMENT")
            .with_sort("name_asc".parse().unwrap());
        let page = select(sample(), &filters, 10);
        assert_eq!(ids(&page), vec!["aud_3", "aud_0"]);

        let filters = AuditFilters::new().with_query("audit");
        assert_eq!(select(sample(), &filters, 10).total, 2);
    }

    #[test]
    fn status_process_owner_filters() {
        let filters = AuditFilters::new().with_statuses([AuditStatus::InProgress, AuditStatus::Done]);
        assert_eq!(select(sample(), &filters, 10).total, 3);

        let filters = AuditFilters::new().with_process("Procurement");
        assert_eq!(select(sample(), &filters, 10).total, 2);

        let filters = AuditFilters::new().with_owner("u_1");
        let page = select(sample(), &filters, 10);
        assert!(page.items.iter().all(|a| a.owner.id.as_str() == "u_1"));
        assert_eq!(page.total, 2);
    }

    #[test]
    fn empty_filter_values_match_everything() {
        let filters = AuditFilters::new().with_query("").with_process("").with_owner("");
        assert_eq!(select(sample(), &filters, 10).total, 5);
    }

    #[test]
    fn done_filter_with_no_text_match_is_empty() {
        let filters = AuditFilters::new()
            .with_statuses([AuditStatus::Done])
            .with_query("zzz-no-such-audit");
        let page = select(sample(), &filters, 10);
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let filters = AuditFilters::new().with_sort("progress_desc".parse().unwrap());
        let page = select(sample(), &filters, 10);
        // aud_1/aud_3 tie at 100, aud_2/aud_4 tie at 40
        assert_eq!(ids(&page), vec!["aud_1", "aud_3", "aud_2", "aud_4", "aud_0"]);
    }

    #[test]
    fn unsorted_keeps_store_order() {
        let filters = AuditFilters::new().with_sort("bogus_asc".parse().unwrap());
        let page = select(sample(), &filters, 10);
        assert_eq!(ids(&page), vec!["aud_0", "aud_1", "aud_2", "aud_3", "aud_4"]);
    }

    #[test]
    fn pages_slice_contiguously() {
        let sort = "name_asc".parse().unwrap();
        let first = select(sample(), &AuditFilters::new().with_sort(sort).with_page(1, 2), 10);
        let third = select(sample(), &AuditFilters::new().with_sort(sort).with_page(3, 2), 10);
        let beyond = select(sample(), &AuditFilters::new().with_sort(sort).with_page(9, 2), 10);

        assert_eq!(ids(&first), vec!["aud_1", "aud_3"]);
        assert_eq!(ids(&third), vec!["aud_0"]);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 5);
    }

    #[test]
    fn page_zero_is_first_page() {
        let page = select(sample(), &AuditFilters::new().with_page(0, 2), 10);
        assert_eq!(page.page, 1);
        assert_eq!(page.items.len(), 2);
    }
}
