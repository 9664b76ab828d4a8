//! Seed dataset
//!
//! Static catalog (owners, processes, templates) and a randomly generated
//! set of audits. Generated audits already satisfy the progress/status
//! invariants, so a freshly seeded desk is in a reachable state.

use crate::accounting::progress_of;
use crate::dice::Dice;
use crate::types::{
    Audit, AuditId, AuditStatus, Check, CheckId, CheckPreview, CheckStatus, Owner, Priority,
    Template, TemplateId,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

/// Fallback check count for audits whose template is unknown
pub const DEFAULT_CHECK_COUNT: usize = 15;

/// Business processes audits are filed under
pub const PROCESSES: [&str; 8] = [
    "Procurement",
    "Sales",
    "Security",
    "HR",
    "Operations",
    "Finance",
    "IT",
    "Legal",
];

/// Known audit owners
#[must_use]
pub fn owners() -> Vec<Owner> {
    [
        ("u_1", "Ana López"),
        ("u_2", "Carlos García"),
        ("u_3", "María Fernández"),
        ("u_4", "Javier Martínez"),
        ("u_5", "Laura Sánchez"),
        ("u_6", "Roberto Torres"),
        ("u_7", "Isabel Ruiz"),
        ("u_8", "Miguel Moreno"),
        ("u_9", "Sofía Jiménez"),
        ("u_10", "Diego Herrera"),
    ]
    .into_iter()
    .map(|(id, name)| Owner::new(id, name))
    .collect()
}

fn template(
    id: &str,
    name: &str,
    process: &str,
    check_count: usize,
    preview: [(&str, Priority); 3],
) -> Template {
    Template {
        id: TemplateId::from(id),
        name: name.to_string(),
        process: process.to_string(),
        check_count,
        checks_preview: preview
            .into_iter()
            .map(|(title, priority)| CheckPreview::new(title, priority))
            .collect(),
    }
}

/// Template catalog
#[must_use]
pub fn templates() -> Vec<Template> {
    use Priority::{High, Low, Medium};
    vec![
        template("tpl_1", "ISO 27001 Base", "Security", 24, [
            ("Access management", High),
            ("Backup and recovery", Medium),
            ("Data encryption", High),
        ]),
        template("tpl_2", "SOX Procurement", "Procurement", 18, [
            ("Purchase order approval", High),
            ("Supplier control", Medium),
            ("Invoice audit", High),
        ]),
        template("tpl_3", "ISO 9001 Quality", "Operations", 21, [
            ("Process control", Medium),
            ("Quality indicators", High),
            ("Document review", Low),
        ]),
        template("tpl_4", "GDPR Compliance", "Legal", 15, [
            ("Record of processing", High),
            ("Data subject rights", High),
            ("International transfers", Medium),
        ]),
        template("tpl_5", "HR Evaluation", "HR", 12, [
            ("Performance review", Medium),
            ("Training plan", Low),
            ("Absenteeism control", Medium),
        ]),
        template("tpl_6", "B2B Sales", "Sales", 16, [
            ("Contract validation", High),
            ("Pipeline management", Medium),
            ("Commissions and bonuses", High),
        ]),
        template("tpl_7", "Finance Close", "Finance", 20, [
            ("Bank reconciliation", High),
            ("Accounting provisions", High),
            ("Expense review", Medium),
        ]),
        template("tpl_8", "IT Infrastructure", "IT", 28, [
            ("Security patches", High),
            ("Systems monitoring", Medium),
            ("Contingency plan", High),
        ]),
    ]
}

/// Materialize the PENDING check list for a new audit.
///
/// Preview entries are reused cyclically when the template has more checks
/// than preview entries; an unknown template yields
/// [`DEFAULT_CHECK_COUNT`] generic MEDIUM checks.
#[must_use]
pub fn materialize_checks(
    audit_id: &AuditId,
    template: Option<&Template>,
    now: DateTime<Utc>,
) -> Vec<Check> {
    let count = template.map_or(DEFAULT_CHECK_COUNT, |t| t.check_count);
    let preview = template.map(|t| t.checks_preview.as_slice()).unwrap_or_default();

    (0..count)
        .map(|i| {
            let (title, priority) = match preview.get(i % preview.len().max(1)) {
                Some(p) => (p.title.clone(), p.priority),
                None => (format!("Control {}", i + 1), Priority::Medium),
            };
            Check::pending(CheckId::for_audit(audit_id, i + 1), title, priority, now)
        })
        .collect()
}

fn audit_name(process: &str, index: usize) -> String {
    let names: &[&str] = match process {
        "Procurement" => &["SOX Procurement Audit", "Supplier Review", "Payments Control", "Contract Evaluation", "Expense Audit"],
        "Sales" => &["B2B Pipeline Audit", "Billing Review", "Commissions Control", "CRM Evaluation", "Contracts Audit"],
        "Security" => &["ISO 27001 Audit", "GDPR Review", "IT Access Control", "Risk Assessment", "Incident Audit"],
        "HR" => &["Q1 Performance Review", "Payroll Audit", "Contracts Review", "Absenteeism Control", "Training Evaluation"],
        "Operations" => &["ISO 9001 Audit", "Quality Control", "SLA Review", "Process Evaluation", "Logistics Audit"],
        "Finance" => &["Q1 Accounting Close", "Tax Audit", "Budget Control", "Investments Review", "Treasury Evaluation"],
        "IT" => &["Infrastructure Audit", "License Review", "IT Change Control", "Security Evaluation", "DR/BCP Audit"],
        "Legal" => &["Annual GDPR Review", "Compliance Audit", "Contracts Control", "Legal Risk Evaluation", "Policy Review"],
        _ => &[],
    };
    match names.get(index % names.len().max(1)) {
        Some(name) => format!("{name} - {process}"),
        None => format!("{process} Audit"),
    }
}

fn random_instant(dice: &Dice, start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    let span = (end - start).num_seconds().max(0);
    start + Duration::seconds(dice.between(0, span))
}

fn checks_for_status(
    audit_id: &AuditId,
    template: &Template,
    status: AuditStatus,
    dice: &Dice,
    now: DateTime<Utc>,
) -> Vec<Check> {
    let mut checks = materialize_checks(audit_id, Some(template), now);
    for check in &mut checks {
        check.priority = match dice.below(3) {
            0 => Priority::Low,
            1 => Priority::Medium,
            _ => Priority::High,
        };
    }

    let total = checks.len();
    match status {
        AuditStatus::Draft => {}
        AuditStatus::Done => checks.iter_mut().for_each(|c| c.status = CheckStatus::Ok),
        AuditStatus::Blocked => {
            for check in &mut checks {
                check.status = if dice.chance(0.15) { CheckStatus::Ko } else { CheckStatus::Ok };
            }
            if let Some(first) = checks.get_mut(dice.below(total)) {
                first.status = CheckStatus::Ko;
            }
        }
        AuditStatus::InProgress => {
            // terminal prefix, rest pending
            let done = dice.below(total);
            for check in checks.iter_mut().take(done) {
                check.status = if dice.chance(0.15) { CheckStatus::Ko } else { CheckStatus::Ok };
            }
        }
    }
    checks
}

/// Generate `count` audits with their checks, dataset order
#[must_use]
pub fn generate_audits(count: usize, dice: &Dice) -> Vec<(Audit, Vec<Check>)> {
    let owners = owners();
    let templates = templates();
    let now = Utc::now();
    let today = now.date_naive();

    let updated_from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or(now);
    let updated_to = Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).single().unwrap_or(now);
    let created_from = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).single().unwrap_or(now);
    let created_to = Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).single().unwrap_or(now);

    (0..count)
        .map(|i| {
            let id = AuditId(format!("aud_{}", 1001 + i));
            let process = PROCESSES[i % PROCESSES.len()];
            let template = &templates[i % templates.len()];
            let owner = owners[i % owners.len()].clone();
            let status = AuditStatus::ALL[dice.below(AuditStatus::ALL.len())];

            let checks = checks_for_status(&id, template, status, dice, now);
            let progress = match status {
                AuditStatus::Draft => 0,
                AuditStatus::Done | AuditStatus::Blocked => 100,
                AuditStatus::InProgress => progress_of(&checks),
            };
            let target_date: NaiveDate = today + Duration::days(dice.between(10, 99));

            let audit = Audit {
                id,
                name: audit_name(process, i),
                process: process.to_string(),
                status,
                progress,
                owner,
                target_date,
                created_at: random_instant(dice, created_from, created_to),
                updated_at: random_instant(dice, updated_from, updated_to),
                template_id: template.id.clone(),
            };
            (audit, checks)
        })
        .collect()
}
