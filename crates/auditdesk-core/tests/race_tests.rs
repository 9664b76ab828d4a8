//! Re-running an audit while its previous cycle is still advancing.
//!
//! Both cycles race over the same check list. The desk does not resolve
//! the race; these tests pin down what is observable.

use auditdesk_core::prelude::*;
use auditdesk_test_utils::{assert_finalized, new_audit, small_catalog_desk};
use std::time::Duration;

fn racing_config() -> DeskConfig {
    DeskConfig::new().with_fault_rate(0.0).with_rng_seed(31)
}

#[tokio::test(start_paused = true)]
async fn second_run_reports_overlap() {
    let desk = small_catalog_desk(racing_config(), 4);
    let audit = desk.create_audit(new_audit("Raced", "tpl_small")).await.unwrap();

    let first = desk.run_audit(&audit.id).await.unwrap();
    assert_eq!(first.overlapping_cycles, 0);

    // let the first cycle get a few checks in
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(desk.active_runs(&audit.id).len(), 1);

    let second = desk.run_audit(&audit.id).await.unwrap();
    assert_eq!(second.overlapping_cycles, 1);
    assert_ne!(first.run_id, second.run_id);

    let active: Vec<RunId> = desk.active_runs(&audit.id).iter().map(|r| r.run_id).collect();
    assert_eq!(active.len(), 2);
    assert!(active.contains(&first.run_id) && active.contains(&second.run_id));

    let outcomes = desk.wait_idle(&audit.id).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(Option::is_some));
    assert!(desk.active_runs(&audit.id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn raced_checks_still_end_terminal() {
    let desk = small_catalog_desk(racing_config(), 4);
    let audit = desk.create_audit(new_audit("Raced twice", "tpl_small")).await.unwrap();

    desk.run_audit(&audit.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    desk.run_audit(&audit.id).await.unwrap();
    desk.wait_idle(&audit.id).await;

    // a cycle's writes to a check always end with an outcome, and the second
    // cycle visits every check after the reset
    assert_finalized(&desk.live_snapshot(&audit.id).unwrap());
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_in_flight_cycles() {
    let desk = small_catalog_desk(racing_config(), 4);
    let audit = desk.create_audit(new_audit("Torn down", "tpl_small")).await.unwrap();

    desk.run_audit(&audit.id).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(desk.shutdown(), 1);

    let frozen = desk.live_snapshot(&audit.id).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(desk.live_snapshot(&audit.id).unwrap(), frozen);
    assert_eq!(frozen.audit.status, AuditStatus::InProgress);
}
