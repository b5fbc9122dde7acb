//! Tests for dry-run ticks

use super::common::*;
use todone::scheduler::Disposition;

#[tokio::test]
async fn test_dry_run_has_no_side_effects() {
    let mut h = Harness::new(vec![group(
        "auth",
        vec![task("Add login form", &["plan_implement_update"]), task("Add logout", &[])],
    )]);
    h.config.dry_run = true;
    let (mut scheduler, recorder) = h.build();

    let report = scheduler.tick().await;

    let recorder = recorder.lock().unwrap();
    assert!(recorder.created.is_empty());
    assert!(recorder.marked.is_empty());
    assert!(recorder.launched.is_empty());
    assert_eq!(report.would_delegate(), 2);
    assert!(report
        .dispositions
        .iter()
        .all(|d| matches!(d, Disposition::WouldDelegate(_))));

    let stats = scheduler.stats();
    assert_eq!(stats.workspaces_created, 0);
    assert_eq!(stats.tasks_started, 0);
    assert_eq!(stats.checks, 1);
}

#[tokio::test]
async fn test_dry_run_applies_ceiling() {
    let mut h = Harness::new(vec![
        group("auth", vec![task("a1", &[]), task("a2", &[])]),
        group("billing", vec![task("b1", &[])]),
    ]);
    h.config.dry_run = true;
    h.config.max_concurrent_tasks = 2;
    let (mut scheduler, _recorder) = h.build();

    let report = scheduler.tick().await;

    assert!(report.capacity_reached);
    assert_eq!(report.would_delegate(), 2);
}
