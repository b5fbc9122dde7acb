//! Tests for the plan → implement → update pipeline

use super::common::*;
use todone::workflow::exit_code;
use todone_core::{FinalTaskStatus, PhaseStatus, WorkflowKind};

use std::process::ExitCode;

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn test_plan_implement_update_success() {
    let agent = ScriptedAgent::default()
        .reply("/plan", ok("Created plan at: specs/plan-login-form.md"))
        .reply("/implement", ok("Implemented and committed"))
        .reply("/update_task", ok("Task updated"));
    let fx = Fixture::new(agent);

    let result = fx
        .run(WorkflowKind::PlanImplementUpdate, FixedCommit(Some("abc123def")))
        .await;
    let summary = result.as_ref().unwrap();

    assert_eq!(fx.agent.commands(), vec!["/plan", "/implement", "/update_task"]);
    assert_eq!(summary.plan_path.as_deref(), Some("specs/plan-login-form.md"));
    assert_eq!(summary.commit_ref.as_deref(), Some("abc123def"));
    assert_eq!(summary.final_task_status, FinalTaskStatus::Success);
    assert!(summary.is_clean_success());
    assert_eq!(exit_code(&result), ExitCode::SUCCESS);

    let implement = summary.phase("implement").unwrap();
    assert_eq!(implement.args, vec!["specs/plan-login-form.md"]);
    assert_eq!(implement.working_dir, fx.workspace_dir());

    let update = summary.phase("update").unwrap();
    assert_eq!(
        update.args,
        vec![RUN_ID, WORKSPACE, TASK, "success", "abc123def", ""]
    );
    assert_eq!(update.working_dir, fx.root());
}

#[tokio::test]
async fn test_artifacts_are_written() {
    let agent = ScriptedAgent::default()
        .reply("/plan", ok("Plan file: specs/plan-a.md"));
    let fx = Fixture::new(agent);

    fx.run(WorkflowKind::PlanImplementUpdate, FixedCommit(Some("abc123def")))
        .await
        .unwrap();

    let layout = fx.layout();
    let run_id = fx.run_id();
    let summary = fx.read_json(&layout.workflow_summary(&run_id));
    assert_eq!(summary["workflow_name"], "plan_implement_update");
    assert_eq!(summary["final_task_status"], "success");

    let state = fx.read_json(&layout.workflow_state(&run_id));
    assert_eq!(state["stage"], "completed");
    assert!(state["completed_at"].is_string());

    let plan = fx.read_json(&layout.phase_summary(&run_id, "planner-auth"));
    assert_eq!(plan["plan_path"], "specs/plan-a.md");
    assert_eq!(plan["status"], "succeeded");
}

// ============================================================================
// Upstream failures
// ============================================================================

#[tokio::test]
async fn test_plan_without_path_skips_implement() {
    let agent = ScriptedAgent::default().reply("/plan", ok("I thought about it a lot."));
    let fx = Fixture::new(agent);

    let result = fx
        .run(WorkflowKind::PlanImplementUpdate, FixedCommit(Some("abc123def")))
        .await;
    let summary = result.as_ref().unwrap();

    assert_eq!(fx.agent.commands(), vec!["/plan", "/update_task"]);

    let implement = summary.phase("implement").unwrap();
    assert_eq!(implement.status, PhaseStatus::Skipped);
    assert_eq!(implement.skip_reason.as_deref(), Some("no plan path"));

    let update = summary.phase("update").unwrap();
    assert_eq!(update.args[3], "failed");
    assert_eq!(update.args[4], "");
    assert!(update.args[5].contains("plan file path"));

    assert_eq!(summary.final_task_status, FinalTaskStatus::Failed);
    assert_eq!(exit_code(&result), ExitCode::from(1));
}

#[tokio::test]
async fn test_failed_plan_skips_implement() {
    let agent = ScriptedAgent::default().reply("/plan", content_failure("Cannot read repository"));
    let fx = Fixture::new(agent);

    let summary = fx
        .run(WorkflowKind::PlanImplementUpdate, FixedCommit(Some("abc123def")))
        .await
        .unwrap();

    let plan = summary.phase("plan").unwrap();
    assert_eq!(plan.status, PhaseStatus::Failed);
    assert_eq!(plan.error.as_deref(), Some("Cannot read repository"));

    let implement = summary.phase("implement").unwrap();
    assert_eq!(implement.skip_reason.as_deref(), Some("plan failed"));
    assert!(implement.artifact_paths.is_empty());

    let update = summary.phase("update").unwrap();
    assert_eq!(update.args[3], "failed");
    assert!(update.args[5].contains("Cannot read repository"));
}

#[tokio::test]
async fn test_multiline_error_is_flattened_for_update() {
    let long = format!("first line\nsecond line\n{}", "x".repeat(2000));
    let agent = ScriptedAgent::default().reply("/plan", content_failure(&long));
    let fx = Fixture::new(agent);

    let summary = fx
        .run(WorkflowKind::PlanImplementUpdate, FixedCommit(None))
        .await
        .unwrap();

    let error = &summary.phase("update").unwrap().args[5];
    assert!(!error.contains('\n'));
    assert!(error.chars().count() <= 500);
}

// ============================================================================
// Update phase
// ============================================================================

#[tokio::test]
async fn test_failed_update_is_not_clean_success() {
    let agent = ScriptedAgent::default()
        .reply("/plan", ok("Created plan at: specs/plan-a.md"))
        .reply("/update_task", content_failure("task not found"));
    let fx = Fixture::new(agent);

    let result = fx
        .run(WorkflowKind::PlanImplementUpdate, FixedCommit(Some("abc123def")))
        .await;
    let summary = result.as_ref().unwrap();

    assert_eq!(summary.final_task_status, FinalTaskStatus::Success);
    assert!(!summary.is_clean_success());
    assert!(summary.error.as_deref().unwrap().contains("task not found"));
    assert_eq!(exit_code(&result), ExitCode::from(1));

    let state = fx.read_json(&fx.layout().workflow_state(&fx.run_id()));
    assert_eq!(state["stage"], "failed");
}
