//! Tests for the build → update pipeline

use super::common::*;
use todone_core::{FinalTaskStatus, PhaseStatus, TaskUpdate, WorkflowKind};

#[tokio::test]
async fn test_build_with_commit_succeeds() {
    let agent = ScriptedAgent::default().reply("/build", ok("Built and committed"));
    let fx = Fixture::new(agent);

    let summary = fx
        .run(WorkflowKind::BuildUpdate, FixedCommit(Some("0f1e2d3c4")))
        .await
        .unwrap();

    assert_eq!(fx.agent.commands(), vec!["/build", "/update_task"]);
    assert_eq!(summary.final_task_status, FinalTaskStatus::Success);
    assert_eq!(summary.commit_ref.as_deref(), Some("0f1e2d3c4"));
    assert!(summary.overall_success);

    let build = summary.phase("build").unwrap();
    assert_eq!(build.args, vec![RUN_ID, TASK]);
    assert_eq!(build.extras["commit_hash"], "0f1e2d3c4");

    let update = summary.phase("update").unwrap();
    assert_eq!(update.args[3], "success");
    assert_eq!(update.args[4], "0f1e2d3c4");
    assert_eq!(update.extras["final_status"], "success");
}

#[tokio::test]
async fn test_build_without_commit_fails() {
    let agent = ScriptedAgent::default().reply("/build", ok("Nothing to do"));
    let fx = Fixture::new(agent);

    let summary = fx
        .run(WorkflowKind::BuildUpdate, FixedCommit(None))
        .await
        .unwrap();

    assert_eq!(summary.final_task_status, FinalTaskStatus::Failed);
    assert_eq!(summary.commit_ref, None);
    assert!(summary.error.as_deref().unwrap().contains("no commit"));

    let build = summary.phase("build").unwrap();
    assert_eq!(build.status, PhaseStatus::Succeeded);

    let update = summary.phase("update").unwrap();
    assert_eq!(update.args[3], "failed");
    assert_eq!(update.args[4], "");
}

#[tokio::test]
async fn test_update_args_come_from_task_update() {
    let agent = ScriptedAgent::default().reply("/build", ok("Nothing to do"));
    let fx = Fixture::new(agent);

    let summary = fx
        .run(WorkflowKind::BuildUpdate, FixedCommit(None))
        .await
        .unwrap();

    let expected = TaskUpdate::failed(
        fx.run_id(),
        WORKSPACE,
        TASK,
        "no commit found in workspace after build phase",
    );
    let update = summary.phase("update").unwrap();
    assert_eq!(update.args, expected.command_args());
    assert_eq!(update.extras["final_status"], "failed");
}

#[tokio::test]
async fn test_failed_build_still_updates() {
    let agent = ScriptedAgent::default().reply("/build", content_failure("compile error"));
    let fx = Fixture::new(agent);

    let summary = fx
        .run(WorkflowKind::BuildUpdate, FixedCommit(Some("0f1e2d3c4")))
        .await
        .unwrap();

    assert_eq!(fx.agent.commands(), vec!["/build", "/update_task"]);
    assert_eq!(summary.final_task_status, FinalTaskStatus::Failed);
    assert_eq!(summary.commit_ref, None);

    let update = summary.phase("update").unwrap();
    assert_eq!(update.args[3], "failed");
    assert!(update.args[5].contains("compile error"));
}

#[tokio::test]
async fn test_build_runs_in_workspace_with_builder_artifacts() {
    let fx = Fixture::new(ScriptedAgent::default());

    fx.run(WorkflowKind::BuildUpdate, FixedCommit(Some("0f1e2d3c4")))
        .await
        .unwrap();

    let requests = fx.agent.requests();
    assert_eq!(requests[0].working_dir.as_deref(), Some(fx.workspace_dir().as_path()));
    assert_eq!(
        requests[0].output_file,
        fx.layout().raw_output(&fx.run_id(), "builder-auth")
    );
    assert_eq!(requests[1].working_dir.as_deref(), Some(fx.root()));
    assert!(fx
        .layout()
        .phase_summary(&fx.run_id(), "updater-auth")
        .exists());
}
