//! Tests for the CLI runner against shell scripts standing in for the agent

#![cfg(unix)]

use std::time::Duration;

use super::common::*;
use todone::agent::{AgentRunner, ClaudeCli};
use todone::config::AgentSettings;
use todone_core::RetryClassification;

const INIT: &str = r#"{"type":"system","subtype":"init","session_id":"sess-1"}"#;
const ASSISTANT: &str =
    r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Working on it"}]}}"#;
const RESULT_OK: &str = r#"{"type":"result","subtype":"success","is_error":false,"result":"Created plan at: specs/plan-login.md","session_id":"sess-1","duration_ms":1200,"num_turns":3}"#;
const RESULT_ERR: &str = r#"{"type":"result","subtype":"success","is_error":true,"result":"Tests are failing","session_id":"sess-1"}"#;
const RESULT_STOPPED: &str =
    r#"{"type":"result","subtype":"error_during_execution","is_error":true,"session_id":"sess-1"}"#;

fn emit(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| format!("printf '%s\\n' '{line}'"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn cli(agent: &std::path::Path) -> ClaudeCli {
    ClaudeCli::new(AgentSettings::from_env().with_agent_path(agent.to_string_lossy()))
}

// ============================================================================
// Result record decides the outcome
// ============================================================================

#[tokio::test]
async fn test_successful_result_record() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(dir.path(), &emit(&[INIT, ASSISTANT, RESULT_OK]));
    let req = request_in(dir.path(), "/plan a1b2c3d4 add login");

    let result = cli(&agent).invoke(&req).await;

    assert!(result.success);
    assert_eq!(result.output, "Created plan at: specs/plan-login.md");
    assert_eq!(result.session_id.as_deref(), Some("sess-1"));

    let agent_dir = req.output_file.parent().unwrap();
    assert!(agent_dir.join("cc_raw_output.json").exists());
    assert!(agent_dir.join("cc_final_object.json").exists());
    assert_eq!(
        std::fs::read_to_string(agent_dir.join("prompts").join("plan.txt")).unwrap(),
        "/plan a1b2c3d4 add login"
    );
}

#[tokio::test]
async fn test_result_record_wins_over_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!("{}\nexit 3", emit(&[INIT, RESULT_OK]));
    let agent = fake_agent(dir.path(), &body);

    let result = cli(&agent).invoke(&request_in(dir.path(), "hello")).await;

    assert!(result.success);
}

#[tokio::test]
async fn test_error_result_is_content_failure() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(dir.path(), &emit(&[INIT, RESULT_ERR]));

    let result = cli(&agent).invoke(&request_in(dir.path(), "hello")).await;

    assert!(!result.success);
    assert_eq!(result.output, "Tests are failing");
    assert!(!result.is_retryable());
}

#[tokio::test]
async fn test_error_during_execution_produces_no_result() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(dir.path(), &emit(&[INIT, ASSISTANT, RESULT_STOPPED]));

    let result = cli(&agent).invoke(&request_in(dir.path(), "hello")).await;

    assert_eq!(result.retry_classification, RetryClassification::NoResultProduced);
    assert!(!result.is_retryable());
}

// ============================================================================
// No result record
// ============================================================================

#[tokio::test]
async fn test_clean_exit_without_result_reports_assistant_text() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(dir.path(), &emit(&[INIT, ASSISTANT]));

    let result = cli(&agent).invoke(&request_in(dir.path(), "hello")).await;

    assert_eq!(result.retry_classification, RetryClassification::NoResultProduced);
    assert_eq!(result.output, "Agent output: Working on it");
}

#[tokio::test]
async fn test_failed_exit_without_result_is_transient() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(dir.path(), "echo 'rate limited' >&2\nexit 1");

    let result = cli(&agent).invoke(&request_in(dir.path(), "hello")).await;

    assert_eq!(result.retry_classification, RetryClassification::TransientCliError);
    assert!(result.is_retryable());
    assert!(result.output.starts_with("Agent CLI error:"));
    assert!(result.output.contains("rate limited"));
}

#[tokio::test]
async fn test_slow_agent_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake_agent(dir.path(), "sleep 5");
    let runner = ClaudeCli::new(
        AgentSettings::from_env()
            .with_agent_path(agent.to_string_lossy())
            .with_timeout(Duration::from_millis(200)),
    );

    let result = runner.invoke(&request_in(dir.path(), "hello")).await;

    assert_eq!(result.retry_classification, RetryClassification::Timeout);
    assert!(result.is_retryable());
}
