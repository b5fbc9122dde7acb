//! Tests for the retry engine
//!
//! Time is paused so the delay schedule can be measured exactly.

use std::time::Duration;
use tokio::time::Instant;

use super::common::*;
use todone::agent::{invoke_with_retry, RetryPolicy};
use todone_core::RetryClassification;

// ============================================================================
// Retryable failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_retries_until_success() {
    let runner = ScriptedRunner::new(vec![
        failure(RetryClassification::Timeout, "timed out"),
        failure(RetryClassification::TransientCliError, "Agent CLI error: exit 1"),
        success("done"),
    ]);
    let policy = RetryPolicy::default().with_max_retries(4);

    let start = Instant::now();
    let result = invoke_with_retry(&runner, &request("/build x"), &policy).await;
    let slept = start.elapsed();

    assert!(result.success);
    assert_eq!(result.output, "done");
    assert_eq!(runner.calls(), 3);
    assert!(slept >= Duration::from_secs(4), "slept {slept:?}");
    assert!(slept < Duration::from_secs(5), "slept {slept:?}");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_return_last_failure() {
    let runner = ScriptedRunner::new(vec![
        failure(RetryClassification::ExecutionError, "attempt 1"),
        failure(RetryClassification::ExecutionError, "attempt 2"),
        failure(RetryClassification::ExecutionError, "attempt 3"),
        failure(RetryClassification::ExecutionError, "attempt 4"),
    ]);
    let policy = RetryPolicy::default();

    let start = Instant::now();
    let result = invoke_with_retry(&runner, &request("/build x"), &policy).await;

    assert!(!result.success);
    assert_eq!(result.output, "attempt 4");
    assert_eq!(result.retry_classification, RetryClassification::ExecutionError);
    assert_eq!(runner.calls(), 4);
    assert!(start.elapsed() >= Duration::from_secs(1 + 3 + 5));
}

// ============================================================================
// Non-retryable outcomes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_content_failure_is_not_retried() {
    let runner = ScriptedRunner::new(vec![todone_core::AgentInvocationResult::content_failure(
        "tests failed",
        Some("s".into()),
    )]);

    let result = invoke_with_retry(&runner, &request("/build x"), &RetryPolicy::default()).await;

    assert!(!result.success);
    assert_eq!(result.output, "tests failed");
    assert_eq!(runner.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_result_produced_is_not_retried() {
    let runner = ScriptedRunner::new(vec![failure(
        RetryClassification::NoResultProduced,
        "No result message found in agent output",
    )]);

    let result = invoke_with_retry(&runner, &request("/plan x"), &RetryPolicy::default()).await;

    assert_eq!(result.retry_classification, RetryClassification::NoResultProduced);
    assert_eq!(runner.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_policy_without_retries_makes_one_attempt() {
    let runner = ScriptedRunner::new(vec![failure(RetryClassification::Timeout, "timed out")]);

    let start = Instant::now();
    let result = invoke_with_retry(&runner, &request("hello"), &RetryPolicy::none()).await;

    assert_eq!(result.retry_classification, RetryClassification::Timeout);
    assert_eq!(runner.calls(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}
