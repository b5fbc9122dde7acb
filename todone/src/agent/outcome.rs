//! Classification of a finished attempt and its failure diagnostics.

use serde_json::Value;
use std::process::ExitStatus;

use todone_core::invocation::{assistant_text, record_type, SUBTYPE_ERROR_DURING_EXECUTION};
use todone_core::{AgentInvocationResult, ResultRecord, RetryClassification};

use super::stream::Transcript;

pub const TRUNCATION_SUFFIX: &str = "... (truncated)";

/// Error text longer than this is shortened before it is reported
pub const ERROR_TEXT_LIMIT: usize = 1000;
pub const TRUNCATED_LENGTH: usize = 800;

const RECENT_RECORDS: usize = 5;
const ASSISTANT_EXCERPT: usize = 500;
const RAW_LINE_EXCERPT: usize = 200;

/// How the agent process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub success: bool,
    pub code: Option<i32>,
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// Turn a finished process and its stream into one attempt result.
///
/// When a result record exists it decides the outcome regardless of the exit
/// status. Without one, a clean exit means the agent produced nothing (not
/// retried) and a failed exit is a transient CLI error.
pub fn classify(transcript: &Transcript, exit: ProcessExit, stderr: &str) -> AgentInvocationResult {
    if let Some(result) = transcript.authoritative_result() {
        return classify_result(result);
    }

    let evidence = FailureEvidence {
        transcript,
        stderr,
        exit_code: exit.code,
    };

    if exit.success {
        AgentInvocationResult::failed(
            RetryClassification::NoResultProduced,
            describe_missing_result(&evidence),
        )
    } else {
        AgentInvocationResult::failed(
            RetryClassification::TransientCliError,
            describe_cli_failure(&evidence),
        )
    }
}

fn classify_result(result: ResultRecord) -> AgentInvocationResult {
    if result.subtype == SUBTYPE_ERROR_DURING_EXECUTION {
        let mut failed = AgentInvocationResult::failed(
            RetryClassification::NoResultProduced,
            "Error during execution: agent stopped without returning a result",
        );
        failed.session_id = result.session_id;
        return failed;
    }

    let text = result.result.unwrap_or_default();
    if result.is_error {
        let text = if text.chars().count() > ERROR_TEXT_LIMIT {
            truncate_output(&text, TRUNCATED_LENGTH)
        } else {
            text
        };
        AgentInvocationResult::content_failure(text, result.session_id)
    } else {
        AgentInvocationResult::succeeded(text, result.session_id)
    }
}

/// What is known about a failed attempt
pub struct FailureEvidence<'a> {
    pub transcript: &'a Transcript,
    pub stderr: &'a str,
    pub exit_code: Option<i32>,
}

type Extractor = fn(&FailureEvidence<'_>) -> Option<String>;

const CLI_FAILURE_EXTRACTORS: &[Extractor] = &[recent_error_text, raw_output_tail];
const MISSING_RESULT_EXTRACTORS: &[Extractor] = &[recent_assistant_text];

fn first_match(chain: &[Extractor], evidence: &FailureEvidence<'_>) -> Option<String> {
    chain.iter().find_map(|extract| extract(evidence))
}

pub fn describe_cli_failure(evidence: &FailureEvidence<'_>) -> String {
    let detail = first_match(CLI_FAILURE_EXTRACTORS, evidence).unwrap_or_else(|| {
        match evidence.exit_code {
            Some(code) => format!("command failed with exit code {code}"),
            None => "command terminated by a signal".to_string(),
        }
    });
    truncate_output(&format!("Agent CLI error: {detail}"), TRUNCATED_LENGTH)
}

pub fn describe_missing_result(evidence: &FailureEvidence<'_>) -> String {
    match first_match(MISSING_RESULT_EXTRACTORS, evidence) {
        Some(text) => format!("Agent output: {}", take_chars(&text, ASSISTANT_EXCERPT)),
        None => "No result message found in agent output".to_string(),
    }
}

fn recent_assistant_text(evidence: &FailureEvidence<'_>) -> Option<String> {
    evidence
        .transcript
        .recent(RECENT_RECORDS)
        .find_map(assistant_text)
}

fn recent_error_text(evidence: &FailureEvidence<'_>) -> Option<String> {
    evidence
        .transcript
        .recent(RECENT_RECORDS)
        .filter_map(assistant_text)
        .find(|text| {
            let lower = text.to_lowercase();
            lower.contains("error") || lower.contains("failed")
        })
        .map(|text| take_chars(&text, ASSISTANT_EXCERPT))
}

fn raw_output_tail(evidence: &FailureEvidence<'_>) -> Option<String> {
    let tail = evidence
        .transcript
        .last_line()
        .map(|line| take_chars(line, RAW_LINE_EXCERPT));
    let stderr = evidence.stderr.trim();

    match (tail, stderr.is_empty()) {
        (Some(tail), false) => Some(format!("{tail} | stderr: {stderr}")),
        (Some(tail), true) => Some(tail),
        (None, false) => Some(stderr.to_string()),
        (None, true) => None,
    }
}

/// Shorten `output` to at most `max_chars` characters, suffix included.
///
/// The cut prefers a newline within 50 characters of the limit, then a space
/// within 20. Raw stream text is first reduced to its last meaningful message.
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    let reduced;
    let output = if looks_like_stream(output) {
        reduced = reduce_stream(output);
        reduced.as_str()
    } else {
        output
    };

    if output.chars().count() <= max_chars {
        return output.to_string();
    }

    let keep = max_chars.saturating_sub(TRUNCATION_SUFFIX.chars().count());
    let cut = byte_offset(output, keep);
    let head = &output[..cut];

    let newline_floor = byte_offset(output, keep.saturating_sub(50));
    let space_floor = byte_offset(output, keep.saturating_sub(20));

    let end = head[newline_floor..]
        .rfind('\n')
        .map(|i| newline_floor + i)
        .filter(|&i| i > 0)
        .or_else(|| {
            head[space_floor..]
                .rfind(' ')
                .map(|i| space_floor + i)
                .filter(|&i| i > 0)
        })
        .unwrap_or(cut);

    format!("{}{}", &output[..end], TRUNCATION_SUFFIX)
}

fn looks_like_stream(output: &str) -> bool {
    output.starts_with("{\"type\":") && output.contains("\n{\"type\":")
}

fn reduce_stream(output: &str) -> String {
    let records: Vec<Value> = output
        .lines()
        .filter_map(|line| serde_json::from_str(line.trim()).ok())
        .collect();

    for record in records.iter().rev() {
        if record_type(record) == Some("result") {
            if let Some(text) = record.get("result").and_then(Value::as_str) {
                return text.to_string();
            }
        }
        if let Some(text) = assistant_text(record) {
            return text;
        }
    }
    format!("[stream output with {} messages]", records.len())
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

fn take_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
