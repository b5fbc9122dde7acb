//! Outcome of one agent invocation and the streamed records it is read from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why an attempt failed, from the retry engine's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryClassification {
    /// Succeeded, or failed in a way retrying will not fix
    #[default]
    None,
    TransientCliError,
    Timeout,
    ExecutionError,
    NoResultProduced,
}

impl RetryClassification {
    /// Infrastructure failures are retried; content failures are not
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            RetryClassification::TransientCliError
                | RetryClassification::Timeout
                | RetryClassification::ExecutionError
        )
    }
}

/// Result of a single invocation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInvocationResult {
    pub output: String,
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(rename = "retry_code")]
    pub retry_classification: RetryClassification,
}

impl AgentInvocationResult {
    pub fn succeeded(output: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            output: output.into(),
            success: true,
            session_id,
            retry_classification: RetryClassification::None,
        }
    }

    /// The agent finished and reported an error itself
    pub fn content_failure(output: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            session_id,
            retry_classification: RetryClassification::None,
        }
    }

    pub fn failed(classification: RetryClassification, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            success: false,
            session_id: None,
            retry_classification: classification,
        }
    }

    pub fn is_retryable(&self) -> bool {
        !self.success && self.retry_classification.is_retryable()
    }
}

/// Subtype the agent uses when it stopped without producing a result
pub const SUBTYPE_ERROR_DURING_EXECUTION: &str = "error_during_execution";

/// The `type = "result"` record that closes a stream
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
}

impl ResultRecord {
    /// Read a record if it is a result record
    pub fn from_value(record: &Value) -> Option<Self> {
        if record_type(record) != Some("result") {
            return None;
        }
        serde_json::from_value(record.clone()).ok()
    }
}

#[derive(Debug, Deserialize)]
struct AssistantRecord {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Text of the first content block of an assistant record, if any
pub fn assistant_text(record: &Value) -> Option<String> {
    if record_type(record) != Some("assistant") {
        return None;
    }
    let parsed: AssistantRecord = serde_json::from_value(record.clone()).ok()?;
    match parsed.message.content.into_iter().next()? {
        ContentBlock::Text { text } if !text.trim().is_empty() => Some(text),
        _ => None,
    }
}

/// The `type` field of a streamed record
pub fn record_type(record: &Value) -> Option<&str> {
    record.get("type").and_then(Value::as_str)
}
