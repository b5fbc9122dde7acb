//! Agent invocation layer
//!
//! - **process**: launches the agent CLI and supervises one attempt
//! - **stream**: reads and materializes the line-delimited result stream
//! - **outcome**: classifies an attempt and builds failure diagnostics
//! - **retry**: retries infrastructure failures on a fixed delay schedule
//! - **template**: slash-command requests with per-run artifact paths

pub mod outcome;
pub mod process;
pub mod retry;
pub mod stream;
pub mod template;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use todone_core::{AgentInvocationResult, ModelTier, RunId};

pub use outcome::{classify, truncate_output, ProcessExit};
pub use process::ClaudeCli;
pub use retry::{invoke_with_retry, RetryPolicy};
pub use stream::{materialize, Transcript};
pub use template::{TemplateExecutor, TemplateRequest};

/// Everything needed to launch one agent attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    pub prompt: String,
    pub run_id: RunId,
    pub agent_name: String,
    pub model: ModelTier,
    /// Line-delimited JSON stream destination
    pub output_file: PathBuf,
    pub working_dir: Option<PathBuf>,
    /// Run without interactive permission prompts
    pub skip_permissions: bool,
}

impl AgentRequest {
    /// The slash command this prompt starts with, if any
    pub fn slash_command(&self) -> Option<&str> {
        let first = self.prompt.split_whitespace().next()?;
        (first.len() > 1 && first.starts_with('/')).then_some(first)
    }
}

/// Runs one attempt of an agent request
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn invoke(&self, request: &AgentRequest) -> AgentInvocationResult;
}

#[async_trait]
impl<T: AgentRunner + ?Sized> AgentRunner for Arc<T> {
    async fn invoke(&self, request: &AgentRequest) -> AgentInvocationResult {
        (**self).invoke(request).await
    }
}
