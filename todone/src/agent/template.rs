//! Slash-command execution with per-run artifact paths.

use std::path::PathBuf;

use todone_core::{AgentInvocationResult, ModelTier, RunId};

use super::retry::{invoke_with_retry, RetryPolicy};
use super::{AgentRequest, AgentRunner};
use crate::artifacts::ArtifactLayout;

/// A slash command with positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRequest {
    pub agent_name: String,
    pub slash_command: String,
    pub args: Vec<String>,
    pub run_id: RunId,
    pub model: ModelTier,
    pub working_dir: Option<PathBuf>,
}

impl TemplateRequest {
    pub fn new(
        agent_name: impl Into<String>,
        slash_command: impl Into<String>,
        args: Vec<String>,
        run_id: RunId,
        model: ModelTier,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            slash_command: slash_command.into(),
            args,
            run_id,
            model,
            working_dir: None,
        }
    }

    pub fn in_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    /// `"<command> <arg> <arg> ..."`
    pub fn prompt(&self) -> String {
        std::iter::once(self.slash_command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs template requests through the retry engine
pub struct TemplateExecutor<R> {
    runner: R,
    layout: ArtifactLayout,
    policy: RetryPolicy,
}

impl<R: AgentRunner> TemplateExecutor<R> {
    pub fn new(runner: R, layout: ArtifactLayout) -> Self {
        Self {
            runner,
            layout,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Agent request for a template; output lands in the agent's run directory
    pub fn request_for(&self, template: &TemplateRequest) -> AgentRequest {
        AgentRequest {
            prompt: template.prompt(),
            run_id: template.run_id.clone(),
            agent_name: template.agent_name.clone(),
            model: template.model,
            output_file: self
                .layout
                .raw_output(&template.run_id, &template.agent_name),
            working_dir: template.working_dir.clone(),
            skip_permissions: true,
        }
    }

    pub async fn execute(&self, template: &TemplateRequest) -> AgentInvocationResult {
        let request = self.request_for(template);
        invoke_with_retry(&self.runner, &request, &self.policy).await
    }
}
