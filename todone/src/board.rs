//! Task-list collaborator.
//!
//! The task document is never parsed here. Reading eligible work and marking
//! tasks in progress are delegated to the agent through slash commands; the
//! only local inspection is a cheap check for pending markers.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, warn};

use todone_core::{ModelTier, RunId, WorkspaceTaskGroup};

use crate::agent::{AgentRunner, TemplateExecutor, TemplateRequest};
use crate::json::parse_json;

static PENDING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*\]|\[⏰\]").expect("pending marker pattern is valid")
});

/// Source of ready work and sink of in-progress transitions
#[async_trait]
pub trait TaskBoard: Send + Sync {
    /// Groups with tasks ready to start, in document order
    async fn eligible_groups(&self) -> Result<Vec<WorkspaceTaskGroup>>;

    /// Move a task to in-progress, tagging it with the run that owns it
    async fn mark_in_progress(&self, workspace: &str, task: &str, run_id: &RunId) -> Result<()>;
}

/// Whether the document contains any not-started or blocked marker
pub fn has_pending_tasks(document: &str) -> bool {
    PENDING_MARKER.is_match(document)
}

/// Parse the eligibility answer of the agent
pub fn parse_eligible_groups(output: &str) -> Result<Vec<WorkspaceTaskGroup>> {
    let groups: Vec<WorkspaceTaskGroup> =
        parse_json(output).context("Failed to parse eligible task groups")?;
    Ok(groups)
}

/// Task board backed by agent slash commands over a markdown task file
pub struct AgentTaskBoard<R> {
    task_file: PathBuf,
    project_root: PathBuf,
    agent: TemplateExecutor<R>,
}

impl<R: AgentRunner> AgentTaskBoard<R> {
    pub fn new(
        task_file: impl Into<PathBuf>,
        project_root: impl Into<PathBuf>,
        agent: TemplateExecutor<R>,
    ) -> Self {
        Self {
            task_file: task_file.into(),
            project_root: project_root.into(),
            agent,
        }
    }

    /// `Some(false)` when the document exists and has nothing pending
    fn precheck(&self) -> Option<bool> {
        match std::fs::read_to_string(&self.task_file) {
            Ok(document) => Some(has_pending_tasks(&document)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(false),
            Err(e) => {
                warn!(file = %self.task_file.display(), "Could not pre-check task file: {e}");
                None
            }
        }
    }

    fn template(&self, agent_name: &str, command: &str, args: Vec<String>) -> TemplateRequest {
        TemplateRequest::new(agent_name, command, args, RunId::generate(), ModelTier::Fast)
            .in_dir(&self.project_root)
    }
}

#[async_trait]
impl<R: AgentRunner> TaskBoard for AgentTaskBoard<R> {
    async fn eligible_groups(&self) -> Result<Vec<WorkspaceTaskGroup>> {
        if self.precheck() == Some(false) {
            debug!(file = %self.task_file.display(), "No pending markers in task file");
            return Ok(Vec::new());
        }

        let request = self.template("task-processor", "/process_tasks", Vec::new());
        let response = self.agent.execute(&request).await;
        if !response.success {
            bail!("Failed to get eligible tasks: {}", response.output);
        }
        parse_eligible_groups(&response.output)
    }

    async fn mark_in_progress(&self, workspace: &str, task: &str, run_id: &RunId) -> Result<()> {
        let args = vec![
            self.task_file.to_string_lossy().into_owned(),
            workspace.to_string(),
            task.to_string(),
            run_id.to_string(),
        ];
        let request = self.template("task-marker", "/mark_in_progress", args);
        let response = self.agent.execute(&request).await;
        if !response.success {
            bail!("Failed to mark task as in progress: {}", response.output);
        }
        Ok(())
    }
}
