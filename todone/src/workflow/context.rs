use std::path::PathBuf;
use tracing::Span;

use todone_core::{ModelTier, RunId, WorkflowKind};

use crate::artifacts::ArtifactLayout;
use crate::config::resolve_project_root;
use crate::workflow::cli::Args;

/// Workflow configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub run_id: RunId,
    pub workspace_name: String,
    pub task: String,
    pub model: ModelTier,

    /// Project root; the task list, `agents/` and the worktrees live here
    pub project_root: PathBuf,

    /// Directory holding the worktrees, relative to the project root
    pub worktree_base: PathBuf,

    pub target_dir: Option<String>,
    pub base_branch: String,
    pub verbose: bool,
}

impl From<Args> for WorkflowConfig {
    fn from(args: Args) -> Self {
        let project_root = resolve_project_root(args.project_root.as_deref());

        WorkflowConfig {
            run_id: args.run_id,
            workspace_name: args.workspace_name,
            task: args.task,
            model: args.model,
            project_root,
            worktree_base: args.worktree_base,
            target_dir: args.target_dir,
            base_branch: args.base_branch,
            verbose: args.verbose,
        }
    }
}

/// Everything the phases of one run share
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub workflow: WorkflowKind,
    pub workspace_name: String,
    pub task: String,
    pub model: ModelTier,
    pub project_root: PathBuf,
    /// Where the plan/implement/build phases run
    pub workspace_dir: PathBuf,
    pub layout: ArtifactLayout,
    pub span: Span,
}

impl RunContext {
    pub fn new(workflow: WorkflowKind, config: &WorkflowConfig, workspace_dir: PathBuf) -> Self {
        let span = tracing::info_span!(
            "run",
            run_id = %config.run_id,
            workflow = workflow.name(),
            workspace = %config.workspace_name,
        );
        Self {
            run_id: config.run_id.clone(),
            workflow,
            workspace_name: config.workspace_name.clone(),
            task: config.task.clone(),
            model: config.model,
            project_root: config.project_root.clone(),
            workspace_dir,
            layout: ArtifactLayout::new(&config.project_root),
            span,
        }
    }
}
