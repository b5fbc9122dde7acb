//! CLI argument definitions shared by the workflow executables.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use todone_core::{ModelTier, RunId};

use crate::workspace::validate_workspace_name;

/// Run one task through a workflow pipeline
///
/// Normally launched by the scheduler, which has already created the
/// workspace and marked the task in progress. The final phase writes the
/// terminal task status back to the task list.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Args {
    /// Run identifier assigned by the scheduler
    #[arg(long, value_name = "ID")]
    pub run_id: RunId,

    /// Workspace (worktree) the task runs in
    #[arg(long, value_name = "NAME")]
    pub workspace_name: String,

    /// Task description, verbatim from the task list
    #[arg(long, value_name = "TEXT")]
    pub task: String,

    /// Agent model: sonnet or opus
    #[arg(long, value_name = "MODEL")]
    pub model: ModelTier,

    /// Directory holding the worktrees, relative to the project root
    #[arg(long, value_name = "PATH", default_value = "trees")]
    pub worktree_base: PathBuf,

    /// Sub-directory of the worktree the agents work in
    #[arg(long, value_name = "PATH")]
    pub target_dir: Option<String>,

    /// Branch new worktrees start from
    #[arg(long, value_name = "BRANCH", default_value = "main")]
    pub base_branch: String,

    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "PATH")]
    pub project_root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.run_id.as_str().trim().is_empty() {
            anyhow::bail!("--run-id must not be empty");
        }
        if self.task.trim().is_empty() {
            anyhow::bail!("--task must not be empty");
        }
        validate_workspace_name(&self.workspace_name)?;
        Ok(())
    }
}
