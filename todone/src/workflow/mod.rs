//! Workflow executor: drives one task through a pipeline of agent phases.
//!
//! Pipelines:
//! - **plan → implement → update** for tasks tagged `plan_implement_update`
//! - **build → update** for everything else
//!
//! Module structure:
//! - `cli.rs`: command-line arguments shared by both executables
//! - `context.rs`: configuration and the per-run context
//! - `phase.rs`: phase names, commands and agent names
//! - `plan_path.rs`: plan file extraction from the plan phase output
//! - `executor.rs`: phase sequencing and summaries

pub mod cli;
pub mod context;
pub mod executor;
pub mod phase;
pub mod plan_path;

pub use cli::Args;
pub use context::{RunContext, WorkflowConfig};
pub use executor::WorkflowExecutor;
pub use phase::Phase;
pub use plan_path::extract_plan_path;

use anyhow::Result;
use std::process::ExitCode;
use tracing::error;

use todone_core::{WorkflowKind, WorkflowSummary};

use crate::agent::{ClaudeCli, TemplateExecutor};
use crate::artifacts::ArtifactLayout;
use crate::config::check_required_env;
use crate::logging::init_logging;
use crate::workspace::{GitCommits, GitWorktrees, WorkspaceProvisioner};

/// Exit code for a finished (or aborted) run.
///
/// 0: task succeeded and its status was written back; 1: the run recorded a
/// failure; 2: the run could not complete.
pub fn exit_code(result: &Result<WorkflowSummary>) -> ExitCode {
    match result {
        Ok(summary) if summary.is_clean_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(_) => ExitCode::from(2),
    }
}

/// Entry point of the workflow executables
pub async fn run_workflow(kind: WorkflowKind, args: Args) -> ExitCode {
    if let Err(e) = args.validate() {
        eprintln!("Error: {e:#}");
        return ExitCode::from(2);
    }

    let config = WorkflowConfig::from(args);
    let layout = ArtifactLayout::new(&config.project_root);
    let log_file = layout.execution_log(&config.run_id, kind.name());
    if let Err(e) = init_logging(config.verbose, Some(&log_file)) {
        eprintln!("Warning: {e:#}");
    }

    if let Err(e) = check_required_env() {
        error!("{e}");
        return ExitCode::from(1);
    }

    let workspaces = GitWorktrees::new(&config.project_root, &config.worktree_base)
        .with_base_branch(&config.base_branch)
        .with_target_dir(config.target_dir.clone());
    let workspace_dir = match workspaces.ensure(&config.workspace_name) {
        Ok(dir) => dir,
        Err(e) => {
            error!(workspace = %config.workspace_name, "Failed to create workspace: {e}");
            return ExitCode::from(1);
        }
    };

    let ctx = RunContext::new(kind, &config, workspace_dir);
    let agent = TemplateExecutor::new(ClaudeCli::from_env(), layout);
    let result = WorkflowExecutor::new(ctx, agent, GitCommits).run().await;
    if let Err(e) = &result {
        error!("Workflow aborted: {e:#}");
    }
    exit_code(&result)
}
