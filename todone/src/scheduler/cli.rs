//! CLI argument definitions for the scheduler.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use super::{LaunchSettings, SchedulerConfig};
use crate::config::resolve_project_root;

/// Poll a task list and delegate eligible tasks to workflow executors
///
/// Each tick asks the agent which tasks are ready, makes sure each group has
/// its own git worktree, marks the tasks in progress and launches a detached
/// plan-implement-update or build-update run for each of them.
#[derive(Parser, Debug, Clone)]
#[command(name = "todone", version)]
pub struct Args {
    /// Seconds between checks
    #[arg(long, value_name = "SECS", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Task list, relative to the project root
    #[arg(long, value_name = "PATH", default_value = "tasks.md")]
    pub task_file: PathBuf,

    /// Log what would happen without creating workspaces, marking tasks or launching runs
    #[arg(long)]
    pub dry_run: bool,

    /// Maximum number of runs in flight
    #[arg(long, value_name = "N", default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_tasks: u64,

    /// Check once and exit
    #[arg(long)]
    pub once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory holding the worktrees, relative to the project root
    #[arg(long, value_name = "PATH", default_value = "trees")]
    pub worktree_base: PathBuf,

    /// Sub-directory of each worktree the agents work in
    #[arg(long, value_name = "PATH")]
    pub target_dir: Option<String>,

    /// Branch new worktrees start from
    #[arg(long, value_name = "BRANCH", default_value = "main")]
    pub base_branch: String,

    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "PATH")]
    pub project_root: Option<PathBuf>,
}

impl Args {
    pub fn project_root(&self) -> PathBuf {
        resolve_project_root(self.project_root.as_deref())
    }

    /// The task list as an absolute path under the project root
    pub fn task_file_path(&self) -> PathBuf {
        self.project_root().join(&self.task_file)
    }

    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            project_root: self.project_root(),
            worktree_base: self.worktree_base.clone(),
            target_dir: self.target_dir.clone(),
            base_branch: self.base_branch.clone(),
            verbose: self.verbose,
        }
    }
}

impl From<&Args> for SchedulerConfig {
    fn from(args: &Args) -> Self {
        SchedulerConfig {
            polling_interval: Duration::from_secs(args.interval),
            task_file: args.task_file_path(),
            dry_run: args.dry_run,
            max_concurrent_tasks: usize::try_from(args.max_tasks).unwrap_or(usize::MAX),
            once: args.once,
        }
    }
}
