use clap::Parser;
use std::process::ExitCode;
use tracing::error;

use todone::agent::{ClaudeCli, TemplateExecutor};
use todone::artifacts::ArtifactLayout;
use todone::board::AgentTaskBoard;
use todone::config::check_required_env;
use todone::logging::init_logging;
use todone::scheduler::{Args, ProcessLauncher, Scheduler, SchedulerConfig};
use todone::workspace::GitWorktrees;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, None) {
        eprintln!("Warning: {e:#}");
    }

    if let Err(e) = check_required_env() {
        error!("{e}");
        return ExitCode::from(1);
    }

    let launcher = match ProcessLauncher::discover(args.launch_settings()) {
        Ok(launcher) => launcher,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let project_root = args.project_root();
    let config = SchedulerConfig::from(&args);
    let board = AgentTaskBoard::new(
        &config.task_file,
        &project_root,
        TemplateExecutor::new(ClaudeCli::from_env(), ArtifactLayout::new(&project_root)),
    );
    let workspaces = GitWorktrees::new(&project_root, &args.worktree_base)
        .with_base_branch(&args.base_branch)
        .with_target_dir(args.target_dir.clone());

    let mut scheduler = Scheduler::new(config, board, workspaces, launcher);
    let stats = scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    println!("\n{stats}");
    ExitCode::SUCCESS
}
