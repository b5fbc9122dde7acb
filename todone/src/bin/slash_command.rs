use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use todone::agent::{ClaudeCli, TemplateExecutor, TemplateRequest};
use todone::artifacts::ArtifactLayout;
use todone::config::check_required_env;
use todone::logging::init_logging;
use todone::oneoff::{finish, working_dir_or_current, OneOffSummary};
use todone_core::{ModelTier, RunId};

/// Run a slash command with arguments through template execution
#[derive(Parser, Debug)]
#[command(name = "todone-slash", version)]
struct Args {
    /// Slash command, e.g. /plan
    command: String,

    /// Positional arguments passed to the command
    args: Vec<String>,

    /// Agent model: sonnet or opus
    #[arg(short, long, default_value = "sonnet")]
    model: ModelTier,

    /// Directory the agent runs in (defaults to the current directory)
    #[arg(long, value_name = "PATH")]
    working_dir: Option<PathBuf>,

    /// Name of the agent's artifact directory
    #[arg(long, default_value = "executor")]
    agent_name: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, None) {
        eprintln!("Warning: {e:#}");
    }
    if !args.command.starts_with('/') || args.command.len() < 2 {
        error!("Slash command must start with '/': {}", args.command);
        return ExitCode::from(2);
    }
    if let Err(e) = check_required_env() {
        error!("{e}");
        return ExitCode::from(2);
    }

    let run_id = RunId::generate();
    let working_dir = working_dir_or_current(args.working_dir.as_deref());
    let layout = ArtifactLayout::new(&working_dir);

    let template = TemplateRequest::new(
        &args.agent_name,
        &args.command,
        args.args,
        run_id.clone(),
        args.model,
    )
    .in_dir(&working_dir);
    let prompt = template.prompt();

    info!(run_id = %run_id, command = %args.command, "Running slash command");
    let executor = TemplateExecutor::new(ClaudeCli::from_env(), layout.clone());
    let result = executor.execute(&template).await;

    let summary = OneOffSummary::new(run_id, prompt, args.model, working_dir, &result);
    finish(&layout, &args.agent_name, &summary)
}
