use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use todone::agent::{invoke_with_retry, AgentRequest, ClaudeCli, RetryPolicy};
use todone::artifacts::ArtifactLayout;
use todone::config::check_required_env;
use todone::logging::init_logging;
use todone::oneoff::{finish, working_dir_or_current, OneOffSummary};
use todone_core::{ModelTier, RunId};

/// Run an ad hoc prompt through the agent CLI
///
/// The raw stream, its JSON array and final object, and a summary are written
/// under agents/<run_id>/<agent_name>/.
#[derive(Parser, Debug)]
#[command(name = "todone-prompt", version)]
struct Args {
    /// Prompt text
    prompt: String,

    /// Agent model: sonnet or opus
    #[arg(short, long, default_value = "sonnet")]
    model: ModelTier,

    /// Where to write the raw line-delimited stream
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Directory the agent runs in (defaults to the current directory)
    #[arg(long, value_name = "PATH")]
    working_dir: Option<PathBuf>,

    /// Make a single attempt
    #[arg(long)]
    no_retry: bool,

    /// Name of the agent's artifact directory
    #[arg(long, default_value = "oneoff")]
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
    if let Err(e) = check_required_env() {
        error!("{e}");
        return ExitCode::from(2);
    }

    let run_id = RunId::generate();
    let working_dir = working_dir_or_current(args.working_dir.as_deref());
    let layout = ArtifactLayout::new(&working_dir);
    let output_file = args
        .output
        .clone()
        .unwrap_or_else(|| layout.raw_output(&run_id, &args.agent_name));

    let request = AgentRequest {
        prompt: args.prompt.clone(),
        run_id: run_id.clone(),
        agent_name: args.agent_name.clone(),
        model: args.model,
        output_file,
        working_dir: Some(working_dir.clone()),
        skip_permissions: true,
    };
    let policy = if args.no_retry {
        RetryPolicy::none()
    } else {
        RetryPolicy::default()
    };

    info!(run_id = %run_id, model = %args.model, "Running prompt");
    let result = invoke_with_retry(&ClaudeCli::from_env(), &request, &policy).await;

    let summary = OneOffSummary::new(run_id, args.prompt, args.model, working_dir, &result);
    finish(&layout, &args.agent_name, &summary)
}
