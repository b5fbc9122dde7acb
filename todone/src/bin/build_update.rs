use clap::Parser;
use std::process::ExitCode;

use todone::workflow::{run_workflow, Args};
use todone_core::WorkflowKind;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    run_workflow(WorkflowKind::BuildUpdate, Args::parse()).await
}
