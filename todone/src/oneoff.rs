//! Shared plumbing of the ad hoc `todone-prompt` and `todone-slash` binaries.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use todone_core::{AgentInvocationResult, ModelTier, RetryClassification, RunId};

use crate::agent::truncate_output;
use crate::artifacts::{write_json, ArtifactLayout};

const CONSOLE_EXCERPT_LIMIT: usize = 2000;

/// Summary written next to the raw stream of an ad hoc run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneOffSummary {
    pub run_id: RunId,
    pub prompt: String,
    pub model: ModelTier,
    pub working_dir: PathBuf,
    pub success: bool,
    pub session_id: Option<String>,
    pub retry_code: RetryClassification,
    pub output: String,
}

impl OneOffSummary {
    pub fn new(
        run_id: RunId,
        prompt: impl Into<String>,
        model: ModelTier,
        working_dir: impl Into<PathBuf>,
        result: &AgentInvocationResult,
    ) -> Self {
        Self {
            run_id,
            prompt: prompt.into(),
            model,
            working_dir: working_dir.into(),
            success: result.success,
            session_id: result.session_id.clone(),
            retry_code: result.retry_classification,
            output: result.output.clone(),
        }
    }
}

/// Write the summary and report the run on stdout.
///
/// Exit 0 on success, 1 when the agent failed, 2 when the summary could not
/// be written.
pub fn finish(layout: &ArtifactLayout, agent_name: &str, summary: &OneOffSummary) -> ExitCode {
    match write_summary(layout, agent_name, summary) {
        Ok(path) => info!(path = %path.display(), "Wrote summary"),
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(2);
        }
    }

    let excerpt = truncate_output(&summary.output, CONSOLE_EXCERPT_LIMIT);
    if summary.success {
        println!("{excerpt}");
        ExitCode::SUCCESS
    } else {
        eprintln!("Agent run {} failed ({:?}): {excerpt}", summary.run_id, summary.retry_code);
        ExitCode::from(1)
    }
}

fn write_summary(layout: &ArtifactLayout, agent_name: &str, summary: &OneOffSummary) -> Result<PathBuf> {
    let path = layout.phase_summary(&summary.run_id, agent_name);
    write_json(&path, summary)?;
    Ok(path)
}

/// Working directory for an ad hoc run: the flag, else the current directory
pub fn working_dir_or_current(working_dir: Option<&Path>) -> PathBuf {
    working_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(crate::config::current_dir_or_dot)
}
