//! Agent CLI subprocess supervision.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use todone_core::{AgentInvocationResult, RetryClassification};

use super::outcome::{classify, ProcessExit};
use super::stream::{materialize, Transcript};
use super::{AgentRequest, AgentRunner};
use crate::artifacts::PROMPTS_DIR;
use crate::config::AgentSettings;

const MCP_CONFIG_FILE: &str = ".mcp.json";

#[derive(Debug, Error)]
enum AttemptError {
    #[error("Failed to launch agent: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Agent I/O error: {0}")]
    Io(#[source] std::io::Error),

    #[error("Agent timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
}

/// Runs the agent CLI as a child process, streaming stdout to the request's
/// output file.
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    settings: AgentSettings,
}

impl ClaudeCli {
    pub fn new(settings: AgentSettings) -> Self {
        Self { settings }
    }

    pub fn from_env() -> Self {
        Self::new(AgentSettings::from_env())
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn is_installed(&self) -> bool {
        which::which(&self.settings.agent_path).is_ok()
    }

    /// Command line for one attempt, without stdio wiring
    pub fn build_command(&self, request: &AgentRequest) -> Command {
        let mut cmd = Command::new(&self.settings.agent_path);
        cmd.arg("-p")
            .arg(&request.prompt)
            .arg("--model")
            .arg(request.model.model_id())
            .args(["--output-format", "stream-json", "--verbose"]);

        if let Some(dir) = &request.working_dir {
            let mcp_config = dir.join(MCP_CONFIG_FILE);
            if mcp_config.is_file() {
                cmd.arg("--mcp-config").arg(mcp_config);
            }
        }

        if request.skip_permissions {
            cmd.arg("--dangerously-skip-permissions");
        }

        let pwd = request
            .working_dir
            .clone()
            .unwrap_or_else(crate::config::current_dir_or_dot);
        cmd.env_clear()
            .envs(self.settings.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env("PWD", &pwd);
        if let Some(dir) = &request.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    async fn attempt(&self, request: &AgentRequest) -> Result<AgentInvocationResult, AttemptError> {
        if let Some(parent) = request.output_file.parent() {
            std::fs::create_dir_all(parent).map_err(AttemptError::Io)?;
        }
        if let Some(command) = request.slash_command() {
            save_prompt(request, command).map_err(AttemptError::Io)?;
        }

        let stdout = std::fs::File::create(&request.output_file).map_err(AttemptError::Io)?;
        let mut cmd = self.build_command(request);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            agent = %request.agent_name,
            model = %request.model,
            output = %request.output_file.display(),
            "Launching agent"
        );
        let child = cmd.spawn().map_err(AttemptError::Spawn)?;

        let output = match tokio::time::timeout(self.settings.timeout, child.wait_with_output()).await
        {
            Ok(result) => result.map_err(AttemptError::Io)?,
            Err(_) => return Err(AttemptError::Timeout(self.settings.timeout)),
        };

        let transcript = Transcript::read(&request.output_file)
            .await
            .map_err(AttemptError::Io)?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(classify(&transcript, ProcessExit::from(output.status), &stderr))
    }
}

#[async_trait]
impl AgentRunner for ClaudeCli {
    async fn invoke(&self, request: &AgentRequest) -> AgentInvocationResult {
        if !self.is_installed() {
            return AgentInvocationResult::failed(
                RetryClassification::None,
                format!(
                    "Agent CLI is not installed: '{}' was not found",
                    self.settings.agent_path
                ),
            );
        }

        let result = match self.attempt(request).await {
            Ok(result) => result,
            Err(e @ AttemptError::Timeout(_)) => {
                warn!(agent = %request.agent_name, "{e}");
                AgentInvocationResult::failed(RetryClassification::Timeout, e.to_string())
            }
            Err(e) => {
                warn!(agent = %request.agent_name, "{e}");
                AgentInvocationResult::failed(RetryClassification::ExecutionError, e.to_string())
            }
        };

        if request.output_file.exists() {
            if let Err(e) = materialize(&request.output_file) {
                warn!(agent = %request.agent_name, "Failed to materialize agent output: {e:#}");
            }
        }

        result
    }
}

/// Save a slash-command prompt as `<agent dir>/prompts/<command>.txt`
fn save_prompt(request: &AgentRequest, command: &str) -> std::io::Result<PathBuf> {
    let dir = request
        .output_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(PROMPTS_DIR);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.txt", command.trim_start_matches('/')));
    std::fs::write(&path, &request.prompt)?;
    Ok(path)
}
