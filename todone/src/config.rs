//! Environment-driven agent settings.
//!
//! `.env` is loaded by each binary before anything here runs, so values
//! from the file and the real environment are treated the same.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const AGENT_PATH_ENV: &str = "CLAUDE_CODE_PATH";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const AGENT_TIMEOUT_ENV: &str = "TODONE_AGENT_TIMEOUT_SECS";

pub const DEFAULT_AGENT_PATH: &str = "claude";
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Variables that must be set before any agent is launched
pub const REQUIRED_ENV_VARS: &[&str] = &[API_KEY_ENV];

/// Variables copied from our environment into the agent's
const PASSTHROUGH_ENV_VARS: &[&str] = &[
    API_KEY_ENV,
    "HOME",
    "USER",
    "PATH",
    "SHELL",
    "TERM",
    "LANG",
    "LC_ALL",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required environment variables: {}", .0.join(", "))]
pub struct MissingEnvError(pub Vec<String>);

/// Fail when any of [`REQUIRED_ENV_VARS`] is unset or empty
pub fn check_required_env() -> Result<(), MissingEnvError> {
    let missing: Vec<String> = REQUIRED_ENV_VARS
        .iter()
        .filter(|var| std::env::var(var).map(|v| v.is_empty()).unwrap_or(true))
        .map(|var| var.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingEnvError(missing))
    }
}

/// How the agent CLI is located, bounded and sandboxed
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Executable name (resolved on PATH) or path of the agent CLI
    pub agent_path: String,

    /// Upper bound on a single invocation
    pub timeout: Duration,

    /// Complete environment handed to the agent process
    pub env: Vec<(String, String)>,
}

impl AgentSettings {
    pub fn from_env() -> Self {
        let agent_path = std::env::var(AGENT_PATH_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_AGENT_PATH.to_string());

        let timeout = std::env::var(AGENT_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_AGENT_TIMEOUT);

        Self {
            env: safe_subprocess_env(&agent_path),
            agent_path,
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_agent_path(mut self, agent_path: impl Into<String>) -> Self {
        self.agent_path = agent_path.into();
        self
    }
}

/// Environment for agent subprocesses: an allow-list of our own variables
/// plus the settings the agent CLI expects.
pub fn safe_subprocess_env(agent_path: &str) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = PASSTHROUGH_ENV_VARS
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
        .collect();

    env.push((AGENT_PATH_ENV.to_string(), agent_path.to_string()));
    env.push((
        "CLAUDE_BASH_MAINTAIN_PROJECT_WORKING_DIR".to_string(),
        "true".to_string(),
    ));
    env
}

/// Current directory, falling back to `.`
pub fn current_dir_or_dot() -> std::path::PathBuf {
    std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf())
}

/// Absolute project root: `root` resolved against the current directory,
/// or the current directory itself when unset
pub fn resolve_project_root(root: Option<&Path>) -> std::path::PathBuf {
    match root {
        Some(root) if root.is_absolute() => root.to_path_buf(),
        Some(root) => std::path::absolute(root).unwrap_or_else(|_| current_dir_or_dot().join(root)),
        None => current_dir_or_dot(),
    }
}
