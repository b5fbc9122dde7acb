//! On-disk layout of run artifacts.
//!
//! ```text
//! agents/<run_id>/
//!     workflow_state.json
//!     workflow_summary.json
//!     <workflow>/execution.log
//!     <agent_name>/
//!         cc_raw_output.jsonl
//!         cc_raw_output.json
//!         cc_final_object.json
//!         custom_summary_output.json
//!         prompts/<command>.txt
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use todone_core::RunId;

pub const AGENTS_DIR: &str = "agents";
pub const RAW_OUTPUT_JSONL: &str = "cc_raw_output.jsonl";
pub const RAW_OUTPUT_JSON: &str = "cc_raw_output.json";
pub const FINAL_OBJECT_JSON: &str = "cc_final_object.json";
pub const SUMMARY_JSON: &str = "custom_summary_output.json";
pub const WORKFLOW_SUMMARY_JSON: &str = "workflow_summary.json";
pub const WORKFLOW_STATE_JSON: &str = "workflow_state.json";
pub const EXECUTION_LOG: &str = "execution.log";
pub const PROMPTS_DIR: &str = "prompts";

#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    /// Layout rooted at `<project_root>/agents`
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root: project_root.as_ref().join(AGENTS_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.root.join(run_id.as_str())
    }

    pub fn agent_dir(&self, run_id: &RunId, agent_name: &str) -> PathBuf {
        self.run_dir(run_id).join(agent_name)
    }

    pub fn raw_output(&self, run_id: &RunId, agent_name: &str) -> PathBuf {
        self.agent_dir(run_id, agent_name).join(RAW_OUTPUT_JSONL)
    }

    pub fn phase_summary(&self, run_id: &RunId, agent_name: &str) -> PathBuf {
        self.agent_dir(run_id, agent_name).join(SUMMARY_JSON)
    }

    /// Raw stream, JSON array and final object of one agent
    pub fn agent_outputs(&self, run_id: &RunId, agent_name: &str) -> Vec<PathBuf> {
        let dir = self.agent_dir(run_id, agent_name);
        vec![
            dir.join(RAW_OUTPUT_JSONL),
            dir.join(RAW_OUTPUT_JSON),
            dir.join(FINAL_OBJECT_JSON),
        ]
    }

    pub fn workflow_summary(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(WORKFLOW_SUMMARY_JSON)
    }

    pub fn workflow_state(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(WORKFLOW_STATE_JSON)
    }

    pub fn execution_log(&self, run_id: &RunId, component: &str) -> PathBuf {
        self.run_dir(run_id).join(component).join(EXECUTION_LOG)
    }
}

/// Write `value` as pretty JSON, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
