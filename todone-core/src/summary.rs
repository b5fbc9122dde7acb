//! Per-phase and per-run records persisted under `agents/<run_id>/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::intake::{ModelTier, WorkflowKind};
use crate::run::RunId;
use crate::task::TaskStatus;

/// Outcome of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Summary written for every phase, including skipped ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: String,
    pub run_id: RunId,
    pub workspace_name: String,
    pub task: String,
    pub command: String,
    pub args: Vec<String>,
    pub model: ModelTier,
    pub working_dir: PathBuf,
    pub status: PhaseStatus,
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifact_paths: Vec<PathBuf>,
    /// Phase-specific fields such as `plan_path` or `commit_hash`
    #[serde(flatten)]
    pub extras: Map<String, Value>,
    pub recorded_at: DateTime<Utc>,
}

impl PhaseSummary {
    pub fn is_skipped(&self) -> bool {
        self.status == PhaseStatus::Skipped
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extras.insert(key.to_string(), value.into());
        self
    }
}

/// Terminal status handed to the update phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalTaskStatus {
    Success,
    Failed,
}

impl FinalTaskStatus {
    /// Success needs every upstream phase to have succeeded and a commit
    pub fn decide(upstream_succeeded: bool, commit_ref: Option<&str>) -> Self {
        match commit_ref {
            Some(c) if upstream_succeeded && !c.trim().is_empty() => FinalTaskStatus::Success,
            _ => FinalTaskStatus::Failed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FinalTaskStatus::Success => "success",
            FinalTaskStatus::Failed => "failed",
        }
    }
}

impl From<FinalTaskStatus> for TaskStatus {
    fn from(status: FinalTaskStatus) -> Self {
        match status {
            FinalTaskStatus::Success => TaskStatus::Succeeded,
            FinalTaskStatus::Failed => TaskStatus::Failed,
        }
    }
}

impl fmt::Display for FinalTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run currently is, persisted at every phase boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Planning,
    Implementing,
    Building,
    Updating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub run_id: RunId,
    #[serde(rename = "workflow_name")]
    pub workflow: WorkflowKind,
    pub workspace_name: String,
    pub task: String,
    pub stage: WorkflowStage,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub plan_path: Option<String>,
    #[serde(default)]
    pub commit_ref: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkflowState {
    pub fn new(
        run_id: RunId,
        workflow: WorkflowKind,
        workspace_name: impl Into<String>,
        task: impl Into<String>,
        stage: WorkflowStage,
    ) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            workflow,
            workspace_name: workspace_name.into(),
            task: task.into(),
            stage,
            started_at: now,
            updated_at: now,
            completed_at: None,
            plan_path: None,
            commit_ref: None,
            error: None,
        }
    }

    pub fn advance(&mut self, stage: WorkflowStage) {
        self.stage = stage;
        self.updated_at = Utc::now();
        if matches!(stage, WorkflowStage::Completed | WorkflowStage::Failed) {
            self.completed_at = Some(self.updated_at);
        }
    }
}

/// Final record of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    #[serde(rename = "workflow_name")]
    pub workflow: WorkflowKind,
    pub run_id: RunId,
    pub workspace_name: String,
    pub task: String,
    pub model: ModelTier,
    pub working_dir: PathBuf,
    #[serde(default)]
    pub plan_path: Option<String>,
    #[serde(default)]
    pub commit_ref: Option<String>,
    pub phases: BTreeMap<String, PhaseSummary>,
    pub overall_success: bool,
    pub final_task_status: FinalTaskStatus,
    #[serde(default)]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl WorkflowSummary {
    pub fn phase(&self, name: &str) -> Option<&PhaseSummary> {
        self.phases.get(name)
    }

    /// Task succeeded and the status was written back
    pub fn is_clean_success(&self) -> bool {
        self.final_task_status == FinalTaskStatus::Success
            && self.phase("update").is_some_and(|p| p.success)
    }
}
