//! Tag resolution for tasks taken from the task board.
//!
//! Tags are free text on the task line. They are resolved exactly once, when
//! a task is picked up, into a [`TaskIntake`] that decides which pipeline runs
//! and which model tier it uses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Tag selecting the plan → implement → update pipeline
pub const PLAN_IMPLEMENT_UPDATE_TAG: &str = "plan_implement_update";
/// Older spelling of [`PLAN_IMPLEMENT_UPDATE_TAG`], still found in task lists
pub const LEGACY_PLAN_IMPLEMENT_UPDATE_TAG: &str = "adw_plan_implement_update_task";
pub const CAPABLE_MODEL_TAG: &str = "opus";
pub const FAST_MODEL_TAG: &str = "sonnet";

/// Which pipeline a task runs through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    PlanImplementUpdate,
    BuildUpdate,
}

impl WorkflowKind {
    /// Name used in summaries and log directories
    pub fn name(self) -> &'static str {
        match self {
            WorkflowKind::PlanImplementUpdate => "plan_implement_update",
            WorkflowKind::BuildUpdate => "build_update",
        }
    }

    /// Executable that runs this pipeline
    pub fn binary_name(self) -> &'static str {
        match self {
            WorkflowKind::PlanImplementUpdate => "plan-implement-update",
            WorkflowKind::BuildUpdate => "build-update",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Agent model tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelTier {
    #[default]
    #[serde(rename = "sonnet")]
    Fast,
    #[serde(rename = "opus")]
    Capable,
}

impl ModelTier {
    /// Identifier passed to the agent CLI `--model` flag
    pub fn model_id(self) -> &'static str {
        match self {
            ModelTier::Fast => "sonnet",
            ModelTier::Capable => "opus",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.model_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown model '{0}', expected 'sonnet' or 'opus'")]
pub struct ParseModelTierError(String);

impl FromStr for ModelTier {
    type Err = ParseModelTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sonnet" | "fast" => Ok(ModelTier::Fast),
            "opus" | "capable" => Ok(ModelTier::Capable),
            other => Err(ParseModelTierError(other.to_string())),
        }
    }
}

/// Resolved dispatch decision for one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIntake {
    pub workflow: WorkflowKind,
    pub model: ModelTier,
}

impl TaskIntake {
    /// Resolve tags. `opus` beats `sonnet`, which is also the default.
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Self {
        let has = |wanted: &str| {
            tags.iter()
                .any(|t| t.as_ref().trim().eq_ignore_ascii_case(wanted))
        };

        let workflow = if has(PLAN_IMPLEMENT_UPDATE_TAG) || has(LEGACY_PLAN_IMPLEMENT_UPDATE_TAG) {
            WorkflowKind::PlanImplementUpdate
        } else {
            WorkflowKind::BuildUpdate
        };

        let model = if has(CAPABLE_MODEL_TAG) {
            ModelTier::Capable
        } else {
            ModelTier::Fast
        };

        Self { workflow, model }
    }
}

/// A task the board says is ready to start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskToStart {
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TaskToStart {
    pub fn intake(&self) -> TaskIntake {
        TaskIntake::from_tags(&self.tags)
    }
}

/// Ready tasks grouped by the workspace they run in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceTaskGroup {
    #[serde(rename = "worktree_name")]
    pub workspace_name: String,
    #[serde(default)]
    pub tasks_to_start: Vec<TaskToStart>,
}
