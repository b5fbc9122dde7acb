//! Task lifecycle and eligibility rules.
//!
//! A workspace group is an ordered list of tasks sharing one isolated
//! checkout. Only two actors ever change a task's status: the scheduler
//! (pick-up) and the update phase of a workflow run (terminal status).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::run::RunId;
use crate::summary::FinalTaskStatus;

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    Blocked,
    InProgress,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Marker used for this status in the task-list document
    pub fn marker(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "[]",
            TaskStatus::Blocked => "[⏰]",
            TaskStatus::InProgress => "[🟡]",
            TaskStatus::Succeeded => "[✅]",
            TaskStatus::Failed => "[❌]",
        }
    }

    /// Parse a document marker. `[ ]` is accepted as an empty checkbox.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim() {
            "[]" | "[ ]" => Some(TaskStatus::NotStarted),
            "[⏰]" => Some(TaskStatus::Blocked),
            "[🟡]" => Some(TaskStatus::InProgress),
            "[✅]" => Some(TaskStatus::Succeeded),
            "[❌]" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::NotStarted => "not started",
            TaskStatus::Blocked => "blocked",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Rejected status change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot move task from {from} to {to}")]
    Illegal { from: TaskStatus, to: TaskStatus },

    #[error("blocked task cannot start before every earlier task in its group has succeeded")]
    PredecessorsIncomplete,

    #[error("a succeeded task requires a non-empty commit reference")]
    MissingCommit,

    #[error("task index {0} is out of range")]
    NoSuchTask(usize),
}

/// One work item from the task list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_ref: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
}

impl Task {
    pub fn new(description: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            description: description.into(),
            status,
            run_id: None,
            commit_ref: None,
            tags: Vec::new(),
            workspace_name: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the task picked up by a run.
    ///
    /// Only legal from `NotStarted` or `Blocked`; callers going through a
    /// [`WorkspaceGroup`] get the predecessor check for blocked tasks.
    pub fn start(&mut self, run_id: RunId) -> Result<(), TransitionError> {
        match self.status {
            TaskStatus::NotStarted | TaskStatus::Blocked => {
                self.status = TaskStatus::InProgress;
                self.run_id = Some(run_id);
                Ok(())
            }
            from => Err(TransitionError::Illegal {
                from,
                to: TaskStatus::InProgress,
            }),
        }
    }

    /// Record a successful run. The commit reference is mandatory.
    pub fn succeed(&mut self, commit_ref: impl Into<String>) -> Result<(), TransitionError> {
        let commit_ref = commit_ref.into();
        if commit_ref.trim().is_empty() {
            return Err(TransitionError::MissingCommit);
        }
        self.expect_in_progress(TaskStatus::Succeeded)?;
        self.status = TaskStatus::Succeeded;
        self.commit_ref = Some(commit_ref);
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), TransitionError> {
        self.expect_in_progress(TaskStatus::Failed)?;
        self.status = TaskStatus::Failed;
        self.commit_ref = None;
        Ok(())
    }

    fn expect_in_progress(&self, to: TaskStatus) -> Result<(), TransitionError> {
        if self.status == TaskStatus::InProgress {
            Ok(())
        } else {
            Err(TransitionError::Illegal {
                from: self.status,
                to,
            })
        }
    }

    /// A task is consistent when a commit is attached exactly when it succeeded
    pub fn is_consistent(&self) -> bool {
        match self.status {
            TaskStatus::Succeeded => self
                .commit_ref
                .as_deref()
                .is_some_and(|c| !c.trim().is_empty()),
            _ => self.commit_ref.is_none(),
        }
    }
}

/// Ordered tasks that share one isolated workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceGroup {
    pub name: String,
    pub tasks: Vec<Task>,
}

impl WorkspaceGroup {
    pub fn new(name: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            name: name.into(),
            tasks,
        }
    }

    /// Whether the task at `index` may be picked up now.
    ///
    /// Not-started tasks always may. Blocked tasks may only once every task
    /// positioned before them has succeeded.
    pub fn is_eligible(&self, index: usize) -> bool {
        let Some(task) = self.tasks.get(index) else {
            return false;
        };
        match task.status {
            TaskStatus::NotStarted => true,
            TaskStatus::Blocked => self.predecessors_succeeded(index),
            TaskStatus::InProgress | TaskStatus::Succeeded | TaskStatus::Failed => false,
        }
    }

    /// Eligible tasks in document order
    pub fn eligible_tasks(&self) -> Vec<&Task> {
        (0..self.tasks.len())
            .filter(|&i| self.is_eligible(i))
            .map(|i| &self.tasks[i])
            .collect()
    }

    /// Move the task at `index` to in-progress, enforcing eligibility
    pub fn start_task(&mut self, index: usize, run_id: RunId) -> Result<(), TransitionError> {
        let status = self
            .tasks
            .get(index)
            .map(|t| t.status)
            .ok_or(TransitionError::NoSuchTask(index))?;
        if status == TaskStatus::Blocked && !self.predecessors_succeeded(index) {
            return Err(TransitionError::PredecessorsIncomplete);
        }
        let workspace = self.name.clone();
        let task = &mut self.tasks[index];
        task.start(run_id)?;
        task.workspace_name = Some(workspace);
        Ok(())
    }

    fn predecessors_succeeded(&self, index: usize) -> bool {
        self.tasks[..index]
            .iter()
            .all(|t| t.status == TaskStatus::Succeeded)
    }
}

/// Terminal status written back by the update phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub run_id: RunId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub workspace_name: String,
    pub task_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskUpdateError {
    #[error("a task update must be terminal, got {0}")]
    NotTerminal(TaskStatus),

    #[error("a successful task update requires a commit reference")]
    MissingCommit,
}

impl TaskUpdate {
    pub fn new(
        run_id: RunId,
        workspace_name: impl Into<String>,
        task_description: impl Into<String>,
        status: TaskStatus,
        commit_ref: Option<String>,
        error_message: Option<String>,
    ) -> Result<Self, TaskUpdateError> {
        if !status.is_terminal() {
            return Err(TaskUpdateError::NotTerminal(status));
        }
        let commit_ref = commit_ref.filter(|c| !c.trim().is_empty());
        if status == TaskStatus::Succeeded && commit_ref.is_none() {
            return Err(TaskUpdateError::MissingCommit);
        }
        Ok(Self {
            run_id,
            status,
            commit_ref,
            error_message,
            workspace_name: workspace_name.into(),
            task_description: task_description.into(),
        })
    }

    /// A failed update; always valid
    pub fn failed(
        run_id: RunId,
        workspace_name: impl Into<String>,
        task_description: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            status: TaskStatus::Failed,
            commit_ref: None,
            error_message: Some(error_message.into()),
            workspace_name: workspace_name.into(),
            task_description: task_description.into(),
        }
    }

    pub fn final_status(&self) -> FinalTaskStatus {
        match self.status {
            TaskStatus::Succeeded => FinalTaskStatus::Success,
            _ => FinalTaskStatus::Failed,
        }
    }

    /// Positional arguments of the update command: run id, workspace, task,
    /// status, commit and error, with absent values as empty strings
    pub fn command_args(&self) -> Vec<String> {
        vec![
            self.run_id.to_string(),
            self.workspace_name.clone(),
            self.task_description.clone(),
            self.final_status().as_str().to_string(),
            self.commit_ref.clone().unwrap_or_default(),
            self.error_message.clone().unwrap_or_default(),
        ]
    }
}
