//! Common test utilities for scheduler tests

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use todone::board::TaskBoard;
use todone::scheduler::{DispatchRequest, Launcher, RunHandle, Scheduler, SchedulerConfig};
use todone::workspace::{WorkspaceError, WorkspaceProvisioner};
use todone_core::{RunId, TaskToStart, WorkspaceTaskGroup};

/// Side effects observed by the fakes
#[derive(Debug, Default)]
pub struct Recorder {
    pub queries: usize,
    pub created: Vec<String>,
    pub marked: Vec<(String, String, RunId)>,
    pub launched: Vec<DispatchRequest>,
}

pub type Shared = Arc<Mutex<Recorder>>;

pub fn task(description: &str, tags: &[&str]) -> TaskToStart {
    TaskToStart {
        description: description.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

pub fn group(workspace: &str, tasks: Vec<TaskToStart>) -> WorkspaceTaskGroup {
    WorkspaceTaskGroup {
        workspace_name: workspace.to_string(),
        tasks_to_start: tasks,
    }
}

pub struct FakeBoard {
    pub groups: Vec<WorkspaceTaskGroup>,
    pub fail_query: bool,
    /// Task descriptions whose transition fails
    pub reject: HashSet<String>,
    pub recorder: Shared,
}

#[async_trait]
impl TaskBoard for FakeBoard {
    async fn eligible_groups(&self) -> Result<Vec<WorkspaceTaskGroup>> {
        self.recorder.lock().unwrap().queries += 1;
        if self.fail_query {
            bail!("agent unavailable");
        }
        Ok(self.groups.clone())
    }

    async fn mark_in_progress(&self, workspace: &str, task: &str, run_id: &RunId) -> Result<()> {
        if self.reject.contains(task) {
            return Err(anyhow!("task '{task}' is not startable"));
        }
        self.recorder.lock().unwrap().marked.push((
            workspace.to_string(),
            task.to_string(),
            run_id.clone(),
        ));
        Ok(())
    }
}

pub struct FakeWorkspaces {
    pub existing: HashSet<String>,
    pub broken: HashSet<String>,
    pub recorder: Shared,
}

impl WorkspaceProvisioner for FakeWorkspaces {
    fn workspace_dir(&self, name: &str) -> PathBuf {
        PathBuf::from("/trees").join(name)
    }

    fn exists(&self, name: &str) -> bool {
        self.existing.contains(name)
    }

    fn create(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        if self.broken.contains(name) {
            return Err(WorkspaceError::Git {
                args: format!("worktree add {name}"),
                stderr: "fatal: invalid reference: main".to_string(),
            });
        }
        self.recorder.lock().unwrap().created.push(name.to_string());
        Ok(self.workspace_dir(name))
    }
}

pub struct FakeLauncher {
    /// Runs still in flight from earlier ticks
    pub active: usize,
    pub fail: bool,
    pub recorder: Shared,
}

impl Launcher for FakeLauncher {
    fn launch(&mut self, request: &DispatchRequest) -> Result<RunHandle> {
        if self.fail {
            bail!("exec format error");
        }
        let mut recorder = self.recorder.lock().unwrap();
        recorder.launched.push(request.clone());
        Ok(RunHandle {
            run_id: request.run_id.clone(),
            pid: 1000 + recorder.launched.len() as u32,
            started_at: Utc::now(),
        })
    }

    fn active_runs(&mut self) -> usize {
        self.active
    }
}

/// Builder for a scheduler wired to the fakes
pub struct Harness {
    pub config: SchedulerConfig,
    pub groups: Vec<WorkspaceTaskGroup>,
    pub fail_query: bool,
    pub reject: HashSet<String>,
    pub existing: HashSet<String>,
    pub broken: HashSet<String>,
    pub active: usize,
    pub fail_launch: bool,
    pub recorder: Shared,
}

impl Harness {
    pub fn new(groups: Vec<WorkspaceTaskGroup>) -> Self {
        Self {
            config: SchedulerConfig {
                polling_interval: Duration::from_secs(1),
                task_file: PathBuf::from("/repo/tasks.md"),
                dry_run: false,
                max_concurrent_tasks: 5,
                once: true,
            },
            groups,
            fail_query: false,
            reject: HashSet::new(),
            existing: HashSet::new(),
            broken: HashSet::new(),
            active: 0,
            fail_launch: false,
            recorder: Shared::default(),
        }
    }

    pub fn build(self) -> (Scheduler<FakeBoard, FakeWorkspaces, FakeLauncher>, Shared) {
        let board = FakeBoard {
            groups: self.groups,
            fail_query: self.fail_query,
            reject: self.reject,
            recorder: Arc::clone(&self.recorder),
        };
        let workspaces = FakeWorkspaces {
            existing: self.existing,
            broken: self.broken,
            recorder: Arc::clone(&self.recorder),
        };
        let launcher = FakeLauncher {
            active: self.active,
            fail: self.fail_launch,
            recorder: Arc::clone(&self.recorder),
        };
        (
            Scheduler::new(self.config, board, workspaces, launcher),
            self.recorder,
        )
    }
}

pub fn names(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
