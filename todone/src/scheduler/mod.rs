//! Polling scheduler: discovers eligible tasks and delegates each one to a
//! detached workflow executor process.
//!
//! Module structure:
//! - `cli.rs`: command-line arguments of the `todone` binary
//! - `launcher.rs`: process spawning and the in-flight run registry
//!
//! One tick at a time: the loop never overlaps ticks and never waits on the
//! runs it launched. Per-task failures are logged and counted; they never
//! stop the loop.

pub mod cli;
pub mod launcher;

pub use cli::Args;
pub use launcher::{
    locate_workflow_binary, search_paths, DispatchRequest, LaunchSettings, Launcher,
    ProcessLauncher, RunHandle, RunRegistry,
};

use chrono::{DateTime, Local};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use todone_core::{RunId, WorkspaceTaskGroup};

use crate::board::TaskBoard;
use crate::workspace::WorkspaceProvisioner;

/// Scheduler configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub polling_interval: Duration,
    pub task_file: PathBuf,
    pub dry_run: bool,
    pub max_concurrent_tasks: usize,
    pub once: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            polling_interval: Duration::from_secs(5),
            task_file: PathBuf::from("tasks.md"),
            dry_run: false,
            max_concurrent_tasks: 5,
            once: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub checks: u64,
    pub tasks_started: u64,
    pub workspaces_created: u64,
    pub errors: u64,
    pub last_check: Option<DateTime<Local>>,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scheduler statistics:")?;
        writeln!(f, "  Checks:             {}", self.checks)?;
        writeln!(f, "  Tasks started:      {}", self.tasks_started)?;
        writeln!(f, "  Workspaces created: {}", self.workspaces_created)?;
        writeln!(f, "  Errors:             {}", self.errors)?;
        match self.last_check {
            Some(at) => write!(f, "  Last check:         {}", at.format("%Y-%m-%d %H:%M:%S")),
            None => write!(f, "  Last check:         never"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Checking,
    Dispatching,
}

/// What happened to one eligible task during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Delegated { request: DispatchRequest, pid: u32 },
    /// Dry-run: the task would have been delegated
    WouldDelegate(DispatchRequest),
    TransitionFailed {
        workspace: String,
        task: String,
        error: String,
    },
    LaunchFailed {
        request: DispatchRequest,
        error: String,
    },
}

/// Outcome of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub dispositions: Vec<Disposition>,
    /// Groups whose workspace could not be created
    pub skipped_groups: Vec<String>,
    pub capacity_reached: bool,
    pub no_work: bool,
}

impl TickReport {
    pub fn delegated(&self) -> usize {
        self.dispositions
            .iter()
            .filter(|d| matches!(d, Disposition::Delegated { .. }))
            .count()
    }

    pub fn would_delegate(&self) -> usize {
        self.dispositions
            .iter()
            .filter(|d| matches!(d, Disposition::WouldDelegate(_)))
            .count()
    }
}

pub struct Scheduler<B, W, L> {
    config: SchedulerConfig,
    board: B,
    workspaces: W,
    launcher: L,
    stats: SchedulerStats,
    state: SchedulerState,
}

impl<B: TaskBoard, W: WorkspaceProvisioner, L: Launcher> Scheduler<B, W, L> {
    pub fn new(config: SchedulerConfig, board: B, workspaces: W, launcher: L) -> Self {
        Self {
            config,
            board,
            workspaces,
            launcher,
            stats: SchedulerStats::default(),
            state: SchedulerState::Idle,
        }
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Tick until `shutdown` resolves, or once with `--once`
    pub async fn run<F>(&mut self, shutdown: F) -> &SchedulerStats
    where
        F: Future<Output = ()>,
    {
        info!(
            interval_secs = self.config.polling_interval.as_secs(),
            task_file = %self.config.task_file.display(),
            max_tasks = self.config.max_concurrent_tasks,
            dry_run = self.config.dry_run,
            "Scheduler started"
        );

        if self.config.once {
            self.tick().await;
            return &self.stats;
        }

        let mut interval = tokio::time::interval(self.config.polling_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
        &self.stats
    }

    /// One polling pass
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.state = SchedulerState::Checking;
        self.stats.checks += 1;
        self.stats.last_check = Some(Local::now());

        let groups = match self.board.eligible_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                error!("Failed to query eligible tasks: {e:#}");
                self.stats.errors += 1;
                Vec::new()
            }
        };
        let groups: Vec<WorkspaceTaskGroup> = groups
            .into_iter()
            .filter(|g| !g.tasks_to_start.is_empty())
            .collect();

        if groups.is_empty() {
            info!("No eligible tasks");
            report.no_work = true;
            self.state = SchedulerState::Idle;
            return report;
        }

        self.state = SchedulerState::Dispatching;
        let active = self.launcher.active_runs();
        let mut dispatched = 0usize;
        debug!(active, groups = groups.len(), "Dispatching eligible tasks");

        'groups: for group in &groups {
            // Nothing past the ceiling may touch a workspace.
            if self.at_capacity(active, dispatched) {
                report.capacity_reached = true;
                break;
            }

            let workspace = group.workspace_name.as_str();
            if !self.prepare_workspace(workspace) {
                report.skipped_groups.push(workspace.to_string());
                continue;
            }

            for task in &group.tasks_to_start {
                if self.at_capacity(active, dispatched) {
                    report.capacity_reached = true;
                    break 'groups;
                }

                let intake = task.intake();
                let request = DispatchRequest {
                    run_id: RunId::generate(),
                    workspace_name: workspace.to_string(),
                    task: task.description.clone(),
                    model: intake.model,
                    workflow: intake.workflow,
                };

                let disposition = self.start_task(request).await;
                if matches!(
                    disposition,
                    Disposition::Delegated { .. } | Disposition::WouldDelegate(_)
                ) {
                    dispatched += 1;
                }
                report.dispositions.push(disposition);
            }
        }

        self.state = SchedulerState::Idle;
        report
    }

    fn at_capacity(&self, active: usize, dispatched: usize) -> bool {
        let max = self.config.max_concurrent_tasks;
        let full = active + dispatched >= max;
        if full {
            info!(
                active,
                dispatched,
                max,
                "Concurrency limit reached, deferring remaining tasks"
            );
        }
        full
    }

    /// Make sure the workspace exists; false when the group must be skipped
    fn prepare_workspace(&mut self, workspace: &str) -> bool {
        if self.workspaces.exists(workspace) {
            return true;
        }
        if self.config.dry_run {
            info!(workspace, "[dry-run] Would create workspace");
            return true;
        }
        match self.workspaces.create(workspace) {
            Ok(dir) => {
                info!(workspace, path = %dir.display(), "Created workspace");
                self.stats.workspaces_created += 1;
                true
            }
            Err(e) => {
                error!(workspace, "Failed to create workspace, skipping group: {e}");
                self.stats.errors += 1;
                false
            }
        }
    }

    async fn start_task(&mut self, request: DispatchRequest) -> Disposition {
        let DispatchRequest {
            run_id,
            workspace_name,
            task,
            ..
        } = &request;

        if self.config.dry_run {
            info!(
                run_id = %run_id,
                workspace = %workspace_name,
                workflow = %request.workflow,
                model = %request.model,
                "[dry-run] Would mark in progress and delegate: {task}"
            );
            return Disposition::WouldDelegate(request);
        }

        if let Err(e) = self
            .board
            .mark_in_progress(workspace_name, task, run_id)
            .await
        {
            warn!(run_id = %run_id, workspace = %workspace_name, "Failed to mark task in progress: {e:#}");
            self.stats.errors += 1;
            return Disposition::TransitionFailed {
                workspace: workspace_name.clone(),
                task: task.clone(),
                error: format!("{e:#}"),
            };
        }

        match self.launcher.launch(&request) {
            Ok(handle) => {
                info!(
                    run_id = %run_id,
                    workspace = %workspace_name,
                    workflow = %request.workflow,
                    model = %request.model,
                    pid = handle.pid,
                    "Delegated task: {task}"
                );
                self.stats.tasks_started += 1;
                Disposition::Delegated {
                    pid: handle.pid,
                    request,
                }
            }
            Err(e) => {
                error!(run_id = %run_id, workspace = %workspace_name, "Failed to launch workflow: {e:#}");
                self.stats.errors += 1;
                Disposition::LaunchFailed {
                    error: format!("{e:#}"),
                    request,
                }
            }
        }
    }
}
