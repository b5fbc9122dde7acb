//! Detached workflow processes and the registry of runs still in flight.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

use todone_core::{ModelTier, RunId, WorkflowKind};

use crate::artifacts::ArtifactLayout;

const DISPATCH_LOG: &str = "dispatch.log";

/// A task handed to a workflow executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub run_id: RunId,
    pub workspace_name: String,
    pub task: String,
    pub model: ModelTier,
    pub workflow: WorkflowKind,
}

/// Handle of a launched run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub run_id: RunId,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

/// Starts workflow runs without waiting for them
pub trait Launcher: Send {
    fn launch(&mut self, request: &DispatchRequest) -> Result<RunHandle>;

    /// Runs launched earlier that have not exited yet
    fn active_runs(&mut self) -> usize;
}

struct TrackedRun {
    handle: RunHandle,
    child: Child,
}

/// Launched runs, keyed by run id. Finished runs are dropped on [`reap`].
///
/// [`reap`]: RunRegistry::reap
#[derive(Default)]
pub struct RunRegistry {
    runs: HashMap<RunId, TrackedRun>,
}

impl RunRegistry {
    fn insert(&mut self, handle: RunHandle, child: Child) {
        self.runs
            .insert(handle.run_id.clone(), TrackedRun { handle, child });
    }

    /// Drop runs whose process has exited and return how many remain
    pub fn reap(&mut self) -> usize {
        self.runs.retain(|run_id, run| match run.child.try_wait() {
            Ok(Some(status)) => {
                let elapsed = Utc::now() - run.handle.started_at;
                info!(
                    run_id = %run_id,
                    pid = run.handle.pid,
                    status = %status,
                    elapsed_secs = elapsed.num_seconds(),
                    "Workflow run exited"
                );
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(run_id = %run_id, "Failed to poll workflow run: {e}");
                false
            }
        });
        self.runs.len()
    }
}

/// Directories searched for the workflow executables: the directory of the
/// running binary, plus its parent when running from a cargo `deps/` dir.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.to_path_buf());
            if exe_dir.ends_with("deps") {
                if let Some(parent_dir) = exe_dir.parent() {
                    paths.push(parent_dir.to_path_buf());
                }
            }
        }
    }
    paths
}

/// Locate the executable of `workflow` in `search_paths`
pub fn locate_workflow_binary(workflow: WorkflowKind, search_paths: &[PathBuf]) -> Option<PathBuf> {
    let file_name = format!("{}{}", workflow.binary_name(), std::env::consts::EXE_SUFFIX);
    search_paths
        .iter()
        .map(|dir| dir.join(&file_name))
        .find(|path| is_executable(path))
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Static launch settings forwarded to every workflow executor
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub project_root: PathBuf,
    pub worktree_base: PathBuf,
    pub target_dir: Option<String>,
    pub base_branch: String,
    pub verbose: bool,
}

/// Spawns workflow executables as detached child processes
pub struct ProcessLauncher {
    binaries: HashMap<WorkflowKind, PathBuf>,
    settings: LaunchSettings,
    layout: ArtifactLayout,
    registry: RunRegistry,
}

impl ProcessLauncher {
    /// Find both workflow executables next to the current binary
    pub fn discover(settings: LaunchSettings) -> Result<Self> {
        Self::discover_in(&search_paths(), settings)
    }

    pub fn discover_in(search_paths: &[PathBuf], settings: LaunchSettings) -> Result<Self> {
        let mut binaries = HashMap::new();
        for kind in [WorkflowKind::PlanImplementUpdate, WorkflowKind::BuildUpdate] {
            let path = locate_workflow_binary(kind, search_paths).ok_or_else(|| {
                anyhow!(
                    "Workflow executable '{}' not found in {:?}",
                    kind.binary_name(),
                    search_paths
                )
            })?;
            debug!(workflow = %kind, path = %path.display(), "Found workflow executable");
            binaries.insert(kind, path);
        }

        Ok(Self {
            binaries,
            layout: ArtifactLayout::new(&settings.project_root),
            settings,
            registry: RunRegistry::default(),
        })
    }

    /// Command line of a workflow executor, without stdio wiring
    pub fn build_command(&self, request: &DispatchRequest) -> Result<Command> {
        let binary = self
            .binaries
            .get(&request.workflow)
            .ok_or_else(|| anyhow!("No executable for workflow {}", request.workflow))?;

        let mut cmd = Command::new(binary);
        cmd.arg("--run-id")
            .arg(request.run_id.as_str())
            .arg("--workspace-name")
            .arg(&request.workspace_name)
            .arg("--task")
            .arg(&request.task)
            .arg("--model")
            .arg(request.model.model_id())
            .arg("--worktree-base")
            .arg(&self.settings.worktree_base)
            .arg("--base-branch")
            .arg(&self.settings.base_branch)
            .arg("--project-root")
            .arg(&self.settings.project_root);
        if let Some(target_dir) = &self.settings.target_dir {
            cmd.arg("--target-dir").arg(target_dir);
        }
        if self.settings.verbose {
            cmd.arg("--verbose");
        }
        cmd.current_dir(&self.settings.project_root);
        Ok(cmd)
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&mut self, request: &DispatchRequest) -> Result<RunHandle> {
        let mut cmd = self.build_command(request)?;

        let log_path = self.layout.run_dir(&request.run_id).join(DISPATCH_LOG);
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let log = File::create(&log_path)
            .with_context(|| format!("Failed to create {}", log_path.display()))?;
        let log_err = log.try_clone().context("Failed to clone dispatch log handle")?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));

        // Own process group: a Ctrl-C aimed at the scheduler leaves runs alone.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().with_context(|| {
            format!("Failed to spawn {} workflow", request.workflow.binary_name())
        })?;

        let handle = RunHandle {
            run_id: request.run_id.clone(),
            pid: child.id(),
            started_at: Utc::now(),
        };
        self.registry.insert(handle.clone(), child);
        Ok(handle)
    }

    fn active_runs(&mut self) -> usize {
        self.registry.reap()
    }
}
