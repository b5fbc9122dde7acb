//! Isolated per-group workspaces and commit lookup, backed by git worktrees.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Length of the commit identifiers handed to the update phase
pub const SHORT_COMMIT_LEN: usize = 9;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("invalid workspace name '{0}'")]
    InvalidName(String),

    #[error("git {args} failed: {stderr}")]
    Git { args: String, stderr: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Creates and locates the isolated workspace of a group
pub trait WorkspaceProvisioner: Send + Sync {
    /// Directory the agent works in for `name`
    fn workspace_dir(&self, name: &str) -> PathBuf;

    fn exists(&self, name: &str) -> bool;

    /// Create the workspace and return its working directory
    fn create(&self, name: &str) -> Result<PathBuf, WorkspaceError>;

    fn ensure(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        if self.exists(name) {
            Ok(self.workspace_dir(name))
        } else {
            self.create(name)
        }
    }
}

/// Reads the current commit of a workspace
pub trait CommitReader: Send + Sync {
    fn current_commit(&self, dir: &Path) -> Option<String>;
}

/// Workspace names become branch and directory names
pub fn validate_workspace_name(name: &str) -> Result<(), WorkspaceError> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c == '.' || c == '-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.contains("..");
    if valid {
        Ok(())
    } else {
        Err(WorkspaceError::InvalidName(name.to_string()))
    }
}

/// `git worktree` backed workspaces under `<repo>/<base_dir>/<name>`
#[derive(Debug, Clone)]
pub struct GitWorktrees {
    repo_root: PathBuf,
    base_dir: PathBuf,
    base_branch: String,
    target_dir: Option<String>,
}

impl GitWorktrees {
    pub fn new(repo_root: impl Into<PathBuf>, base_dir: impl AsRef<Path>) -> Self {
        let repo_root = repo_root.into();
        let base_dir = repo_root.join(base_dir);
        Self {
            repo_root,
            base_dir,
            base_branch: "main".to_string(),
            target_dir: None,
        }
    }

    pub fn with_base_branch(mut self, branch: impl Into<String>) -> Self {
        self.base_branch = branch.into();
        self
    }

    /// Agents work in this sub-directory of each worktree
    pub fn with_target_dir(mut self, target_dir: Option<String>) -> Self {
        self.target_dir = target_dir.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn worktree_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn git(&self, args: &[&str]) -> Result<String, WorkspaceError> {
        debug!(repo = %self.repo_root.display(), "git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(WorkspaceError::Git {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn copy_env_file(&self, worktree: &Path) {
        let source = self.repo_root.join(".env");
        if !source.is_file() {
            return;
        }
        match std::fs::copy(&source, worktree.join(".env")) {
            Ok(_) => debug!(worktree = %worktree.display(), "Copied .env into worktree"),
            Err(e) => warn!(worktree = %worktree.display(), "Failed to copy .env: {e}"),
        }
    }
}

impl WorkspaceProvisioner for GitWorktrees {
    fn workspace_dir(&self, name: &str) -> PathBuf {
        let worktree = self.worktree_path(name);
        match &self.target_dir {
            Some(target) => worktree.join(target),
            None => worktree,
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.worktree_path(name).is_dir()
    }

    fn create(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        validate_workspace_name(name)?;
        let worktree = self.worktree_path(name);
        if let Some(parent) = worktree.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let path = worktree.to_string_lossy().into_owned();

        match self.git(&["worktree", "add", "-b", name, &path, &self.base_branch]) {
            Ok(_) => {}
            Err(WorkspaceError::Git { stderr, .. }) if stderr.contains("already exists") => {
                // Branch left over from an earlier worktree: check it out again.
                self.git(&["worktree", "add", &path, name])?;
            }
            Err(e) => return Err(e),
        }

        self.copy_env_file(&worktree);

        let dir = self.workspace_dir(name);
        std::fs::create_dir_all(&dir)?;
        info!(workspace = name, path = %dir.display(), "Created workspace");
        Ok(dir)
    }
}

/// `git rev-parse HEAD`, shortened
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCommits;

impl CommitReader for GitCommits {
    fn current_commit(&self, dir: &Path) -> Option<String> {
        let output = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(dir)
            .output();

        match output {
            Ok(out) if out.status.success() => {
                let hash = String::from_utf8_lossy(&out.stdout).trim().to_string();
                (!hash.is_empty()).then(|| hash.chars().take(SHORT_COMMIT_LEN).collect())
            }
            Ok(out) => {
                warn!(
                    dir = %dir.display(),
                    "git rev-parse HEAD failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                None
            }
            Err(e) => {
                warn!(dir = %dir.display(), "Failed to run git: {e}");
                None
            }
        }
    }
}
