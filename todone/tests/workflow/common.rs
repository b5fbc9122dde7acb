//! Common test utilities for workflow tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use todone::agent::{AgentRequest, AgentRunner, RetryPolicy, TemplateExecutor};
use todone::artifacts::ArtifactLayout;
use todone::workflow::{RunContext, WorkflowConfig, WorkflowExecutor};
use todone::workspace::CommitReader;
use todone_core::{AgentInvocationResult, ModelTier, RunId, WorkflowKind, WorkflowSummary};

pub const RUN_ID: &str = "a1b2c3d4";
pub const WORKSPACE: &str = "auth";
pub const TASK: &str = "Add login form";

/// Agent that answers each slash command with a fixed result
#[derive(Default)]
pub struct ScriptedAgent {
    replies: HashMap<String, AgentInvocationResult>,
    prompts: Mutex<Vec<AgentRequest>>,
}

impl ScriptedAgent {
    pub fn reply(mut self, command: &str, result: AgentInvocationResult) -> Self {
        self.replies.insert(command.to_string(), result);
        self
    }

    /// Requests received, in order
    pub fn requests(&self) -> Vec<AgentRequest> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.slash_command().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl AgentRunner for ScriptedAgent {
    async fn invoke(&self, request: &AgentRequest) -> AgentInvocationResult {
        self.prompts.lock().unwrap().push(request.clone());
        let command = request.slash_command().unwrap_or_default();
        self.replies
            .get(command)
            .cloned()
            .unwrap_or_else(|| AgentInvocationResult::succeeded("ok", None))
    }
}

/// Commit reader returning a fixed answer
pub struct FixedCommit(pub Option<&'static str>);

impl CommitReader for FixedCommit {
    fn current_commit(&self, _dir: &Path) -> Option<String> {
        self.0.map(str::to_string)
    }
}

pub fn ok(output: &str) -> AgentInvocationResult {
    AgentInvocationResult::succeeded(output, Some("session-1".to_string()))
}

pub fn content_failure(output: &str) -> AgentInvocationResult {
    AgentInvocationResult::content_failure(output, Some("session-1".to_string()))
}

/// A project root in a temporary directory with its workspace already created
pub struct Fixture {
    pub dir: TempDir,
    pub agent: Arc<ScriptedAgent>,
}

impl Fixture {
    pub fn new(agent: ScriptedAgent) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("trees").join(WORKSPACE)).unwrap();
        Self {
            dir,
            agent: Arc::new(agent),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.root().join("trees").join(WORKSPACE)
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(self.root())
    }

    pub fn run_id(&self) -> RunId {
        RunId::from(RUN_ID)
    }

    pub async fn run(
        &self,
        kind: WorkflowKind,
        commits: FixedCommit,
    ) -> anyhow::Result<WorkflowSummary> {
        let config = WorkflowConfig {
            run_id: self.run_id(),
            workspace_name: WORKSPACE.to_string(),
            task: TASK.to_string(),
            model: ModelTier::Fast,
            project_root: self.root().to_path_buf(),
            worktree_base: PathBuf::from("trees"),
            target_dir: None,
            base_branch: "main".to_string(),
            verbose: false,
        };
        let ctx = RunContext::new(kind, &config, self.workspace_dir());
        let agent = TemplateExecutor::new(Arc::clone(&self.agent), self.layout())
            .with_policy(RetryPolicy::none());
        WorkflowExecutor::new(ctx, agent, commits).run().await
    }

    pub fn read_json(&self, path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }
}
