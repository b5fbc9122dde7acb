//! Phase sequencing for the two pipelines.
//!
//! Upstream phases (plan, implement, build) stop the pipeline at the first
//! failure and the dependent phases are recorded as skipped. The update phase
//! always runs and is the only place the task's terminal status is written.
//! Phase summaries and the state file are written as the run progresses; a
//! failure to write them is logged and never keeps the update phase from
//! running.

use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Map};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{error, info, warn, Instrument};

use todone_core::{
    AgentInvocationResult, FinalTaskStatus, PhaseStatus, PhaseSummary, TaskUpdate, WorkflowKind,
    WorkflowStage, WorkflowState, WorkflowSummary,
};

use super::context::RunContext;
use super::phase::Phase;
use super::plan_path::extract_plan_path;
use crate::agent::{truncate_output, AgentRunner, TemplateExecutor, TemplateRequest};
use crate::artifacts::write_json;
use crate::workspace::CommitReader;

const UPDATE_ERROR_LIMIT: usize = 500;
const LOG_EXCERPT_LIMIT: usize = 300;

/// What the upstream phases produced
#[derive(Debug, Default)]
struct Upstream {
    succeeded: bool,
    plan_path: Option<String>,
    commit_ref: Option<String>,
    error: Option<String>,
}

pub struct WorkflowExecutor<R, C> {
    ctx: RunContext,
    agent: TemplateExecutor<R>,
    commits: C,
    phases: BTreeMap<String, PhaseSummary>,
    state: WorkflowState,
}

impl<R: AgentRunner, C: CommitReader> WorkflowExecutor<R, C> {
    pub fn new(ctx: RunContext, agent: TemplateExecutor<R>, commits: C) -> Self {
        let first_stage = match ctx.workflow {
            WorkflowKind::PlanImplementUpdate => WorkflowStage::Planning,
            WorkflowKind::BuildUpdate => WorkflowStage::Building,
        };
        let state = WorkflowState::new(
            ctx.run_id.clone(),
            ctx.workflow,
            &ctx.workspace_name,
            &ctx.task,
            first_stage,
        );
        Self {
            ctx,
            agent,
            commits,
            phases: BTreeMap::new(),
            state,
        }
    }

    /// Run the pipeline to completion and write `workflow_summary.json`
    pub async fn run(self) -> Result<WorkflowSummary> {
        let span = self.ctx.span.clone();
        self.run_pipeline().instrument(span).await
    }

    async fn run_pipeline(mut self) -> Result<WorkflowSummary> {
        info!(task = %self.ctx.task, model = %self.ctx.model, "Starting workflow");

        let upstream = match self.ctx.workflow {
            WorkflowKind::PlanImplementUpdate => self.plan_and_implement().await,
            WorkflowKind::BuildUpdate => self.build().await,
        };

        let payload = self.task_update(&upstream);
        let final_status = payload.final_status();
        let update = self.update(&payload).await;
        self.finish(final_status, upstream, &update)
    }

    async fn plan_and_implement(&mut self) -> Upstream {
        let mut upstream = Upstream::default();
        let workspace_dir = self.ctx.workspace_dir.clone();

        let args = vec![self.ctx.run_id.to_string(), self.ctx.task.clone()];
        let (plan, summary) = self.execute(Phase::Plan, args, &workspace_dir).await;
        if plan.success {
            upstream.plan_path = extract_plan_path(&plan.output);
            if upstream.plan_path.is_none() {
                upstream.error = Some("plan phase did not report a plan file path".to_string());
            }
        } else {
            upstream.error = Some(format!("plan phase failed: {}", plan.output));
        }
        self.state.plan_path = upstream.plan_path.clone();
        self.record(
            Phase::Plan,
            summary.with_extra("plan_path", json!(upstream.plan_path)),
        );

        let Some(plan_path) = upstream.plan_path.clone() else {
            let reason = if plan.success { "no plan path" } else { "plan failed" };
            warn!(reason, "Skipping implement phase");
            self.skip(Phase::Implement, &workspace_dir, reason);
            return upstream;
        };

        let (implement, summary) = self
            .execute(Phase::Implement, vec![plan_path], &workspace_dir)
            .await;
        self.capture_commit(Phase::Implement, &implement, summary, &mut upstream);
        upstream
    }

    async fn build(&mut self) -> Upstream {
        let mut upstream = Upstream::default();
        let workspace_dir = self.ctx.workspace_dir.clone();

        let args = vec![self.ctx.run_id.to_string(), self.ctx.task.clone()];
        let (build, summary) = self.execute(Phase::Build, args, &workspace_dir).await;
        self.capture_commit(Phase::Build, &build, summary, &mut upstream);
        upstream
    }

    fn capture_commit(
        &mut self,
        phase: Phase,
        result: &AgentInvocationResult,
        summary: PhaseSummary,
        upstream: &mut Upstream,
    ) {
        if result.success {
            upstream.succeeded = true;
            upstream.commit_ref = self.commits.current_commit(&self.ctx.workspace_dir);
            match &upstream.commit_ref {
                Some(commit) => info!(commit = %commit, "Captured workspace commit"),
                None => {
                    warn!(phase = phase.name(), "No commit found in workspace");
                    upstream.error = Some(format!(
                        "no commit found in workspace after {} phase",
                        phase.name()
                    ));
                }
            }
        } else {
            upstream.error = Some(format!("{} phase failed: {}", phase.name(), result.output));
        }

        self.state.commit_ref = upstream.commit_ref.clone();
        self.record(
            phase,
            summary.with_extra("commit_hash", json!(upstream.commit_ref)),
        );
    }

    /// Terminal status for the update phase. A success without a commit is
    /// reported as a failure.
    fn task_update(&self, upstream: &Upstream) -> TaskUpdate {
        let status =
            FinalTaskStatus::decide(upstream.succeeded, upstream.commit_ref.as_deref());
        let error = match status {
            FinalTaskStatus::Success => None,
            FinalTaskStatus::Failed => upstream
                .error
                .as_deref()
                .map(|e| single_line(&truncate_output(e, UPDATE_ERROR_LIMIT))),
        };

        TaskUpdate::new(
            self.ctx.run_id.clone(),
            &self.ctx.workspace_name,
            &self.ctx.task,
            status.into(),
            upstream.commit_ref.clone(),
            error.clone(),
        )
        .unwrap_or_else(|e| {
            warn!("Reporting task as failed: {e}");
            TaskUpdate::failed(
                self.ctx.run_id.clone(),
                &self.ctx.workspace_name,
                &self.ctx.task,
                error.unwrap_or_else(|| e.to_string()),
            )
        })
    }

    async fn update(&mut self, payload: &TaskUpdate) -> AgentInvocationResult {
        let status = payload.final_status();
        let args = payload.command_args();

        let project_root = self.ctx.project_root.clone();
        let (result, summary) = self.execute(Phase::Update, args, &project_root).await;
        if !result.success {
            error!(
                "Failed to write terminal task status: {}",
                truncate_output(&result.output, LOG_EXCERPT_LIMIT)
            );
        }
        self.record(
            Phase::Update,
            summary.with_extra("final_status", status.as_str()),
        );
        result
    }

    fn finish(
        mut self,
        final_status: FinalTaskStatus,
        upstream: Upstream,
        update: &AgentInvocationResult,
    ) -> Result<WorkflowSummary> {
        let error = upstream.error.or_else(|| {
            (!update.success).then(|| format!("update phase failed: {}", update.output))
        });

        let summary = WorkflowSummary {
            workflow: self.ctx.workflow,
            run_id: self.ctx.run_id.clone(),
            workspace_name: self.ctx.workspace_name.clone(),
            task: self.ctx.task.clone(),
            model: self.ctx.model,
            working_dir: self.ctx.workspace_dir.clone(),
            plan_path: upstream.plan_path,
            commit_ref: upstream.commit_ref,
            phases: std::mem::take(&mut self.phases),
            overall_success: upstream.succeeded,
            final_task_status: final_status,
            error,
            started_at: self.state.started_at,
            completed_at: Utc::now(),
        };

        self.state.error = summary.error.clone();
        self.advance(if summary.is_clean_success() {
            WorkflowStage::Completed
        } else {
            WorkflowStage::Failed
        });

        write_json(&self.ctx.layout.workflow_summary(&self.ctx.run_id), &summary)?;

        if summary.is_clean_success() {
            info!(commit = ?summary.commit_ref, "Workflow completed");
        } else {
            warn!(
                final_status = %summary.final_task_status,
                error = ?summary.error,
                "Workflow finished without success"
            );
        }
        Ok(summary)
    }

    async fn execute(
        &mut self,
        phase: Phase,
        args: Vec<String>,
        working_dir: &Path,
    ) -> (AgentInvocationResult, PhaseSummary) {
        self.advance(phase.stage());
        let agent_name = phase.agent_name(&self.ctx.workspace_name);
        info!(phase = phase.name(), agent = %agent_name, "Starting phase");

        let template = TemplateRequest::new(
            &agent_name,
            phase.slash_command(),
            args.clone(),
            self.ctx.run_id.clone(),
            self.ctx.model,
        )
        .in_dir(working_dir);
        let result = self.agent.execute(&template).await;

        let status = if result.success {
            info!(phase = phase.name(), "Phase succeeded");
            PhaseStatus::Succeeded
        } else {
            warn!(
                phase = phase.name(),
                classification = ?result.retry_classification,
                "Phase failed: {}",
                truncate_output(&result.output, LOG_EXCERPT_LIMIT)
            );
            PhaseStatus::Failed
        };

        let mut summary = self.phase_summary(phase, args, working_dir, status);
        summary.session_id = result.session_id.clone();
        if !result.success {
            summary.error = Some(result.output.clone());
        }
        (result, summary)
    }

    fn skip(&mut self, phase: Phase, working_dir: &Path, reason: &str) {
        let mut summary = self.phase_summary(phase, Vec::new(), working_dir, PhaseStatus::Skipped);
        summary.skip_reason = Some(reason.to_string());
        self.record(phase, summary);
    }

    fn phase_summary(
        &self,
        phase: Phase,
        args: Vec<String>,
        working_dir: &Path,
        status: PhaseStatus,
    ) -> PhaseSummary {
        let agent_name = phase.agent_name(&self.ctx.workspace_name);
        let artifact_paths = match status {
            PhaseStatus::Skipped => Vec::new(),
            _ => self.ctx.layout.agent_outputs(&self.ctx.run_id, &agent_name),
        };
        PhaseSummary {
            phase: phase.name().to_string(),
            run_id: self.ctx.run_id.clone(),
            workspace_name: self.ctx.workspace_name.clone(),
            task: self.ctx.task.clone(),
            command: phase.slash_command().to_string(),
            args,
            model: self.ctx.model,
            working_dir: working_dir.to_path_buf(),
            status,
            success: status == PhaseStatus::Succeeded,
            session_id: None,
            skip_reason: None,
            error: None,
            artifact_paths,
            extras: Map::new(),
            recorded_at: Utc::now(),
        }
    }

    fn record(&mut self, phase: Phase, summary: PhaseSummary) {
        let agent_name = phase.agent_name(&self.ctx.workspace_name);
        let path = self.ctx.layout.phase_summary(&self.ctx.run_id, &agent_name);
        if let Err(e) = write_json(&path, &summary) {
            warn!(phase = phase.name(), "Failed to write phase summary: {e:#}");
        }
        self.phases.insert(summary.phase.clone(), summary);
    }

    fn advance(&mut self, stage: WorkflowStage) {
        self.state.advance(stage);
        let path = self.ctx.layout.workflow_state(&self.ctx.run_id);
        if let Err(e) = write_json(&path, &self.state) {
            warn!(?stage, "Failed to write workflow state: {e:#}");
        }
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
