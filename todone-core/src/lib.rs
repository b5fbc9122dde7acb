//! Shared types for the todone task dispatcher.
//!
//! Module structure:
//! - **task**: task lifecycle, workspace groups and the eligibility rules
//! - **intake**: tag resolution into a workflow kind and model tier
//! - **run**: run identifiers
//! - **invocation**: agent invocation outcomes and streamed result records
//! - **summary**: phase, state and workflow summary files

pub mod intake;
pub mod invocation;
pub mod run;
pub mod summary;
pub mod task;

pub use intake::{ModelTier, TaskIntake, TaskToStart, WorkflowKind, WorkspaceTaskGroup};
pub use invocation::{AgentInvocationResult, ResultRecord, RetryClassification};
pub use run::RunId;
pub use summary::{
    FinalTaskStatus, PhaseStatus, PhaseSummary, WorkflowStage, WorkflowState, WorkflowSummary,
};
pub use task::{Task, TaskStatus, TaskUpdate, TaskUpdateError, TransitionError, WorkspaceGroup};
