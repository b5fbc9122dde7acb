// Agent invocation layer: CLI process, result stream, classification, retries
pub mod agent;

// Per-run artifact paths
pub mod artifacts;

// Task-list collaborator
pub mod board;

// Environment and agent settings
pub mod config;

// JSON recovery from free-form agent output
pub mod json;

// Tracing subscriber setup
pub mod logging;

// Ad hoc prompt and slash-command runs
pub mod oneoff;

// Polling scheduler
pub mod scheduler;

// Workflow executor
pub mod workflow;

// Git worktree workspaces
pub mod workspace;
