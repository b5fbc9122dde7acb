use todone_core::WorkflowStage;

/// One agent invocation inside a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Plan,
    Implement,
    Build,
    Update,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Plan => "plan",
            Phase::Implement => "implement",
            Phase::Build => "build",
            Phase::Update => "update",
        }
    }

    pub fn slash_command(self) -> &'static str {
        match self {
            Phase::Plan => "/plan",
            Phase::Implement => "/implement",
            Phase::Build => "/build",
            Phase::Update => "/update_task",
        }
    }

    /// Agent name, which is also the agent's artifact directory
    pub fn agent_name(self, workspace: &str) -> String {
        let role = match self {
            Phase::Plan => "planner",
            Phase::Implement | Phase::Build => "builder",
            Phase::Update => "updater",
        };
        format!("{role}-{workspace}")
    }

    pub fn stage(self) -> WorkflowStage {
        match self {
            Phase::Plan => WorkflowStage::Planning,
            Phase::Implement => WorkflowStage::Implementing,
            Phase::Build => WorkflowStage::Building,
            Phase::Update => WorkflowStage::Updating,
        }
    }
}
