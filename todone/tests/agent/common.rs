//! Common test utilities for agent tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use todone::agent::{AgentRequest, AgentRunner};
use todone_core::{AgentInvocationResult, ModelTier, RetryClassification, RunId};

/// Runner that replays a fixed sequence of attempt results
pub struct ScriptedRunner {
    outcomes: Mutex<VecDeque<AgentInvocationResult>>,
    calls: Mutex<usize>,
}

impl ScriptedRunner {
    pub fn new(outcomes: Vec<AgentInvocationResult>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl AgentRunner for ScriptedRunner {
    async fn invoke(&self, _request: &AgentRequest) -> AgentInvocationResult {
        *self.calls.lock().unwrap() += 1;
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .expect("runner called more often than scripted")
    }
}

pub fn failure(classification: RetryClassification, output: &str) -> AgentInvocationResult {
    AgentInvocationResult::failed(classification, output)
}

pub fn success(output: &str) -> AgentInvocationResult {
    AgentInvocationResult::succeeded(output, Some("session-1".to_string()))
}

pub fn request_in(dir: &Path, prompt: &str) -> AgentRequest {
    AgentRequest {
        prompt: prompt.to_string(),
        run_id: RunId::from("a1b2c3d4"),
        agent_name: "builder-auth".to_string(),
        model: ModelTier::Fast,
        output_file: dir
            .join("agents")
            .join("a1b2c3d4")
            .join("builder-auth")
            .join("cc_raw_output.jsonl"),
        working_dir: Some(dir.to_path_buf()),
        skip_permissions: true,
    }
}

pub fn request(prompt: &str) -> AgentRequest {
    request_in(&PathBuf::from("/tmp/todone-test"), prompt)
}

/// Write an executable shell script standing in for the agent CLI
#[cfg(unix)]
pub fn fake_agent(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-agent");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
