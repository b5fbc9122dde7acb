use std::time::Duration;
use tracing::{info, warn};

use todone_core::AgentInvocationResult;

use super::{AgentRequest, AgentRunner};

/// Retry schedule for infrastructure failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is one more
    pub max_retries: u32,

    /// Delay before each retry. Retries past the end of the list wait the
    /// last delay plus 2 seconds per extra retry.
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
        }
    }
}

impl RetryPolicy {
    /// A single attempt
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delays: Vec::new(),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_before(&self, retry: u32) -> Duration {
        let index = retry.saturating_sub(1) as usize;
        if let Some(delay) = self.delays.get(index) {
            return *delay;
        }
        let last = self.delays.last().copied().unwrap_or(Duration::from_secs(1));
        let extra = (index + 1 - self.delays.len()) as u32;
        last + Duration::from_secs(2) * extra
    }

    /// Full delay schedule for `max_retries` retries
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries).map(|r| self.delay_before(r)).collect()
    }
}

/// Invoke `runner` until it succeeds, fails in a non-retryable way, or the
/// retries run out. Returns the last attempt's result.
pub async fn invoke_with_retry<R>(
    runner: &R,
    request: &AgentRequest,
    policy: &RetryPolicy,
) -> AgentInvocationResult
where
    R: AgentRunner + ?Sized,
{
    let mut retry = 0;
    loop {
        let result = runner.invoke(request).await;
        if !result.is_retryable() || retry >= policy.max_retries {
            if retry > 0 && result.success {
                info!(agent = %request.agent_name, retries = retry, "Agent succeeded after retry");
            }
            return result;
        }

        retry += 1;
        let delay = policy.delay_before(retry);
        warn!(
            agent = %request.agent_name,
            classification = ?result.retry_classification,
            retry,
            max_retries = policy.max_retries,
            delay_secs = delay.as_secs_f32(),
            "Agent attempt failed, retrying: {}",
            result.output
        );
        tokio::time::sleep(delay).await;
    }
}
