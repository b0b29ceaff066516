//! Run-completion wait
//!
//! Before a new run is started the latest run of the thread must have left
//! the pending set (`queued`, `in_progress`); the new run is then polled
//! until it finishes. Polling backs off exponentially and every wait is
//! bounded by a deadline, so a stuck run surfaces as `RunWaitTimeout`
//! instead of stalling the request forever.

use std::time::Duration;

use chatrelay_core::config::RunWaitConfig;
use chatrelay_core::{AgentPlatform, RelayError, Run};
use tokio::time::Instant;
use tokio_retry::strategy::ExponentialBackoff;

#[derive(Debug, Clone, Copy)]
pub struct RunWaitPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub deadline: Duration,
}

impl Default for RunWaitPolicy {
    fn default() -> Self {
        Self::from(&RunWaitConfig::default())
    }
}

impl From<&RunWaitConfig> for RunWaitPolicy {
    fn from(config: &RunWaitConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms.max(1)),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.initial_delay_ms)),
            deadline: Duration::from_secs(config.deadline_seconds),
        }
    }
}

impl RunWaitPolicy {
    /// Doubling delays starting at `initial_delay`, capped at `max_delay`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        // base 2 with factor initial/2 yields initial, 2*initial, 4*initial, ...
        let factor = (self.initial_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
    }
}

/// Poll `run` until its status leaves the pending set or the deadline passes.
pub async fn wait_while_pending(
    platform: &dyn AgentPlatform,
    thread_id: &str,
    mut run: Run,
    policy: &RunWaitPolicy,
) -> Result<Run, RelayError> {
    let started = Instant::now();
    let mut delays = policy.delays();

    while run.status.is_pending() {
        let waited = started.elapsed();
        if waited >= policy.deadline {
            tracing::warn!(
                thread_id = %thread_id,
                run_id = %run.id,
                waited_ms = waited.as_millis() as u64,
                "Run wait deadline exceeded"
            );
            return Err(RelayError::RunWaitTimeout {
                thread_id: thread_id.to_string(),
                run_id: run.id,
                waited,
            });
        }

        let delay = delays.next().unwrap_or(policy.max_delay);
        tokio::time::sleep(delay.min(policy.deadline - waited)).await;
        run = platform.get_run(thread_id, &run.id).await?;
    }

    Ok(run)
}

/// Run `agent_id` over the thread and return the finished run.
///
/// Waits for the thread's latest existing run first; a new run is never
/// created while that run is still pending.
pub async fn run_agent(
    platform: &dyn AgentPlatform,
    thread_id: &str,
    agent_id: &str,
    policy: &RunWaitPolicy,
) -> Result<Run, RelayError> {
    let runs = platform.list_runs(thread_id).await?;

    if let Some(latest) = runs.into_iter().next() {
        if latest.status.is_pending() {
            tracing::debug!(thread_id = %thread_id, run_id = %latest.id, "Waiting for previous run");
        }
        wait_while_pending(platform, thread_id, latest, policy).await?;
    }

    let run = platform.create_run(thread_id, agent_id).await?;
    let run = wait_while_pending(platform, thread_id, run, policy).await?;

    tracing::info!(
        thread_id = %thread_id,
        run_id = %run.id,
        status = ?run.status,
        "Agent run finished"
    );

    Ok(run)
}
