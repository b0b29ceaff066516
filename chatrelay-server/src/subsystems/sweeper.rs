//! Idle-conversation sweeper
//!
//! Every `interval_seconds` the tracker is scanned for conversations whose
//! last user message is older than `idle_timeout_seconds`. Each one is
//! removed from the tracker and archived once. Archiving runs in the
//! background; the sweep never waits on it.

use std::sync::Arc;
use std::time::Duration;

use chatrelay_core::config::SweeperConfig;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::summarize::Summarizer;
use super::tracker::ActiveThreads;

/// Result of one sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub archived: Vec<String>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// One sweep at `now`: take idle threads and spawn their summaries.
pub async fn sweep_once(
    active: &ActiveThreads,
    summarizer: &Arc<Summarizer>,
    config: &SweeperConfig,
    now: Instant,
) -> SweepReport {
    let archived = active
        .take_idle(
            now,
            Duration::from_secs(config.idle_timeout_seconds),
            config.max_checks_per_sweep,
        )
        .await;

    let tasks = archived
        .iter()
        .map(|thread_id| summarizer.spawn(thread_id.clone()))
        .collect();

    SweepReport { archived, tasks }
}

/// Called from main.rs to start the background sweep loop
pub async fn run_sweeper(
    active: ActiveThreads,
    summarizer: Arc<Summarizer>,
    config: SweeperConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_seconds.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval_seconds,
        idle_timeout_secs = config.idle_timeout_seconds,
        max_checks = config.max_checks_per_sweep,
        "Idle sweeper started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = sweep_once(&active, &summarizer, &config, Instant::now()).await;
                let remaining = active.len().await;
                if !report.archived.is_empty() {
                    tracing::info!(
                        archived = report.archived.len(),
                        remaining,
                        "Idle sweep archived conversations"
                    );
                } else {
                    tracing::debug!("Idle sweep: nothing to archive");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Idle sweeper shutting down");
                break;
            }
        }
    }
}
