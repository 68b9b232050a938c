//! Background proactive cycle

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{CycleReport, ProactiveAgent};
use crate::Result;
use crate::db::User;

/// Periodically runs the proactive agent over all active users
#[derive(Debug, Clone)]
pub struct ProactiveScheduler {
    agent: Arc<ProactiveAgent>,
}

impl ProactiveScheduler {
    #[must_use]
    pub const fn new(agent: Arc<ProactiveAgent>) -> Self {
        Self { agent }
    }

    /// One full pass: due tasks first, then every active user
    ///
    /// A failure for one user is logged and does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns error if due tasks or the user list cannot be loaded
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let tasks_processed = self.agent.process_due_tasks(now).await?;
        let users = self.agent.active_users()?;
        let concurrency = self.agent.config().max_concurrent_users.max(1);

        let outcomes: Vec<(usize, bool)> = stream::iter(users)
            .map(|user| {
                let agent = Arc::clone(&self.agent);
                async move { visit_user(&agent, &user, now).await }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let report = CycleReport {
            users: outcomes.len(),
            messages_sent: outcomes.iter().map(|(sent, _)| sent).sum(),
            tasks_processed,
            habits_analyzed: outcomes.iter().filter(|(_, analyzed)| *analyzed).count(),
        };

        tracing::info!(
            users = report.users,
            messages_sent = report.messages_sent,
            tasks_processed = report.tasks_processed,
            habits_analyzed = report.habits_analyzed,
            "proactive cycle complete"
        );
        Ok(report)
    }

    /// Spawn the loop; it waits one interval before the first cycle
    ///
    /// A failed cycle is retried after the shorter retry interval.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let cycle_interval = self.agent.config().cycle_interval;
        let retry_interval = self.agent.config().retry_interval;

        tracing::info!(
            interval_secs = cycle_interval.as_secs(),
            "proactive scheduler started"
        );

        let join = tokio::spawn(async move {
            let mut delay = cycle_interval;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("shutdown requested");
                        break;
                    }
                    () = tokio::time::sleep(delay) => {
                        delay = match self.run_cycle(Utc::now()).await {
                            Ok(_) => cycle_interval,
                            Err(e) => {
                                tracing::error!(error = %e, "proactive cycle failed");
                                retry_interval
                            }
                        };
                    }
                }
            }
            tracing::info!("proactive scheduler stopped");
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

/// Returns messages sent and whether habits were analyzed
async fn visit_user(agent: &ProactiveAgent, user: &User, now: DateTime<Utc>) -> (usize, bool) {
    let analyzed = agent
        .analyze_habits_if_due(&user.id, now)
        .unwrap_or_else(|e| {
            tracing::warn!(user_id = %user.id, error = %e, "habit analysis failed");
            false
        });

    let sent = agent.run_user_cycle(user, now).await.unwrap_or_else(|e| {
        tracing::warn!(user_id = %user.id, error = %e, "user cycle failed");
        0
    });

    (sent, analyzed)
}

/// Handle to a running scheduler
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop after the in-flight cycle finishes
    pub async fn stop(self) {
        let _ = self.shutdown.send(()).await;
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "scheduler task panicked");
        }
    }

    /// Stop, giving up after `timeout`
    pub async fn stop_within(self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.stop()).await.is_ok()
    }
}
