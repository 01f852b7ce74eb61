//! Sync retry job
//!
//! Completed sessions are delivered to the system of record at least once:
//! the push happens only here, never on the user-facing path, and a failed
//! delivery leaves the `synced_to_django` flag untouched for the next
//! cycle. Retries continue indefinitely until the push succeeds.

use anyhow::Result;
use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::repositories::SessionRepository;
use crate::sync::DjangoSyncClient;

/// Background job that re-attempts delivery of completed-but-unsynced
/// sessions
#[derive(Clone)]
pub struct SyncRetryJob {
    repository: SessionRepository,
    client: DjangoSyncClient,
    batch_size: i64,
}

impl SyncRetryJob {
    /// Create a new sync retry job
    pub fn new(repository: SessionRepository, client: DjangoSyncClient, batch_size: i64) -> Self {
        Self {
            repository,
            client,
            batch_size,
        }
    }

    /// Push one batch of unsynced sessions. Returns the number delivered.
    pub async fn run_once(&self) -> Result<usize> {
        let pending = self
            .repository
            .find_unsynced_completed(self.batch_size)
            .await?;

        if pending.is_empty() {
            return Ok(0);
        }

        info!("Sync job found {} unsynced completed sessions", pending.len());

        let mut synced = 0;
        for session in pending {
            match self.client.push_completed_session(&session).await {
                Ok(()) => {
                    self.repository.mark_synced(session.id, Utc::now()).await?;
                    info!("Synced session {} to the system of record", session.id);
                    synced += 1;
                }
                Err(e) => {
                    // Transient failure; the flag stays false and the next
                    // cycle retries.
                    warn!("Failed to sync session {}: {}", session.id, e);
                }
            }
        }

        Ok(synced)
    }

    /// Start the periodic sync job on the given cron schedule
    pub async fn start(&self, schedule: &str) -> Result<()> {
        let job_runner = self.clone();

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let job_runner = job_runner.clone();
            Box::pin(async move {
                match job_runner.run_once().await {
                    Ok(synced) if synced > 0 => {
                        info!("Sync run finished, delivered {} sessions", synced);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Sync run failed: {}", e);
                    }
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started sync retry job with schedule: {}", schedule);
        Ok(())
    }
}
