//! Staleness reaper
//!
//! Clients prove liveness with periodic heartbeats; there is no explicit
//! cancellation protocol. When a client crashes or loses connectivity its
//! session would stay live forever, holding the user's single active slot.
//! The reaper scans for live sessions whose heartbeat has gone silent and
//! force-abandons them, freeing the slot for a new start.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::engine::SessionEngine;
use crate::error::SessionError;
use crate::repositories::SessionRepository;

pub const HEARTBEAT_TIMEOUT_REASON: &str = "heartbeat_timeout";

/// Background job that abandons live sessions with a silent heartbeat
#[derive(Clone)]
pub struct StalenessReaper {
    engine: SessionEngine,
    repository: SessionRepository,
    heartbeat_timeout: Duration,
}

impl StalenessReaper {
    /// Create a new reaper with the given liveness timeout
    pub fn new(engine: SessionEngine, repository: SessionRepository, timeout_seconds: u64) -> Self {
        Self {
            engine,
            repository,
            heartbeat_timeout: Duration::seconds(timeout_seconds as i64),
        }
    }

    /// Scan once and abandon every stale live session. Returns the number
    /// of sessions reaped.
    pub async fn run_once(&self) -> Result<usize> {
        let cutoff = stale_cutoff(Utc::now(), self.heartbeat_timeout);
        let stale = self.repository.find_stale_live(cutoff).await?;

        if stale.is_empty() {
            return Ok(0);
        }

        info!("Reaper found {} stale live sessions", stale.len());

        let mut reaped = 0;
        for id in stale {
            match self
                .engine
                .abandon(id, Some(HEARTBEAT_TIMEOUT_REASON.to_string()))
                .await
            {
                Ok(_) => {
                    info!("Reaped stale session {}", id);
                    reaped += 1;
                }
                // Lost a race with a client-side complete/abandon; the
                // record already moved forward.
                Err(SessionError::InvalidTransition { .. }) | Err(SessionError::NotFound(_)) => {
                    warn!("Session {} changed state before the reaper reached it", id);
                }
                Err(e) => {
                    error!("Failed to reap session {}: {}", id, e);
                }
            }
        }

        Ok(reaped)
    }

    /// Start the periodic reaper on the given cron schedule
    pub async fn start(&self, schedule: &str) -> Result<()> {
        let reaper = self.clone();

        let scheduler = JobScheduler::new().await?;

        let job = Job::new_async(schedule, move |_, _| {
            let reaper = reaper.clone();
            Box::pin(async move {
                match reaper.run_once().await {
                    Ok(reaped) if reaped > 0 => {
                        info!("Reaper run finished, reaped {} sessions", reaped);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Reaper run failed: {}", e);
                    }
                }
            })
        })?;

        scheduler.add(job).await?;
        scheduler.start().await?;

        info!("Started staleness reaper with schedule: {}", schedule);
        Ok(())
    }
}

/// Heartbeats older than this instant count as stale
fn stale_cutoff(now: DateTime<Utc>, timeout: Duration) -> DateTime<Utc> {
    now - timeout
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cutoff_is_timeout_before_now() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let cutoff = stale_cutoff(now, Duration::seconds(300));

        assert_eq!(cutoff, Utc.timestamp_opt(1_699_999_700, 0).unwrap());
    }
}
